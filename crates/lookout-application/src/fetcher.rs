// SPDX-License-Identifier: GPL-3.0-or-later
use crate::connectors::{Connector, ConnectorError, ConnectorRegistry, ReleaseQueryOptions};
use crate::normalization::normalize_releases;
use futures::future::join_all;
use futures::FutureExt;
use lookout_domain::{ConnectorId, NormalizedRelease, RawRelease, ResolvedTarget};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_ERROR_MESSAGE_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOptions {
    pub min_seeders: u32,
}

/// Combined releases of one fan-out plus which connectors delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    pub releases: Vec<NormalizedRelease>,
    pub succeeded: Vec<ConnectorId>,
    pub failed: Vec<ConnectorId>,
}

impl FetchReport {
    /// At least one connector was attempted and none of them delivered.
    pub fn all_failed(&self) -> bool {
        !self.failed.is_empty() && self.succeeded.is_empty()
    }
}

enum BranchOutcome {
    Delivered(ConnectorId, Vec<NormalizedRelease>),
    Failed(ConnectorId),
}

pub struct ReleaseFetcher {
    registry: Arc<ConnectorRegistry>,
    error_message_limit: usize,
}

impl ReleaseFetcher {
    pub fn new(registry: Arc<ConnectorRegistry>) -> Self {
        Self {
            registry,
            error_message_limit: DEFAULT_ERROR_MESSAGE_LIMIT,
        }
    }

    pub fn with_error_message_limit(mut self, limit: usize) -> Self {
        self.error_message_limit = limit;
        self
    }

    /// Fetch and normalize releases from every target concurrently.
    pub async fn fetch_all(
        &self,
        targets: &[ResolvedTarget],
        options: &FetchOptions,
    ) -> Vec<NormalizedRelease> {
        self.fetch_all_with_report(targets, options).await.releases
    }

    /// Like [`fetch_all`](Self::fetch_all), also reporting per-connector outcomes.
    ///
    /// All targets are polled concurrently. A branch that errors, times out or
    /// panics contributes nothing and never affects its siblings.
    pub async fn fetch_all_with_report(
        &self,
        targets: &[ResolvedTarget],
        options: &FetchOptions,
    ) -> FetchReport {
        let query = ReleaseQueryOptions {
            min_seeders: options.min_seeders,
        };
        let limit = self.error_message_limit;

        let mut report = FetchReport::default();
        let mut ids = Vec::with_capacity(targets.len());
        let mut branches = Vec::with_capacity(targets.len());

        for target in targets {
            let Some(connector) = self.registry.get(&target.connector_id) else {
                warn!(
                    target: "fetcher",
                    connector_id = %target.connector_id,
                    "resolved target names an unknown connector"
                );
                report.failed.push(target.connector_id.clone());
                continue;
            };

            ids.push(target.connector_id.clone());
            branches.push(
                AssertUnwindSafe(fetch_branch(connector, target.clone(), query, limit))
                    .catch_unwind(),
            );
        }

        // Branches run on the caller's task, so dropping this future cancels them all.
        let settled = join_all(branches).await;

        for (connector_id, outcome) in ids.into_iter().zip(settled) {
            match outcome {
                Ok(BranchOutcome::Delivered(id, releases)) => {
                    report.releases.extend(releases);
                    report.succeeded.push(id);
                }
                Ok(BranchOutcome::Failed(id)) => report.failed.push(id),
                Err(panic) => {
                    warn!(
                        target: "fetcher",
                        connector_id = %connector_id,
                        error = %truncate_message(&panic_message(panic.as_ref()), limit),
                        "release fetch panicked"
                    );
                    report.failed.push(connector_id);
                }
            }
        }

        debug!(
            target: "fetcher",
            releases = report.releases.len(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "release fan-out settled"
        );

        report
    }
}

async fn fetch_branch(
    connector: Arc<dyn Connector>,
    target: ResolvedTarget,
    query: ReleaseQueryOptions,
    error_message_limit: usize,
) -> BranchOutcome {
    match get_releases_with_timeout(connector.as_ref(), &target, &query).await {
        Ok(raw) => {
            debug!(
                target: "fetcher",
                connector_id = %target.connector_id,
                internal_id = target.internal_id,
                releases = raw.len(),
                "releases fetched"
            );
            BranchOutcome::Delivered(
                target.connector_id.clone(),
                normalize_releases(raw, &target.connector_id),
            )
        }
        Err(error) => {
            warn!(
                target: "fetcher",
                connector_id = %target.connector_id,
                error = %truncate_message(&error.to_string(), error_message_limit),
                "release fetch failed"
            );
            BranchOutcome::Failed(target.connector_id)
        }
    }
}

async fn get_releases_with_timeout(
    connector: &dyn Connector,
    target: &ResolvedTarget,
    query: &ReleaseQueryOptions,
) -> Result<Vec<RawRelease>, ConnectorError> {
    let timeout = connector.request_timeout();
    match tokio::time::timeout(timeout, connector.get_releases(target.internal_id, query)).await {
        Ok(result) => result,
        Err(_) => Err(ConnectorError::Timeout(timeout)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Shorten a message to `limit` characters, marking the cut with an ellipsis.
pub fn truncate_message(message: &str, limit: usize) -> String {
    if message.chars().count() <= limit {
        return message.to_string();
    }
    let mut truncated: String = message.chars().take(limit).collect();
    truncated.push('…');
    truncated
}
