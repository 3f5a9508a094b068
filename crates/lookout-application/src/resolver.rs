// SPDX-License-Identifier: GPL-3.0-or-later

//! Resolution of a [`MediaIdentity`] to one connector's internal ID.
//!
//! Strategies run in a fixed priority order and the first one that yields an
//! ID wins:
//! 1. Cross-service mapping through a request manager (needs a catalog ID).
//!    The mapped ID is confirmed against the connector's library first.
//! 2. Catalog lookup on the connector itself (needs a catalog ID)
//! 3. Title search, matched on catalog ID or on title and year (needs a title)
//! 4. External-ID search, matched on the external ID (needs an external ID)
//!
//! A strategy whose input is missing is skipped. Errors raised by a strategy
//! are logged and the next strategy still runs. When nothing resolves and a
//! strategy failed along the way, the outcome is [`ResolutionOutcome::Errored`]
//! rather than a miss.

use crate::connectors::{Connector, ConnectorError};
use crate::mapping::{MappingError, MappingSession};
use crate::normalization::normalize_title;
use lookout_domain::{InternalId, MediaIdentity, ResolvedTarget, SearchCandidate};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    CrossServiceMapping,
    CatalogLookup,
    TitleSearch,
    ExternalIdSearch,
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionStrategy::CrossServiceMapping => write!(f, "cross-service mapping"),
            ResolutionStrategy::CatalogLookup => write!(f, "catalog lookup"),
            ResolutionStrategy::TitleSearch => write!(f, "title search"),
            ResolutionStrategy::ExternalIdSearch => write!(f, "external-id search"),
        }
    }
}

pub const DEFAULT_STRATEGY_ORDER: [ResolutionStrategy; 4] = [
    ResolutionStrategy::CrossServiceMapping,
    ResolutionStrategy::CatalogLookup,
    ResolutionStrategy::TitleSearch,
    ResolutionStrategy::ExternalIdSearch,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub target: ResolvedTarget,
    pub strategy: ResolutionStrategy,
}

/// Result of resolving one identity on one connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Resolved(Resolution),
    /// Every strategy ran cleanly and none found the item.
    Miss,
    /// Nothing resolved and at least one strategy failed, so the item may
    /// still exist on the connector.
    Errored,
}

impl ResolutionOutcome {
    pub fn into_resolution(self) -> Option<Resolution> {
        match self {
            ResolutionOutcome::Resolved(resolution) => Some(resolution),
            ResolutionOutcome::Miss | ResolutionOutcome::Errored => None,
        }
    }

    pub fn is_errored(&self) -> bool {
        matches!(self, ResolutionOutcome::Errored)
    }
}

#[derive(Debug, Error)]
enum StrategyError {
    #[error("mapping failed: {0}")]
    Mapping(#[from] MappingError),
    #[error("connector request failed: {0}")]
    Connector(#[from] ConnectorError),
}

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    strategy_order: Vec<ResolutionStrategy>,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityResolver {
    pub fn new() -> Self {
        Self::with_strategy_order(DEFAULT_STRATEGY_ORDER.to_vec())
    }

    pub fn with_strategy_order(strategy_order: Vec<ResolutionStrategy>) -> Self {
        Self { strategy_order }
    }

    pub fn strategy_order(&self) -> &[ResolutionStrategy] {
        &self.strategy_order
    }

    /// Resolve the identity against one connector. `None` covers both a miss
    /// and a failed resolution; use [`Self::resolve_outcome`] to tell them apart.
    pub async fn resolve(
        &self,
        identity: &MediaIdentity,
        connector: &dyn Connector,
        mapping: &MappingSession,
    ) -> Option<Resolution> {
        self.resolve_outcome(identity, connector, mapping)
            .await
            .into_resolution()
    }

    pub async fn resolve_outcome(
        &self,
        identity: &MediaIdentity,
        connector: &dyn Connector,
        mapping: &MappingSession,
    ) -> ResolutionOutcome {
        let mut errored = false;

        for strategy in &self.strategy_order {
            let attempt = match strategy {
                ResolutionStrategy::CrossServiceMapping => {
                    self.try_cross_service_mapping(identity, connector, mapping)
                        .await
                }
                ResolutionStrategy::CatalogLookup => {
                    self.try_catalog_lookup(identity, connector).await
                }
                ResolutionStrategy::TitleSearch => self.try_title_search(identity, connector).await,
                ResolutionStrategy::ExternalIdSearch => {
                    self.try_external_id_search(identity, connector).await
                }
            };

            match attempt {
                Ok(Some(internal_id)) => {
                    debug!(
                        target: "resolver",
                        connector_id = %connector.id(),
                        internal_id,
                        strategy = %strategy,
                        "identity resolved"
                    );
                    return ResolutionOutcome::Resolved(Resolution {
                        target: ResolvedTarget {
                            connector_id: connector.id().clone(),
                            connector_type: connector.connector_type(),
                            internal_id,
                        },
                        strategy: *strategy,
                    });
                }
                Ok(None) => {
                    debug!(
                        target: "resolver",
                        connector_id = %connector.id(),
                        strategy = %strategy,
                        "strategy produced no match"
                    );
                }
                Err(error) => {
                    errored = true;
                    warn!(
                        target: "resolver",
                        connector_id = %connector.id(),
                        strategy = %strategy,
                        error = %error,
                        "resolution strategy failed"
                    );
                }
            }
        }

        if errored {
            warn!(
                target: "resolver",
                connector_id = %connector.id(),
                media_type = %identity.media_type,
                catalog_id = ?identity.catalog_id,
                "resolution failed on connector; treating it as unavailable"
            );
            return ResolutionOutcome::Errored;
        }

        warn!(
            target: "resolver",
            connector_id = %connector.id(),
            media_type = %identity.media_type,
            catalog_id = ?identity.catalog_id,
            "could not resolve media item on connector; skipping it"
        );
        ResolutionOutcome::Miss
    }

    /// A mapped ID is only a hint: request managers link one instance per
    /// service type, so the ID must name the same item in this connector's
    /// library before it is used.
    async fn try_cross_service_mapping(
        &self,
        identity: &MediaIdentity,
        connector: &dyn Connector,
        mapping: &MappingSession,
    ) -> Result<Option<InternalId>, StrategyError> {
        let Some(catalog_id) = identity.catalog_id else {
            return Ok(None);
        };
        if !mapping.is_available() {
            return Ok(None);
        }

        let mapped = mapping
            .candidate_ids(catalog_id, connector.connector_type())
            .await?;

        for internal_id in mapped {
            let item = with_timeout(connector, connector.library_item(internal_id)).await?;
            if item.is_some_and(|item| catalog_ids_agree(identity, &item) == Some(true)) {
                return Ok(Some(internal_id));
            }
            debug!(
                target: "resolver",
                connector_id = %connector.id(),
                internal_id,
                "mapped id does not belong to this connector"
            );
        }
        Ok(None)
    }

    async fn try_catalog_lookup(
        &self,
        identity: &MediaIdentity,
        connector: &dyn Connector,
    ) -> Result<Option<InternalId>, StrategyError> {
        if identity.catalog_id.is_none() && identity.secondary_catalog_id.is_none() {
            return Ok(None);
        }

        let candidates = with_timeout(
            connector,
            connector.lookup_by_catalog_id(identity.catalog_id, identity.secondary_catalog_id),
        )
        .await?;

        Ok(candidates
            .iter()
            .find(|candidate| {
                candidate.internal_id.is_some()
                    && catalog_ids_agree(identity, candidate) == Some(true)
            })
            .and_then(|candidate| candidate.internal_id))
    }

    async fn try_title_search(
        &self,
        identity: &MediaIdentity,
        connector: &dyn Connector,
    ) -> Result<Option<InternalId>, StrategyError> {
        let Some(title) = identity.title.as_deref().map(str::trim).filter(|t| !t.is_empty())
        else {
            return Ok(None);
        };

        let candidates = search_with_timeout(connector, title).await?;
        let wanted_title = normalize_title(title);

        Ok(candidates
            .iter()
            .find(|candidate| {
                candidate.internal_id.is_some()
                    && matches_by_catalog_or_title(identity, &wanted_title, candidate)
            })
            .and_then(|candidate| candidate.internal_id))
    }

    async fn try_external_id_search(
        &self,
        identity: &MediaIdentity,
        connector: &dyn Connector,
    ) -> Result<Option<InternalId>, StrategyError> {
        let Some(external_id) = identity
            .external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
        else {
            return Ok(None);
        };

        let candidates = search_with_timeout(connector, external_id).await?;

        Ok(candidates
            .iter()
            .find(|candidate| {
                candidate.internal_id.is_some()
                    && candidate.external_id.as_deref().map(str::trim) == Some(external_id)
            })
            .and_then(|candidate| candidate.internal_id))
    }
}

async fn with_timeout<T>(
    connector: &dyn Connector,
    call: impl Future<Output = Result<T, ConnectorError>>,
) -> Result<T, ConnectorError> {
    let timeout = connector.request_timeout();
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(ConnectorError::Timeout(timeout)),
    }
}

async fn search_with_timeout(
    connector: &dyn Connector,
    query: &str,
) -> Result<Vec<SearchCandidate>, ConnectorError> {
    with_timeout(connector, connector.search(query)).await
}

/// `None` when the two sides share no catalog ID. Otherwise every ID present
/// on both sides must be equal.
fn catalog_ids_agree(identity: &MediaIdentity, candidate: &SearchCandidate) -> Option<bool> {
    let comparable_ids = [
        (identity.catalog_id, candidate.catalog_id),
        (identity.secondary_catalog_id, candidate.secondary_catalog_id),
    ];

    let mut agreed = None;
    for (wanted, found) in comparable_ids {
        if let (Some(wanted), Some(found)) = (wanted, found) {
            if wanted != found {
                return Some(false);
            }
            agreed = Some(true);
        }
    }
    agreed
}

/// Shared catalog IDs decide when there are any; otherwise the normalized
/// title (and year, when given) must match.
fn matches_by_catalog_or_title(
    identity: &MediaIdentity,
    wanted_title: &str,
    candidate: &SearchCandidate,
) -> bool {
    if let Some(agreed) = catalog_ids_agree(identity, candidate) {
        return agreed;
    }

    if normalize_title(&candidate.title) != wanted_title {
        return false;
    }

    match identity.year {
        Some(year) => candidate.year == Some(year),
        None => true,
    }
}
