// SPDX-License-Identifier: GPL-3.0-or-later

//! Release discovery: resolve, fan out, merge and rank, with result caching.
//!
//! Cached results are fresh for the configured freshness window and kept
//! until the retention window expires. A stale entry is only served when a
//! new query could not reach any connector, either because resolution failed
//! or because every release fetch did.

use crate::connectors::ConnectorRegistry;
use crate::fetcher::{FetchOptions, ReleaseFetcher};
use crate::mapping::{CrossServiceMappingHelper, MappingSession};
use crate::ranking::{merge_and_rank, RankingOptions};
use crate::resolver::{IdentityResolver, ResolutionOutcome};
use crate::settings::SettingsError;
use futures::future::join_all;
use lookout_config::DiscoveryConfig;
use lookout_domain::{MediaIdentity, MediaType, NormalizedRelease, ResolvedTarget};
use moka::sync::Cache;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryOptions {
    pub prefer_quality: bool,
    pub min_seeders: u32,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            prefer_quality: true,
            min_seeders: 0,
        }
    }
}

impl From<&DiscoveryConfig> for DiscoveryOptions {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            prefer_quality: config.prefer_quality,
            min_seeders: config.min_seeders,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub freshness: Duration,
    pub retention: Duration,
    pub capacity: u64,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from(&DiscoveryConfig::default())
    }
}

impl From<&DiscoveryConfig> for CachePolicy {
    fn from(config: &DiscoveryConfig) -> Self {
        Self {
            freshness: config.cache_freshness(),
            retention: config.cache_retention(),
            capacity: config.cache_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DiscoveryCacheKey {
    media_type: MediaType,
    catalog_id: Option<u64>,
    secondary_catalog_id: Option<u64>,
    external_id: Option<String>,
    prefer_quality: bool,
    min_seeders: u32,
}

impl DiscoveryCacheKey {
    fn new(identity: &MediaIdentity, options: &DiscoveryOptions) -> Self {
        Self {
            media_type: identity.media_type,
            catalog_id: identity.catalog_id,
            secondary_catalog_id: identity.secondary_catalog_id,
            external_id: identity.external_id.clone(),
            prefer_quality: options.prefer_quality,
            min_seeders: options.min_seeders,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedDiscovery {
    releases: Arc<Vec<NormalizedRelease>>,
    stored_at: Instant,
}

/// Targets that resolved, and how many connectors failed during resolution.
#[derive(Debug, Default)]
struct ResolvedTargets {
    targets: Vec<ResolvedTarget>,
    errored: usize,
}

pub struct ReleaseDiscoveryService {
    registry: Arc<ConnectorRegistry>,
    mapping: Option<Arc<CrossServiceMappingHelper>>,
    resolver: IdentityResolver,
    fetcher: ReleaseFetcher,
    cache: Cache<DiscoveryCacheKey, CachedDiscovery>,
    freshness: Duration,
}

impl ReleaseDiscoveryService {
    pub fn new(registry: Arc<ConnectorRegistry>, policy: CachePolicy) -> Self {
        let cache = Cache::builder()
            .max_capacity(policy.capacity)
            .time_to_live(policy.retention.max(policy.freshness))
            .build();

        Self {
            fetcher: ReleaseFetcher::new(Arc::clone(&registry)),
            registry,
            mapping: None,
            resolver: IdentityResolver::new(),
            cache,
            freshness: policy.freshness,
        }
    }

    pub fn from_config(registry: Arc<ConnectorRegistry>, config: &DiscoveryConfig) -> Self {
        let mut service = Self::new(registry, CachePolicy::from(config));
        service.fetcher = ReleaseFetcher::new(Arc::clone(&service.registry))
            .with_error_message_limit(config.error_message_limit);
        service
    }

    pub fn with_mapping_helper(mut self, mapping: Arc<CrossServiceMappingHelper>) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn with_resolver(mut self, resolver: IdentityResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn mapping_helper(&self) -> Option<&Arc<CrossServiceMappingHelper>> {
        self.mapping.as_ref()
    }

    /// Discover, merge and rank releases for a media item.
    ///
    /// An empty list means no releases were found; the call only errors on
    /// input that no resolution strategy could use.
    #[instrument(skip(self, identity), fields(media_type = %identity.media_type, catalog_id = ?identity.catalog_id))]
    pub async fn discover_releases(
        &self,
        identity: &MediaIdentity,
        options: DiscoveryOptions,
    ) -> Result<Vec<NormalizedRelease>, DiscoveryError> {
        if !identity.has_identifier() {
            return Err(DiscoveryError::InvalidInput(
                "a catalog id, secondary catalog id or external id is required".to_string(),
            ));
        }

        let key = DiscoveryCacheKey::new(identity, &options);
        let cached = self.cache.get(&key);
        if let Some(entry) = cached.as_ref() {
            if entry.stored_at.elapsed() < self.freshness {
                debug!(target: "discovery", "serving fresh cached releases");
                return Ok(entry.releases.as_ref().clone());
            }
        }

        let resolved = self.resolve_targets(identity).await;
        if resolved.targets.is_empty() && resolved.errored == 0 {
            info!(target: "discovery", "no connector could resolve the media item");
        }

        let report = self
            .fetcher
            .fetch_all_with_report(
                &resolved.targets,
                &FetchOptions {
                    min_seeders: options.min_seeders,
                },
            )
            .await;

        // Nothing delivered and something failed on the way: a connector
        // outage, not an empty result.
        let total_failure =
            report.succeeded.is_empty() && (!report.failed.is_empty() || resolved.errored > 0);
        if total_failure {
            if let Some(entry) = cached {
                warn!(
                    target: "discovery",
                    fetch_failed = report.failed.len(),
                    resolution_failed = resolved.errored,
                    "every connector failed; serving stale cached releases"
                );
                return Ok(entry.releases.as_ref().clone());
            }
            warn!(
                target: "discovery",
                fetch_failed = report.failed.len(),
                resolution_failed = resolved.errored,
                "every connector failed"
            );
            return Ok(Vec::new());
        }

        let ranked = merge_and_rank(
            report.releases,
            &RankingOptions {
                prefer_quality: options.prefer_quality,
                min_seeders: options.min_seeders,
            },
        );

        self.cache.insert(
            key,
            CachedDiscovery {
                releases: Arc::new(ranked.clone()),
                stored_at: Instant::now(),
            },
        );

        info!(target: "discovery", releases = ranked.len(), "release discovery complete");
        Ok(ranked)
    }

    /// Drop every cached result.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Forget the persisted mapping-source choice. A no-op without a mapping helper.
    pub async fn clear_mapping_preference(&self) -> Result<(), DiscoveryError> {
        if let Some(mapping) = &self.mapping {
            mapping.clear_preference().await?;
        }
        Ok(())
    }

    async fn resolve_targets(&self, identity: &MediaIdentity) -> ResolvedTargets {
        let connectors = self.registry.for_media_type(identity.media_type);
        if connectors.is_empty() {
            debug!(target: "discovery", "no connectors configured for media type");
            return ResolvedTargets::default();
        }

        let session = match (&self.mapping, identity.catalog_id) {
            (Some(mapping), Some(_)) => mapping.session().await,
            _ => MappingSession::none(),
        };

        let outcomes = join_all(connectors.iter().map(|connector| {
            self.resolver
                .resolve_outcome(identity, connector.as_ref(), &session)
        }))
        .await;

        let mut resolved = ResolvedTargets::default();
        for outcome in outcomes {
            match outcome {
                ResolutionOutcome::Resolved(resolution) => resolved.targets.push(resolution.target),
                ResolutionOutcome::Errored => resolved.errored += 1,
                ResolutionOutcome::Miss => {}
            }
        }
        resolved
    }
}
