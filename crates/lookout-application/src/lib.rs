// SPDX-License-Identifier: GPL-3.0-or-later
pub mod connectors;
pub mod discovery;
pub mod fetcher;
pub mod mapping;
pub mod normalization;
pub mod ranking;
pub mod resolver;
pub mod settings;

pub use connectors::{Connector, ConnectorError, ConnectorRegistry, ReleaseQueryOptions};
pub use discovery::{CachePolicy, DiscoveryError, DiscoveryOptions, ReleaseDiscoveryService};
pub use fetcher::{FetchOptions, FetchReport, ReleaseFetcher};
pub use mapping::{
    ChoicePrompt, ChooserOutcome, CrossServiceMappingHelper, DeclineChooser, MappingError,
    MappingSession, MappingSource, MappingSourceChooser,
};
pub use ranking::{merge_and_rank, RankingOptions};
pub use resolver::{IdentityResolver, Resolution, ResolutionOutcome, ResolutionStrategy};
pub use settings::{InMemorySettingsStore, SettingsError, SettingsStore};
