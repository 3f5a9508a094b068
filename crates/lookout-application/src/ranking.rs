// SPDX-License-Identifier: GPL-3.0-or-later

//! Deduplication and ordering of the combined release list.
//!
//! Every function here is a pure function of its input, so ranking an
//! already ranked list returns it unchanged.

use crate::normalization::dedup_key;
use lookout_domain::{DedupKey, NormalizedRelease};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingOptions {
    /// Order by quality first (default) instead of by seeders first.
    pub prefer_quality: bool,
    /// Torrents with fewer seeders are dropped. Usenet releases are exempt.
    pub min_seeders: u32,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            prefer_quality: true,
            min_seeders: 0,
        }
    }
}

/// Filter, deduplicate, score and order releases.
pub fn merge_and_rank(
    releases: Vec<NormalizedRelease>,
    options: &RankingOptions,
) -> Vec<NormalizedRelease> {
    let total = releases.len();
    let filtered = filter_min_seeders(releases, options.min_seeders);
    let filtered_count = filtered.len();
    let deduped = deduplicate_releases(filtered);
    let ranked = rank_releases(deduped, options);

    debug!(
        target: "ranking",
        total,
        after_filter = filtered_count,
        after_dedup = ranked.len(),
        prefer_quality = options.prefer_quality,
        "releases merged and ranked"
    );

    ranked
}

pub fn filter_min_seeders(
    releases: Vec<NormalizedRelease>,
    min_seeders: u32,
) -> Vec<NormalizedRelease> {
    releases
        .into_iter()
        .filter(|release| !release.protocol.has_seeders() || release.seeders >= min_seeders)
        .collect()
}

/// Keep one release per [`DedupKey`]: the best-seeded one, then the best
/// quality, then the lexically first indexer name.
pub fn deduplicate_releases(releases: Vec<NormalizedRelease>) -> Vec<NormalizedRelease> {
    let mut groups: BTreeMap<DedupKey, NormalizedRelease> = BTreeMap::new();

    for release in releases {
        let key = dedup_key(&release);
        match groups.get_mut(&key) {
            Some(kept) => {
                if representative_order(&release, kept) == Ordering::Less {
                    *kept = release;
                }
            }
            None => {
                groups.insert(key, release);
            }
        }
    }

    groups.into_values().collect()
}

/// Assign scores and sort. Ties beyond the two ranking keys are broken on
/// stable release attributes so equal input always yields equal output.
pub fn rank_releases(
    mut releases: Vec<NormalizedRelease>,
    options: &RankingOptions,
) -> Vec<NormalizedRelease> {
    for release in releases.iter_mut() {
        release.score = Some(score(release, options));
    }

    releases.sort_by(|a, b| {
        let (a_primary, a_secondary) = ranking_keys(a, options);
        let (b_primary, b_secondary) = ranking_keys(b, options);

        b_primary
            .cmp(&a_primary)
            .then_with(|| b_secondary.cmp(&a_secondary))
            .then_with(|| stable_order(a, b))
    });

    releases
}

/// Primary key in the high 32 bits, secondary in the low 32 bits.
pub fn score(release: &NormalizedRelease, options: &RankingOptions) -> u64 {
    let (primary, secondary) = ranking_keys(release, options);
    (u64::from(primary) << 32) | u64::from(secondary)
}

fn ranking_keys(release: &NormalizedRelease, options: &RankingOptions) -> (u32, u32) {
    if options.prefer_quality {
        (release.quality_rank, release.seeders)
    } else {
        (release.seeders, release.quality_rank)
    }
}

/// `Less` means `a` is the better representative of its dedup group.
fn representative_order(a: &NormalizedRelease, b: &NormalizedRelease) -> Ordering {
    b.seeders
        .cmp(&a.seeders)
        .then_with(|| b.quality_rank.cmp(&a.quality_rank))
        .then_with(|| stable_order(a, b))
}

fn stable_order(a: &NormalizedRelease, b: &NormalizedRelease) -> Ordering {
    a.indexer_name
        .cmp(&b.indexer_name)
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.source_connector_id.cmp(&b.source_connector_id))
        .then_with(|| a.size_bytes.cmp(&b.size_bytes))
        .then_with(|| a.protocol.cmp(&b.protocol))
        .then_with(|| a.download_url.cmp(&b.download_url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_domain::{ConnectorId, Protocol};
    use std::collections::HashSet;

    fn release(title: &str, seeders: u32, quality_rank: u32) -> NormalizedRelease {
        NormalizedRelease {
            title: title.to_string(),
            size_bytes: 4_000_000_000,
            seeders,
            leechers: 0,
            quality_rank,
            quality_label: None,
            protocol: Protocol::Torrent,
            indexer_name: "indexer".to_string(),
            source_connector_id: ConnectorId::from("radarr"),
            custom_score: None,
            download_url: None,
            published_at: None,
            score: None,
        }
    }

    fn usenet(title: &str, quality_rank: u32) -> NormalizedRelease {
        NormalizedRelease {
            protocol: Protocol::Usenet,
            ..release(title, 0, quality_rank)
        }
    }

    fn sample_set() -> Vec<NormalizedRelease> {
        let mut duplicate = release("Movie.A.1080p", 80, 18);
        duplicate.source_connector_id = ConnectorId::from("radarr-4k");
        duplicate.indexer_name = "other".to_string();

        let mut small = release("Movie A 720p", 15, 15);
        small.size_bytes = 1_200_000_000;

        vec![
            release("Movie.A.1080p", 50, 18),
            duplicate,
            release("Movie.A.2160p", 5, 22),
            small,
            release("Movie.A.CAM", 200, 2),
            usenet("Movie.A.1080p.NZB", 18),
            usenet("Movie.A.2160p.NZB", 22),
        ]
    }

    #[test]
    fn merge_and_rank_is_idempotent() {
        for options in [
            RankingOptions::default(),
            RankingOptions {
                prefer_quality: false,
                min_seeders: 10,
            },
        ] {
            let once = merge_and_rank(sample_set(), &options);
            let twice = merge_and_rank(once.clone(), &options);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn ranking_ignores_input_order() {
        let options = RankingOptions::default();
        let forward = merge_and_rank(sample_set(), &options);
        let mut reversed_input = sample_set();
        reversed_input.reverse();
        assert_eq!(forward, merge_and_rank(reversed_input, &options));
    }

    #[test]
    fn keeps_one_release_per_dedup_key_with_most_seeders() {
        let input = sample_set();
        let output = merge_and_rank(input.clone(), &RankingOptions::default());

        let keys: Vec<DedupKey> = output.iter().map(dedup_key).collect();
        let unique: HashSet<&DedupKey> = keys.iter().collect();
        assert_eq!(keys.len(), unique.len());

        for kept in &output {
            let key = dedup_key(kept);
            for sibling in input.iter().filter(|r| dedup_key(r) == key) {
                assert!(kept.seeders >= sibling.seeders);
            }
        }
    }

    #[test]
    fn dedup_tie_prefers_quality_then_indexer_name() {
        let mut low_quality = release("Movie.A.1080p", 40, 17);
        low_quality.indexer_name = "aaa".to_string();
        let mut zeta = release("Movie.A.1080p", 40, 18);
        zeta.indexer_name = "zeta".to_string();
        let mut alpha = release("Movie.A.1080p", 40, 18);
        alpha.indexer_name = "alpha".to_string();

        let deduped = deduplicate_releases(vec![low_quality, zeta, alpha]);

        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].quality_rank, 18);
        assert_eq!(deduped[0].indexer_name, "alpha");
    }

    #[test]
    fn prefer_quality_orders_by_quality_then_seeders() {
        let output = merge_and_rank(sample_set(), &RankingOptions::default());

        for pair in output.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(
                a.quality_rank > b.quality_rank
                    || (a.quality_rank == b.quality_rank && a.seeders >= b.seeders),
                "{} before {}",
                a.title,
                b.title
            );
        }
    }

    #[test]
    fn prefer_seeders_ranks_popular_release_first() {
        let options = RankingOptions {
            prefer_quality: false,
            min_seeders: 0,
        };
        let output = merge_and_rank(
            vec![release("Movie.A.2160p", 10, 5), release("Movie.A.480p", 90, 2)],
            &options,
        );

        assert_eq!(output.len(), 2);
        assert_eq!(output[0].seeders, 90);
        assert_eq!(output[1].seeders, 10);
    }

    #[test]
    fn min_seeders_filters_torrents_only() {
        let options = RankingOptions {
            prefer_quality: true,
            min_seeders: 20,
        };
        let output = merge_and_rank(sample_set(), &options);

        for kept in &output {
            if kept.protocol == Protocol::Torrent {
                assert!(kept.seeders >= 20);
            }
        }
        let usenet_count = output
            .iter()
            .filter(|r| r.protocol == Protocol::Usenet)
            .count();
        assert_eq!(usenet_count, 2);
        assert!(output.iter().all(|r| r.title != "Movie.A.2160p"));
    }

    #[test]
    fn scores_follow_ranking_keys() {
        let output = merge_and_rank(sample_set(), &RankingOptions::default());

        assert!(output.iter().all(|r| r.score.is_some()));
        for pair in output.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        let top = &output[0];
        assert_eq!(
            top.score,
            Some((u64::from(top.quality_rank) << 32) | u64::from(top.seeders))
        );
    }

    #[test]
    fn duplicate_across_protocols_is_kept_twice() {
        let torrent = release("Movie.A.1080p", 10, 18);
        let nzb = NormalizedRelease {
            protocol: Protocol::Usenet,
            ..torrent.clone()
        };

        assert_eq!(deduplicate_releases(vec![torrent, nzb]).len(), 2);
    }

    #[test]
    fn empty_input_ranks_to_empty_output() {
        assert!(merge_and_rank(Vec::new(), &RankingOptions::default()).is_empty());
    }
}
