// SPDX-License-Identifier: GPL-3.0-or-later
use lazy_static::lazy_static;
use lookout_domain::{ConnectorId, DedupKey, NormalizedRelease, RawRelease, RawSize};
use regex::Regex;
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Ordinal quality table. Labels are compared after [`quality_key`] folding.
const QUALITY_RANKS: &[(&str, u32)] = &[
    ("unknown", 0),
    ("workprint", 1),
    ("cam", 2),
    ("telesync", 3),
    ("telecine", 4),
    ("regional", 5),
    ("dvdscr", 6),
    ("sdtv", 7),
    ("dvd", 8),
    ("dvdr", 9),
    ("webdl480p", 10),
    ("webrip480p", 10),
    ("bluray480p", 11),
    ("bluray576p", 12),
    ("hdtv720p", 13),
    ("webdl720p", 14),
    ("webrip720p", 14),
    ("bluray720p", 15),
    ("hdtv1080p", 16),
    ("rawhd", 16),
    ("webdl1080p", 17),
    ("webrip1080p", 17),
    ("bluray1080p", 18),
    ("remux1080p", 19),
    ("bluray1080premux", 19),
    ("brdisk", 19),
    ("hdtv2160p", 20),
    ("webdl2160p", 21),
    ("webrip2160p", 21),
    ("bluray2160p", 22),
    ("remux2160p", 23),
    ("bluray2160premux", 23),
];

lazy_static! {
    static ref SIZE_LABEL_REGEX: Regex = Regex::new(
        r"(?i)^\s*(?P<value>\d+(?:[.,]\d+)?)\s*(?P<unit>[kmgtp]?i?b)?\s*$"
    )
    .expect("valid size label regex");
}

/// Rank of a connector quality label; unknown or missing labels rank 0.
pub fn quality_rank(label: &str) -> u32 {
    let key = quality_key(label);
    QUALITY_RANKS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, rank)| *rank)
        .unwrap_or(0)
}

fn quality_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Size in bytes. Labels use binary multiples, the convention indexers follow.
pub fn size_in_bytes(size: &RawSize) -> Option<u64> {
    match size {
        RawSize::Bytes(bytes) => Some(*bytes),
        RawSize::Label(label) => parse_size_label(label),
    }
}

fn parse_size_label(label: &str) -> Option<u64> {
    let captures = SIZE_LABEL_REGEX.captures(label)?;
    let value: f64 = captures
        .name("value")?
        .as_str()
        .replace(',', ".")
        .parse()
        .ok()?;

    let unit = captures
        .name("unit")
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| "b".to_string());

    let exponent = match unit.chars().next() {
        Some('k') => 1,
        Some('m') => 2,
        Some('g') => 3,
        Some('t') => 4,
        Some('p') => 5,
        _ => 0,
    };

    Some((value * 1024f64.powi(exponent)).round() as u64)
}

/// Case-folded, accent-stripped title with punctuation collapsed to single spaces.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Bucket on a 1% geometric grid: sizes within about 1% of each other share a bucket.
pub fn size_bucket(size_bytes: u64) -> i64 {
    if size_bytes == 0 {
        return -1;
    }
    ((size_bytes as f64).ln() / 1.01f64.ln()).round() as i64
}

pub fn dedup_key(release: &NormalizedRelease) -> DedupKey {
    DedupKey {
        normalized_title: normalize_title(&release.title),
        size_bucket: size_bucket(release.size_bytes),
        protocol: release.protocol,
    }
}

/// Convert a connector release into the canonical shape.
///
/// Download-progress fields are discarded and no score is assigned.
pub fn normalize_release(raw: RawRelease, source: &ConnectorId) -> NormalizedRelease {
    let size_bytes = match raw.size.as_ref() {
        Some(size) => size_in_bytes(size).unwrap_or_else(|| {
            debug!(target: "normalization", title = %raw.title, ?size, "unparseable release size");
            0
        }),
        None => 0,
    };

    let quality_rank = raw.quality.as_deref().map(quality_rank).unwrap_or(0);

    NormalizedRelease {
        title: raw.title,
        size_bytes,
        seeders: raw.seeders.unwrap_or(0),
        leechers: raw.leechers.unwrap_or(0),
        quality_rank,
        quality_label: raw.quality,
        protocol: raw.protocol,
        indexer_name: raw.indexer.unwrap_or_default(),
        source_connector_id: source.clone(),
        custom_score: raw.custom_score,
        download_url: raw.download_url,
        published_at: raw.published_at,
        score: None,
    }
}

pub fn normalize_releases(raw: Vec<RawRelease>, source: &ConnectorId) -> Vec<NormalizedRelease> {
    raw.into_iter()
        .map(|release| normalize_release(release, source))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lookout_domain::Protocol;

    #[test]
    fn quality_labels_map_to_fixed_ordinals() {
        assert_eq!(quality_rank("Bluray-1080p"), 18);
        assert_eq!(quality_rank("bluray 1080p"), 18);
        assert_eq!(quality_rank("WEBDL-2160p"), 21);
        assert_eq!(quality_rank("Remux-2160p"), 23);
        assert_eq!(quality_rank("CAM"), 2);
        assert_eq!(quality_rank("something new"), 0);
        assert!(quality_rank("HDTV-720p") < quality_rank("WEBRip-1080p"));
    }

    #[test]
    fn parses_size_labels() {
        assert_eq!(size_in_bytes(&RawSize::Bytes(512)), Some(512));
        assert_eq!(
            size_in_bytes(&RawSize::Label("1.5 GB".to_string())),
            Some(1_610_612_736)
        );
        assert_eq!(
            size_in_bytes(&RawSize::Label("700MiB".to_string())),
            Some(734_003_200)
        );
        assert_eq!(
            size_in_bytes(&RawSize::Label("2,5 kb".to_string())),
            Some(2_560)
        );
        assert_eq!(size_in_bytes(&RawSize::Label("1024".to_string())), Some(1_024));
        assert_eq!(size_in_bytes(&RawSize::Label("huge".to_string())), None);
    }

    #[test]
    fn normalizes_titles_for_comparison() {
        assert_eq!(
            normalize_title("The.Matrix.1999.1080p.BluRay.x264-GRP"),
            "the matrix 1999 1080p bluray x264 grp"
        );
        assert_eq!(normalize_title("  Amélie   (2001) "), "amelie 2001");
        assert_eq!(normalize_title("AMELIE 2001"), normalize_title("Amélie_2001"));
    }

    #[test]
    fn size_buckets_follow_one_percent_grid() {
        let base = 4_000_000_000u64;
        assert_eq!(size_bucket(base), size_bucket(base + base / 1000));
        assert_ne!(size_bucket(base), size_bucket(base + base / 20));
        assert_eq!(size_bucket(0), -1);
    }

    #[test]
    fn normalization_drops_progress_fields_and_leaves_score_unset() {
        let mut raw = RawRelease::new("Movie.A.2020.1080p.WEB-DL", Protocol::Torrent);
        raw.size = Some(RawSize::Label("2 GB".to_string()));
        raw.seeders = Some(12);
        raw.leechers = Some(3);
        raw.quality = Some("WEBDL-1080p".to_string());
        raw.indexer = Some("IndexerA".to_string());
        raw.size_left = Some(1_000);
        raw.time_left = Some("00:10:00".to_string());

        let normalized = normalize_release(raw, &ConnectorId::from("radarr"));

        assert_eq!(normalized.size_bytes, 2_147_483_648);
        assert_eq!(normalized.seeders, 12);
        assert_eq!(normalized.leechers, 3);
        assert_eq!(normalized.quality_rank, 17);
        assert_eq!(normalized.indexer_name, "IndexerA");
        assert_eq!(normalized.source_connector_id.as_str(), "radarr");
        assert_eq!(normalized.score, None);
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let raw = RawRelease::new("Some.Usenet.Post", Protocol::Usenet);
        let normalized = normalize_release(raw, &ConnectorId::from("sonarr"));

        assert_eq!(normalized.size_bytes, 0);
        assert_eq!(normalized.seeders, 0);
        assert_eq!(normalized.quality_rank, 0);
        assert_eq!(normalized.indexer_name, "");
    }

    #[test]
    fn dedup_key_ignores_title_punctuation_and_case() {
        let a = normalize_release(
            {
                let mut raw = RawRelease::new("Movie.A.2020.1080p", Protocol::Torrent);
                raw.size = Some(RawSize::Bytes(4_000_000_000));
                raw
            },
            &ConnectorId::from("radarr-a"),
        );
        let b = normalize_release(
            {
                let mut raw = RawRelease::new("movie a 2020 1080p", Protocol::Torrent);
                raw.size = Some(RawSize::Bytes(4_001_000_000));
                raw
            },
            &ConnectorId::from("radarr-b"),
        );
        let usenet = NormalizedRelease {
            protocol: Protocol::Usenet,
            ..b.clone()
        };

        assert_eq!(dedup_key(&a), dedup_key(&b));
        assert_ne!(dedup_key(&a), dedup_key(&usenet));
    }
}
