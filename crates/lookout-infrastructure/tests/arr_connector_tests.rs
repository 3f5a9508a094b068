use lookout_application::{Connector, ConnectorError, ReleaseQueryOptions};
use lookout_domain::{ConnectorType, Protocol, RawSize};
use lookout_infrastructure::ArrConnector;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn connector(server: &MockServer, connector_type: ConnectorType) -> ArrConnector {
    ArrConnector::new(
        "arr-test",
        connector_type,
        &server.uri(),
        Some("arr-api-key".to_string()),
        Duration::from_secs(5),
        Client::new(),
    )
    .expect("valid connector")
}

#[tokio::test]
async fn test_movie_lookup_maps_catalog_ids() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/movie/lookup"))
        .and(query_param("term", "The Matrix"))
        .and(header("X-Api-Key", "arr-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 11, "title": "The Matrix", "year": 1999, "tmdbId": 603, "imdbId": "tt0133093" },
            { "title": "The Matrix Reloaded", "year": 2003, "tmdbId": 604 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let candidates = connector(&server, ConnectorType::Radarr)
        .search("The Matrix")
        .await
        .expect("lookup succeeds");

    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].internal_id, Some(11));
    assert_eq!(candidates[0].catalog_id, Some(603));
    assert_eq!(candidates[0].year, Some(1999));
    assert_eq!(candidates[0].external_id.as_deref(), Some("tt0133093"));
    assert_eq!(candidates[1].internal_id, None);
}

#[tokio::test]
async fn test_series_lookup_uses_series_resource() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/series/lookup"))
        .and(query_param("term", "tvdb:81189"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 4, "title": "Breaking Bad", "year": 2008, "tvdbId": 81189, "tmdbId": 1396 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let candidates = connector(&server, ConnectorType::Sonarr)
        .search("tvdb:81189")
        .await
        .expect("lookup succeeds");

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].internal_id, Some(4));
    assert_eq!(candidates[0].secondary_catalog_id, Some(81189));
    assert_eq!(candidates[0].catalog_id, Some(1396));
}

#[tokio::test]
async fn test_get_releases_parses_release_fields() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/release"))
        .and(query_param("movieId", "11"))
        .and(header("X-Api-Key", "arr-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "title": "The.Matrix.1999.1080p.BluRay.x264",
                "size": 8_589_934_592u64,
                "seeders": 42,
                "leechers": 3,
                "protocol": "torrent",
                "indexer": "IndexerA",
                "customFormatScore": 15,
                "downloadUrl": "http://indexer/dl/1",
                "publishDate": "2024-03-01T12:00:00Z",
                "quality": { "quality": { "id": 7, "name": "Bluray-1080p" }, "revision": { "version": 1 } }
            },
            {
                "title": "The.Matrix.1999.2160p.WEB-DL",
                "size": 20_000_000_000u64,
                "protocol": "usenet",
                "indexer": "NzbIndexer",
                "quality": { "quality": { "name": "WEBDL-2160p" } }
            },
            {
                "title": "Mystery",
                "protocol": "unknown"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let releases = connector(&server, ConnectorType::Radarr)
        .get_releases(11, &ReleaseQueryOptions::default())
        .await
        .expect("releases");

    assert_eq!(releases.len(), 2);

    let torrent = &releases[0];
    assert_eq!(torrent.protocol, Protocol::Torrent);
    assert_eq!(torrent.size, Some(RawSize::Bytes(8_589_934_592)));
    assert_eq!(torrent.seeders, Some(42));
    assert_eq!(torrent.leechers, Some(3));
    assert_eq!(torrent.quality.as_deref(), Some("Bluray-1080p"));
    assert_eq!(torrent.indexer.as_deref(), Some("IndexerA"));
    assert_eq!(torrent.custom_score, Some(15));
    assert_eq!(torrent.download_url.as_deref(), Some("http://indexer/dl/1"));
    assert!(torrent.published_at.is_some());

    let nzb = &releases[1];
    assert_eq!(nzb.protocol, Protocol::Usenet);
    assert_eq!(nzb.seeders, None);
    assert_eq!(nzb.quality.as_deref(), Some("WEBDL-2160p"));
}

#[tokio::test]
async fn test_series_releases_use_series_id() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/release"))
        .and(query_param("seriesId", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let releases = connector(&server, ConnectorType::Sonarr)
        .get_releases(4, &ReleaseQueryOptions::default())
        .await
        .expect("releases");

    assert!(releases.is_empty());
}

#[tokio::test]
async fn test_http_error_status_is_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/release"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let result = connector(&server, ConnectorType::Radarr)
        .get_releases(11, &ReleaseQueryOptions::default())
        .await;

    match result {
        Err(ConnectorError::HttpStatus { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body, "Unauthorized");
        }
        other => panic!("expected http status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/movie/lookup"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = connector(&server, ConnectorType::Radarr).search("x").await;
    assert!(matches!(result, Err(ConnectorError::Deserialization(_))));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/release"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let connector = ArrConnector::new(
        "slow",
        ConnectorType::Radarr,
        &server.uri(),
        None,
        Duration::from_millis(100),
        Client::new(),
    )
    .expect("valid connector");

    let result = connector
        .get_releases(11, &ReleaseQueryOptions::default())
        .await;
    assert!(matches!(result, Err(ConnectorError::Timeout(_))));
}

#[tokio::test]
async fn test_movie_catalog_lookup_uses_tmdb_term() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/movie/lookup"))
        .and(query_param("term", "tmdb:603"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 11, "title": "The Matrix", "year": 1999, "tmdbId": 603 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let candidates = connector(&server, ConnectorType::Radarr)
        .lookup_by_catalog_id(Some(603), None)
        .await
        .expect("lookup succeeds");

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].internal_id, Some(11));
    assert_eq!(candidates[0].catalog_id, Some(603));
}

#[tokio::test]
async fn test_series_catalog_lookup_prefers_tvdb_term() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/series/lookup"))
        .and(query_param("term", "tvdb:81189"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 4, "title": "Breaking Bad", "tvdbId": 81189, "tmdbId": 1396 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let candidates = connector(&server, ConnectorType::Sonarr)
        .lookup_by_catalog_id(Some(1396), Some(81189))
        .await
        .expect("lookup succeeds");

    assert_eq!(candidates[0].internal_id, Some(4));
}

#[tokio::test]
async fn test_catalog_lookup_without_usable_id_makes_no_request() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let candidates = connector(&server, ConnectorType::Radarr)
        .lookup_by_catalog_id(None, Some(81189))
        .await
        .expect("nothing to look up");

    assert!(candidates.is_empty());
}

#[tokio::test]
async fn test_library_item_reads_stored_movie() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/movie/11"))
        .and(header("X-Api-Key", "arr-api-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 11, "title": "The Matrix", "year": 1999, "tmdbId": 603, "imdbId": "tt0133093"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let item = connector(&server, ConnectorType::Radarr)
        .library_item(11)
        .await
        .expect("request succeeds")
        .expect("movie is in the library");

    assert_eq!(item.internal_id, Some(11));
    assert_eq!(item.catalog_id, Some(603));
}

#[tokio::test]
async fn test_library_item_not_found_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/series/99"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "NotFound" })))
        .mount(&server)
        .await;

    let item = connector(&server, ConnectorType::Sonarr)
        .library_item(99)
        .await
        .expect("404 is not an error");

    assert!(item.is_none());
}
