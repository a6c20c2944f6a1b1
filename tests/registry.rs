//! Registry lookup and archive download against a mock HTTP server.

mod common;

use common::{CRATE, crate_archive, dl_path, mock_registry};
use crate_probe::acquire::{download, registry};
use crate_probe::{Config, ProbeError, VersionSelector};
use sha2::{Digest, Sha256};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(5);

fn config_for(server: &MockServer) -> Config {
    Config {
        registry: server.uri(),
        ..Config::default()
    }
}

#[tokio::test]
async fn test_resolve_latest_takes_first() {
    let server = mock_registry(CRATE, &["0.17.8", "0.17.7"]).await;
    let config = config_for(&server);

    let record = tokio::task::spawn_blocking(move || {
        registry::resolve(&config, &VersionSelector::Latest)
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(record.num, "0.17.8");
    assert_eq!(record.dl_path.as_deref(), Some(dl_path(CRATE, "0.17.8").as_str()));
}

#[tokio::test]
async fn test_resolve_exact_and_missing() {
    let server = mock_registry(CRATE, &["0.17.8", "0.17.7"]).await;
    let config = config_for(&server);

    let (found, missing) = tokio::task::spawn_blocking(move || {
        (
            registry::resolve(&config, &VersionSelector::parse("0.17.7")),
            registry::resolve(&config, &VersionSelector::parse("9.9.9")),
        )
    })
    .await
    .unwrap();

    assert_eq!(found.unwrap().num, "0.17.7");
    let err = missing.unwrap_err();
    assert!(matches!(err, ProbeError::VersionNotFound { .. }));
    assert_eq!(err.to_string(), "Version 9.9.9 not found for crate 'ring'.");
}

#[tokio::test]
async fn test_unknown_crate_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/crates/nope/versions"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let uri = server.uri();

    let err = tokio::task::spawn_blocking(move || {
        registry::fetch_versions(&uri, "nope", TIMEOUT)
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, ProbeError::CrateNotFound(ref name) if name == "nope"));
}

#[tokio::test]
async fn test_server_error_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let uri = server.uri();

    let err = tokio::task::spawn_blocking(move || {
        registry::fetch_versions(&uri, CRATE, TIMEOUT)
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, ProbeError::HttpStatus { status: 503, .. }));
}

#[tokio::test]
async fn test_malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;
    let uri = server.uri();

    let err = tokio::task::spawn_blocking(move || {
        registry::fetch_versions(&uri, CRATE, TIMEOUT)
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, ProbeError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_download_streams_to_disk() {
    let server = mock_registry(CRATE, &["0.17.8"]).await;
    let url = format!("{}{}", server.uri(), dl_path(CRATE, "0.17.8"));
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("ring-0.17.8.crate");

    let archive = {
        let dest = dest.clone();
        tokio::task::spawn_blocking(move || download::download(&url, &dest, TIMEOUT))
            .await
            .unwrap()
            .unwrap()
    };

    let expected = crate_archive(CRATE, "0.17.8", &[]);
    let written = std::fs::read(&dest).unwrap();
    assert_eq!(written, expected);
    assert_eq!(archive.bytes, expected.len() as u64);
    assert_eq!(archive.sha256, hex::encode(Sha256::digest(&expected)));
}

#[tokio::test]
async fn test_download_non_2xx_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    let url = format!("{}/missing.crate", server.uri());
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("missing.crate");

    let err = tokio::task::spawn_blocking(move || download::download(&url, &dest, TIMEOUT))
        .await
        .unwrap()
        .unwrap_err();

    assert!(matches!(err, ProbeError::HttpStatus { status: 403, .. }));
}

#[tokio::test]
async fn test_download_honors_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(crate_archive(CRATE, "0.17.8", &[]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;
    let url = format!("{}/slow.crate", server.uri());
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("slow.crate");

    let err = tokio::task::spawn_blocking(move || {
        download::download(&url, &dest, Duration::from_secs(1))
    })
    .await
    .unwrap()
    .unwrap_err();

    assert!(matches!(err, ProbeError::Transport { .. }), "got: {err}");
}
