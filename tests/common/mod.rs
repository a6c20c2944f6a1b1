//! Shared fixtures for integration tests: crate archives and a mock registry.

#![allow(dead_code)]

use serde_json::json;
use std::path::{Path, PathBuf};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CRATE: &str = "ring";

/// Minimal manifest for a published crate.
pub fn manifest(name: &str, version: &str) -> String {
    format!("[package]\nname = \"{name}\"\nversion = \"{version}\"\nedition = \"2021\"\n")
}

/// Build a gzip tarball laid out like a `.crate` file.
pub fn crate_archive(name: &str, version: &str, extra: &[(&str, &str)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let prefix = format!("{name}-{version}");
    let cargo_toml = manifest(name, version);
    let mut files = vec![("Cargo.toml", cargo_toml.as_str())];
    files.extend_from_slice(extra);

    for (file, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{prefix}/{file}"), content.as_bytes())
            .unwrap();
    }

    builder.into_inner().unwrap().finish().unwrap()
}

/// Download path the registry advertises for a version.
pub fn dl_path(name: &str, version: &str) -> String {
    format!("/api/v1/crates/{name}/{version}/download")
}

/// Serve a version list (newest first) and an archive for each version.
pub async fn mock_registry(name: &str, versions: &[&str]) -> MockServer {
    let server = MockServer::start().await;

    let list: Vec<_> = versions
        .iter()
        .map(|v| json!({ "num": v, "dl_path": dl_path(name, v), "yanked": false }))
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/api/v1/crates/{name}/versions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "versions": list })))
        .mount(&server)
        .await;

    for version in versions {
        Mock::given(method("GET"))
            .and(path(dl_path(name, version)))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(crate_archive(name, version, &[])),
            )
            .mount(&server)
            .await;
    }

    server
}

/// `sh -c <script>` as an argument vector.
pub fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

/// Canonical temp dir path, so paths printed by child processes match.
pub fn canonical(dir: &Path) -> PathBuf {
    std::fs::canonicalize(dir).unwrap()
}
