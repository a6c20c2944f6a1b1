//! Registry version lookup
//!
//! Queries `{registry}/api/v1/crates/{name}/versions` and selects one record.

use crate::core::config::{Config, LatestStrategy};
use crate::core::error::{ProbeError, Result};
use crate::core::output;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Sent on every registry request; crates.io rejects anonymous clients.
pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// One published version as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VersionRecord {
    pub num: String,
    #[serde(default)]
    pub dl_path: Option<String>,
    #[serde(default)]
    pub yanked: bool,
    #[serde(default)]
    pub checksum: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    #[serde(default)]
    versions: Vec<VersionRecord>,
}

/// Which version to probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Exact(String),
}

impl VersionSelector {
    /// `"latest"` is reserved; anything else is matched exactly.
    pub fn parse(arg: &str) -> Self {
        if arg == "latest" {
            Self::Latest
        } else {
            Self::Exact(arg.to_string())
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Exact(v) => f.write_str(v),
        }
    }
}

/// Pick a record from a version list.
///
/// Returns `None` when nothing matches, including `Latest` on an empty list.
pub fn select_version<'a>(
    versions: &'a [VersionRecord],
    selector: &VersionSelector,
    strategy: LatestStrategy,
) -> Option<&'a VersionRecord> {
    match selector {
        VersionSelector::Latest => match strategy {
            LatestStrategy::RegistryOrder => versions.first(),
            LatestStrategy::HighestSemver => versions
                .iter()
                .filter(|v| !v.yanked)
                .filter_map(|v| semver::Version::parse(&v.num).ok().map(|parsed| (parsed, v)))
                .max_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(_, v)| v)
                .or_else(|| versions.first()),
        },
        VersionSelector::Exact(want) => versions.iter().find(|v| &v.num == want),
    }
}

/// Shared GET with the probe's user agent and timeout.
pub(crate) fn get(url: &str, timeout: Duration) -> Result<ureq::Response> {
    ureq::get(url)
        .timeout(timeout)
        .set("User-Agent", USER_AGENT)
        .call()
        .map_err(|e| match e {
            ureq::Error::Status(status, _) => ProbeError::HttpStatus {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(t) => ProbeError::Transport {
                url: url.to_string(),
                message: t.to_string(),
            },
        })
}

/// Fetch the full version list for a crate.
pub fn fetch_versions(
    registry: &str,
    krate: &str,
    timeout: Duration,
) -> Result<Vec<VersionRecord>> {
    let url = format!(
        "{}/api/v1/crates/{}/versions",
        registry.trim_end_matches('/'),
        krate
    );

    let response = get(&url, timeout).map_err(|e| match e {
        ProbeError::HttpStatus { status: 404, .. } => ProbeError::CrateNotFound(krate.to_string()),
        other => other,
    })?;

    let body: VersionsResponse = response
        .into_json()
        .map_err(|e| ProbeError::InvalidResponse {
            url: url.clone(),
            message: e.to_string(),
        })?;

    Ok(body.versions)
}

/// Resolve a selector against the registry.
pub fn resolve(config: &Config, selector: &VersionSelector) -> Result<VersionRecord> {
    let versions = fetch_versions(config.registry_base(), &config.krate, config.http_timeout)?;
    output::detail(&format!(
        "{} published versions of {}",
        versions.len(),
        config.krate
    ));

    let record = select_version(&versions, selector, config.latest)
        .cloned()
        .ok_or_else(|| ProbeError::VersionNotFound {
            krate: config.krate.clone(),
            selector: selector.to_string(),
        })?;

    if record.yanked {
        output::warning(&format!("{} {} is yanked", config.krate, record.num));
    }
    Ok(record)
}

/// Absolute download URL for a record.
pub fn download_url(registry: &str, record: &VersionRecord) -> Result<String> {
    let dl_path = record
        .dl_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or(ProbeError::MissingDownloadPath)?;
    Ok(format!("{}{}", registry.trim_end_matches('/'), dl_path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(num: &str) -> VersionRecord {
        VersionRecord {
            num: num.to_string(),
            dl_path: Some(format!("/api/v1/crates/ring/{}/download", num)),
            yanked: false,
            checksum: None,
        }
    }

    fn sample() -> Vec<VersionRecord> {
        vec![record("0.17.8"), record("0.17.7")]
    }

    #[test]
    fn test_selector_parse() {
        assert_eq!(VersionSelector::parse("latest"), VersionSelector::Latest);
        assert_eq!(
            VersionSelector::parse("0.17.7"),
            VersionSelector::Exact("0.17.7".to_string())
        );
        // Only the exact lowercase word is reserved
        assert_eq!(
            VersionSelector::parse("Latest"),
            VersionSelector::Exact("Latest".to_string())
        );
    }

    #[test]
    fn test_latest_takes_first_entry() {
        let versions = sample();
        let picked = select_version(
            &versions,
            &VersionSelector::Latest,
            LatestStrategy::RegistryOrder,
        );
        assert_eq!(picked.unwrap().num, "0.17.8");
    }

    #[test]
    fn test_exact_match() {
        let versions = sample();
        let selector = VersionSelector::Exact("0.17.7".to_string());
        let picked = select_version(&versions, &selector, LatestStrategy::RegistryOrder);
        assert_eq!(picked.unwrap().num, "0.17.7");
    }

    #[test]
    fn test_exact_missing_is_none() {
        let versions = sample();
        let selector = VersionSelector::Exact("9.9.9".to_string());
        assert!(select_version(&versions, &selector, LatestStrategy::RegistryOrder).is_none());
    }

    #[test]
    fn test_latest_on_empty_list_is_none() {
        let picked = select_version(&[], &VersionSelector::Latest, LatestStrategy::RegistryOrder);
        assert!(picked.is_none());
    }

    #[test]
    fn test_highest_semver_ignores_list_order() {
        let versions = vec![
            record("0.16.20"),
            record("0.17.8"),
            record("not-a-version"),
            record("0.17.8-rc.1"),
        ];
        let picked = select_version(
            &versions,
            &VersionSelector::Latest,
            LatestStrategy::HighestSemver,
        );
        assert_eq!(picked.unwrap().num, "0.17.8");
    }

    #[test]
    fn test_highest_semver_skips_yanked() {
        let mut yanked = record("0.18.0");
        yanked.yanked = true;
        let versions = vec![yanked, record("0.17.8")];
        let picked = select_version(
            &versions,
            &VersionSelector::Latest,
            LatestStrategy::HighestSemver,
        );
        assert_eq!(picked.unwrap().num, "0.17.8");
    }

    #[test]
    fn test_highest_semver_falls_back_to_first() {
        let versions = vec![record("nightly"), record("weekly")];
        let picked = select_version(
            &versions,
            &VersionSelector::Latest,
            LatestStrategy::HighestSemver,
        );
        assert_eq!(picked.unwrap().num, "nightly");
    }

    #[test]
    fn test_parse_versions_response() {
        let body = r#"{"versions":[{"num":"0.17.8","dl_path":"/api/v1/crates/ring/0.17.8/download","yanked":false,"extra":1},{"num":"0.17.7"}]}"#;
        let parsed: VersionsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.versions.len(), 2);
        assert_eq!(parsed.versions[1].dl_path, None);
    }

    #[test]
    fn test_download_url() {
        let url = download_url("https://crates.io/", &record("0.17.8")).unwrap();
        assert_eq!(url, "https://crates.io/api/v1/crates/ring/0.17.8/download");
    }

    #[test]
    fn test_download_url_missing_path() {
        let mut rec = record("0.17.8");
        rec.dl_path = None;
        let err = download_url("https://crates.io", &rec).unwrap_err();
        assert!(matches!(err, ProbeError::MissingDownloadPath));
    }
}
