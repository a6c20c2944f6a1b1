//! Build logs and the run report
//!
//! Every build leaves two logs in the crates directory, raw and sanitized:
//!
//! ```text
//! build_output_<name>_<version>.txt
//! build_output_<name>_<version>_sanitized.txt
//! ```
//!
//! plus one `run_report_<crate>_<version>.json` summarizing all stages.

pub mod sanitize;

use crate::build::command::BuildOutput;
use crate::build::manifest::{OverridePatch, WorkspacePatch};
use crate::core::error::{ProbeError, Result};
use crate::core::output;
use sanitize::Sanitizer;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Paths of the two log files written for one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogPaths {
    pub raw: PathBuf,
    pub sanitized: PathBuf,
}

impl LogPaths {
    pub fn for_build(dir: &Path, name: &str, version: &str) -> Self {
        Self {
            raw: dir.join(format!("build_output_{}_{}.txt", name, version)),
            sanitized: dir.join(format!("build_output_{}_{}_sanitized.txt", name, version)),
        }
    }
}

/// Write raw and sanitized copies of a build's output.
pub fn write_build_logs(
    dir: &Path,
    name: &str,
    version: &str,
    build: &BuildOutput,
    sanitizer: &Sanitizer,
) -> Result<LogPaths> {
    let paths = LogPaths::for_build(dir, name, version);

    std::fs::write(&paths.raw, &build.output)
        .map_err(ProbeError::fs("cannot write", &paths.raw))?;
    output::detail(&format!("raw build output written to {}", paths.raw.display()));

    std::fs::write(&paths.sanitized, sanitizer.sanitize(&build.output))
        .map_err(ProbeError::fs("cannot write", &paths.sanitized))?;
    output::detail(&format!(
        "sanitized build output written to {}",
        paths.sanitized.display()
    ));

    Ok(paths)
}

/// Exit status and logs of one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildRecord {
    pub command: Vec<String>,
    pub directory: PathBuf,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub logs: LogPaths,
}

impl BuildRecord {
    pub fn new(command: &[String], directory: &Path, build: &BuildOutput, logs: LogPaths) -> Self {
        Self {
            command: command.to_vec(),
            directory: directory.to_path_buf(),
            exit_code: build.exit_code,
            success: build.success,
            logs,
        }
    }
}

/// Consumer stage of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerRecord {
    pub name: String,
    pub repository: String,
    pub directory: PathBuf,
    pub clone_exit_code: Option<i32>,
    pub clone_success: bool,
    /// `None` when the clone failed and the later steps were skipped.
    pub dependency_patch: Option<OverridePatch>,
    /// Why the dependency override could not be applied; the build is skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch_error: Option<String>,
    pub build: Option<BuildRecord>,
}

/// Summary of one probe run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    #[serde(rename = "crate")]
    pub krate: String,
    pub version: String,
    pub download_url: String,
    pub archive: PathBuf,
    pub archive_bytes: u64,
    pub archive_sha256: String,
    pub source_dir: PathBuf,
    pub workspace_patch: WorkspacePatch,
    pub build: BuildRecord,
    pub consumer: Option<ConsumerRecord>,
}

impl RunReport {
    /// Whether every executed build and clone succeeded.
    pub fn succeeded(&self) -> bool {
        let consumer_ok = self.consumer.as_ref().is_none_or(|c| {
            c.clone_success && c.build.as_ref().is_some_and(|b| b.success)
        });
        self.build.success && consumer_ok
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("run_report_{}_{}.json", self.krate, self.version))
    }

    /// Write the report as pretty-printed JSON.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = self.path_in(dir);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ProbeError::Io(std::io::Error::other(e)))?;
        std::fs::write(&path, json + "\n").map_err(ProbeError::fs("cannot write", &path))?;
        Ok(path)
    }
}
