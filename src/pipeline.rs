//! The probe pipeline
//!
//! resolve -> download -> extract -> isolate -> build -> log, then optionally
//! clone -> override -> build -> log for a consumer. Each stage runs to
//! completion before the next; a fatal error stops the run where it is.

use crate::acquire::registry::{self, VersionSelector};
use crate::acquire::{download, git};
use crate::build::command::{self, BuildOutput};
use crate::build::{extract, manifest};
use crate::core::config::Config;
use crate::core::error::{ProbeError, Result};
use crate::core::lock;
use crate::core::output;
use crate::internal::fs_utils;
use crate::report::sanitize::Sanitizer;
use crate::report::{self, BuildRecord, ConsumerRecord, RunReport};
use std::path::{Path, PathBuf};

/// Produces a fresh consumer checkout at a destination directory.
///
/// A failed checkout is reported through [`BuildOutput::success`], not as an
/// error.
pub type CloneFn = fn(repository: &str, dest: &Path) -> Result<BuildOutput>;

/// Runs the pipeline for one configuration.
#[derive(Debug, Clone)]
pub struct Probe {
    config: Config,
    sanitizer: Sanitizer,
    clone: CloneFn,
}

impl Probe {
    /// Sanitize logs against the invoking user's home and working directory.
    pub fn new(config: Config) -> Self {
        Self::with_sanitizer(config, Sanitizer::from_env())
    }

    pub fn with_sanitizer(config: Config, sanitizer: Sanitizer) -> Self {
        Self {
            config,
            sanitizer,
            clone: git::clone_fresh,
        }
    }

    /// Replace the consumer checkout step (`git clone` by default).
    pub fn with_cloner(mut self, clone: CloneFn) -> Self {
        self.clone = clone;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage and write the run report.
    ///
    /// Build and clone failures do not fail the run; check
    /// [`RunReport::succeeded`].
    pub fn run(&self, selector: &VersionSelector) -> Result<RunReport> {
        let config = &self.config;
        config.validate()?;

        let crates_dir = std::path::absolute(&config.crates_dir)
            .map_err(ProbeError::fs("cannot resolve", &config.crates_dir))?;
        fs_utils::ensure_dir(&crates_dir)?;
        let _lock = lock::acquire_dir_lock(&crates_dir)?;

        output::action(&format!("Probing {} {}", config.krate, selector));

        output::stage("resolve");
        let record = registry::resolve(config, selector)?;
        let url = registry::download_url(config.registry_base(), &record)?;
        let version = record.num.clone();
        output::info(&format!("Selected version: {}", version));
        output::info(&format!("Download URL: {}", url));

        output::stage("download");
        let archive_path = crates_dir.join(format!("{}-{}.crate", config.krate, version));
        let archive = download::download(&url, &archive_path, config.download_timeout)?;

        output::stage("extract");
        let extract_dir = crates_dir.join(format!("{}-{}", config.krate, version));
        let source_dir = extract::extract_crate(&archive.path, &extract_dir)?;

        output::stage("isolate workspace");
        let workspace_patch = manifest::isolate_workspace(&source_dir)?;

        output::stage("build");
        let build = self.build_and_log(
            &crates_dir,
            &config.krate,
            &version,
            &source_dir,
            &config.build_command,
        )?;

        let consumer = if config.consumer.enabled {
            Some(self.probe_consumer(&crates_dir, &source_dir, &version)?)
        } else {
            None
        };

        let report = RunReport {
            krate: config.krate.clone(),
            version,
            download_url: url,
            archive: archive.path,
            archive_bytes: archive.bytes,
            archive_sha256: archive.sha256,
            source_dir,
            workspace_patch,
            build,
            consumer,
        };
        let report_path = report.write(&crates_dir)?;
        output::detail(&format!("run report written to {}", report_path.display()));

        Ok(report)
    }

    fn build_and_log(
        &self,
        crates_dir: &Path,
        name: &str,
        version: &str,
        dir: &Path,
        argv: &[String],
    ) -> Result<BuildRecord> {
        let build = command::build(dir, argv)?;
        let logs = report::write_build_logs(crates_dir, name, version, &build, &self.sanitizer)?;
        Ok(BuildRecord::new(argv, dir, &build, logs))
    }

    /// Clone the consumer, point it at the extracted crate and build it.
    fn probe_consumer(
        &self,
        crates_dir: &Path,
        source_dir: &Path,
        version: &str,
    ) -> Result<ConsumerRecord> {
        let config = &self.config;
        let consumer = &config.consumer;
        let directory: PathBuf = crates_dir.join(&consumer.name);

        output::stage(&format!("clone {}", consumer.name));
        let clone = (self.clone)(&consumer.repository, &directory)?;

        let mut record = ConsumerRecord {
            name: consumer.name.clone(),
            repository: consumer.repository.clone(),
            directory: directory.clone(),
            clone_exit_code: clone.exit_code,
            clone_success: clone.success,
            dependency_patch: None,
            patch_error: None,
            build: None,
        };
        if !clone.success {
            output::warning(&format!("skipping {} build: clone failed", consumer.name));
            return Ok(record);
        }

        output::stage(&format!("override {} in {}", config.krate, consumer.name));
        let local = std::fs::canonicalize(source_dir)
            .map_err(ProbeError::fs("cannot resolve", source_dir))?;
        match manifest::override_dependency(&directory, &config.krate, &local) {
            Ok(patch) => record.dependency_patch = Some(patch),
            Err(e @ ProbeError::Manifest { .. }) => {
                output::warning(&format!("skipping {} build: {}", consumer.name, e));
                record.patch_error = Some(e.to_string());
                return Ok(record);
            }
            Err(e) => return Err(e),
        }

        output::stage(&format!("build {}", consumer.name));
        record.build = Some(self.build_and_log(
            crates_dir,
            &consumer.name,
            version,
            &directory,
            config.consumer_build_command(),
        )?);

        Ok(record)
    }
}
