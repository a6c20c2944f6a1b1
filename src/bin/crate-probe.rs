//! crate-probe CLI - build a published crate version in isolation
//!
//! Usage:
//!   crate-probe latest                 Probe the newest version
//!   crate-probe 0.17.7                 Probe an exact version
//!   crate-probe --consumer 0.17.7      Also build the consumer against it
//!
//! Exit status: 0 when every build succeeded, 1 on a fatal error, 2 when a
//! build or clone failed (logs and report are still written).

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use crate_probe::{output, Config, Probe, VersionSelector};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "crate-probe")]
#[command(about = "Fetch, isolate, build and log a published crate version")]
#[command(version)]
struct Cli {
    /// Version to probe: "latest" or an exact version string
    #[arg(id = "selector", value_name = "VERSION")]
    version: String,

    /// Configuration file (TOML)
    #[arg(short, long, env = "CRATE_PROBE_CONFIG")]
    config: Option<PathBuf>,

    /// Crate to probe
    #[arg(long = "crate", env = "CRATE_PROBE_CRATE")]
    krate: Option<String>,

    /// Registry base URL
    #[arg(long, env = "CRATE_PROBE_REGISTRY")]
    registry: Option<String>,

    /// Directory for archives, extractions, clones and logs
    #[arg(short = 'd', long, env = "CRATE_PROBE_DIR")]
    crates_dir: Option<PathBuf>,

    /// Also clone and build the configured consumer against the crate
    #[arg(long)]
    consumer: bool,
}

/// Every build succeeded
const EXIT_OK: u8 = 0;
/// Fatal error or usage error
const EXIT_FATAL: u8 = 1;
/// The pipeline completed but a build or clone failed
const EXIT_BUILD_FAILED: u8 = 2;

fn main() -> ExitCode {
    let status = match parse_args(std::env::args_os()) {
        Ok(cli) => run_status(run(cli)),
        Err(status) => status,
    };
    ExitCode::from(status)
}

/// Parse arguments, turning usage errors into an exit status.
///
/// `--help` and `--version` print and exit directly.
fn parse_args<I, T>(args: I) -> Result<Cli, u8>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(cli),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            let _ = e.print();
            Err(EXIT_FATAL)
        }
    }
}

/// Exit status for a finished (or failed) run.
fn run_status(result: Result<bool>) -> u8 {
    match result {
        Ok(true) => EXIT_OK,
        Ok(false) => EXIT_BUILD_FAILED,
        Err(e) => {
            output::error(&format!("{:#}", e));
            EXIT_FATAL
        }
    }
}

/// Merge CLI overrides over the loaded configuration.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(krate) = &cli.krate {
        config.krate = krate.clone();
    }
    if let Some(registry) = &cli.registry {
        config.registry = registry.clone();
    }
    if let Some(dir) = &cli.crates_dir {
        config.crates_dir = dir.clone();
    }
    if cli.consumer {
        config.consumer.enabled = true;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<bool> {
    let config = load_config(&cli)?;
    let selector = VersionSelector::parse(&cli.version);

    let report = Probe::new(config)
        .run(&selector)
        .with_context(|| format!("Failed to probe version {}", selector))?;

    if report.build.success {
        output::success(&format!("{} {} built", report.krate, report.version));
    } else {
        output::error(&format!(
            "{} {} failed to build (exit code {:?}); see {}",
            report.krate,
            report.version,
            report.build.exit_code,
            report.build.logs.raw.display()
        ));
    }

    if let Some(consumer) = &report.consumer {
        match &consumer.build {
            Some(build) if build.success => output::success(&format!(
                "{} built against {} {}",
                consumer.name, report.krate, report.version
            )),
            Some(build) => output::error(&format!(
                "{} failed to build against {} {} (exit code {:?}); see {}",
                consumer.name,
                report.krate,
                report.version,
                build.exit_code,
                build.logs.raw.display()
            )),
            None => match &consumer.patch_error {
                Some(reason) => output::error(&format!(
                    "{} was not built: {}",
                    consumer.name, reason
                )),
                None => output::error(&format!(
                    "{} was not built: git clone failed (exit code {:?})",
                    consumer.name, consumer.clone_exit_code
                )),
            },
        }
    }

    Ok(report.succeeded())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_missing_version_is_error() {
        let err = Cli::try_parse_from(["crate-probe"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_usage_errors_exit_with_one() {
        assert_eq!(parse_args(["crate-probe"]).err(), Some(EXIT_FATAL));
        assert_eq!(
            parse_args(["crate-probe", "0.17.8", "--no-such-flag"]).err(),
            Some(EXIT_FATAL)
        );
        assert_eq!(parse_args(["crate-probe", "latest"]).unwrap().version, "latest");
    }

    #[test]
    fn test_run_status_mapping() {
        assert_eq!(run_status(Ok(true)), 0);
        assert_eq!(run_status(Ok(false)), 2);
        assert_eq!(run_status(Err(anyhow::anyhow!("registry unreachable"))), 1);
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "crate-probe",
            "--crate",
            "untrusted",
            "--registry",
            "http://127.0.0.1:9",
            "-d",
            "/tmp/probe",
            "--consumer",
            "0.9.0",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();
        assert_eq!(cli.version, "0.9.0");
        assert_eq!(config.krate, "untrusted");
        assert_eq!(config.registry, "http://127.0.0.1:9");
        assert_eq!(config.crates_dir, PathBuf::from("/tmp/probe"));
        assert!(config.consumer.enabled);
    }
}
