//! Probe a published crate version: fetch it from the registry, build it in
//! isolation and keep sanitized build logs.
//!
//! A run goes through these stages in order:
//!
//! 1. resolve `latest` or an exact version against the registry
//! 2. download the `.crate` archive into the crates directory
//! 3. extract it, always replacing an earlier extraction
//! 4. append an empty `[workspace]` to its `Cargo.toml` so it builds standalone
//! 5. run the build command, capturing combined stdout/stderr and exit status
//! 6. write raw and sanitized logs (home directory, working directory and
//!    `/home/<user>` paths replaced)
//!
//! With a consumer configured, a downstream repository is then cloned, its
//! manifest gets a `[patch.crates-io]` override pointing at the extracted
//! crate, and it goes through steps 5 and 6 as well. Every run ends with a
//! JSON run report next to the logs.
//!
//! # Example
//!
//! ```no_run
//! use crate_probe::{Config, Probe, VersionSelector};
//!
//! let config = Config::default();
//! let report = Probe::new(config).run(&VersionSelector::Latest)?;
//! println!("{} built: {}", report.version, report.succeeded());
//! # Ok::<(), crate_probe::ProbeError>(())
//! ```

pub mod acquire;
pub mod build;
pub mod core;
mod internal;
pub mod pipeline;
pub mod report;

pub use crate::acquire::registry::{VersionRecord, VersionSelector};
pub use crate::core::config::{Config, ConsumerConfig, LatestStrategy};
pub use crate::core::error::{ProbeError, Result};
pub use crate::core::output;
pub use crate::pipeline::{CloneFn, Probe};
pub use crate::report::RunReport;
