//! Subprocess execution with combined output capture
//!
//! stdout and stderr share a single pipe, so the captured text interleaves
//! the two streams in the order the child wrote them.

use crate::core::error::{ProbeError, Result};
use crate::core::output::{self, ProgressGuard};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};

/// Captured output and exit status of a finished subprocess.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Combined stdout/stderr, lossily decoded as UTF-8.
    pub output: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Run `argv` in `dir` and wait for it, capturing combined output.
///
/// The child's exit status is recorded, never turned into an error; only a
/// failure to start the program is.
pub fn run_captured(dir: &Path, argv: &[String]) -> Result<BuildOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| ProbeError::Config("empty command".to_string()))?;

    let (mut reader, writer) = std::io::pipe()?;
    let writer_clone = writer.try_clone()?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(writer_clone)
        .stderr(writer);

    let mut child = cmd.spawn().map_err(|source| ProbeError::Spawn {
        program: program.clone(),
        source,
    })?;

    // The command still holds write ends; drop it or the read never sees EOF.
    drop(cmd);

    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let status = child.wait()?;

    Ok(BuildOutput {
        output: String::from_utf8_lossy(&bytes).into_owned(),
        exit_code: status.code(),
        success: status.success(),
    })
}

/// Run the build command in `dir` behind a spinner.
pub fn build(dir: &Path, argv: &[String]) -> Result<BuildOutput> {
    output::detail(&format!("{} (in {})", argv.join(" "), dir.display()));

    let pb = output::spinner(&format!("running {}", argv.join(" ")));
    let guard = ProgressGuard(pb);
    let result = run_captured(dir, argv);
    drop(guard);

    let result = result?;
    if result.success {
        output::detail("build succeeded");
    } else if let Some(code) = result.exit_code {
        output::warning(&format!("build failed with exit code {}", code));
    } else {
        output::warning("build terminated by signal");
    }
    Ok(result)
}
