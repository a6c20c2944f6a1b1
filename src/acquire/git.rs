//! Consumer repository cloning
//!
//! Always starts from a fresh clone; a previous checkout is deleted first.

use crate::build::command::{self, BuildOutput};
use crate::core::error::{ProbeError, Result};
use crate::core::output::{self, ProgressGuard};
use crate::internal::fs_utils;
use std::path::Path;

/// Validate that a URL uses an allowed scheme for git operations.
/// Only https://, http://, ssh:// and git@ (SSH) URLs are supported.
pub fn validate_git_url(url: &str) -> Result<()> {
    if url.starts_with("https://")
        || url.starts_with("http://")
        || url.starts_with("git@")
        || url.starts_with("ssh://")
    {
        Ok(())
    } else {
        Err(ProbeError::Config(format!(
            "unsupported git URL scheme: {}\n\
             Only https://, http://, ssh://, and git@ URLs are supported",
            url
        )))
    }
}

/// Clone `url` into `dest`, replacing whatever is there.
///
/// A failing `git clone` is returned as an unsuccessful [`BuildOutput`], not
/// an error; its output is echoed either way.
pub fn clone_fresh(url: &str, dest: &Path) -> Result<BuildOutput> {
    validate_git_url(url)?;

    let name = dest
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ProbeError::Config(format!("invalid clone directory: {}", dest.display()))
        })?;

    fs_utils::remove_dir_all_force(dest)?;
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs_utils::ensure_dir(parent)?;

    output::detail(&format!("git clone {}", url));

    // Runs inside `parent`, so the target is just the directory name.
    let argv = [
        "git".to_string(),
        "clone".to_string(),
        url.to_string(),
        name.clone(),
    ];

    let guard = ProgressGuard(output::spinner(&format!("cloning {}", name)));
    let result = command::run_captured(parent, &argv);
    drop(guard);

    let result = result?;
    output::captured(&result.output);
    if result.success {
        output::detail(&format!("cloned {} to {}", name, dest.display()));
    } else {
        output::warning(&format!(
            "git clone failed for {} (exit code {:?})",
            url, result.exit_code
        ));
    }
    Ok(result)
}
