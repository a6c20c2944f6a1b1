//! Build log sanitization
//!
//! Best-effort removal of machine-specific paths from captured output so logs
//! can be shared. This is plain substring and regex matching: Windows paths,
//! symlinked paths and paths with different casing slip through.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

pub const HOME_PLACEHOLDER: &str = "<HOME>";
pub const CWD_PLACEHOLDER: &str = "<CWD>";

/// `/home/<name>` for any user name, stopping at the next separator or whitespace.
static HOME_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/home/[^/\s]+").unwrap());

/// Rewrites absolute paths in build output.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    home: Option<String>,
    cwd: Option<String>,
}

fn non_empty(path: Option<PathBuf>) -> Option<String> {
    path.map(|p| p.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

impl Sanitizer {
    pub fn new(home: Option<&Path>, cwd: Option<&Path>) -> Self {
        Self {
            home: non_empty(home.map(Path::to_path_buf)),
            cwd: non_empty(cwd.map(Path::to_path_buf)),
        }
    }

    /// Use the invoking user's home directory and the process working directory.
    pub fn from_env() -> Self {
        Self {
            home: non_empty(dirs::home_dir()),
            cwd: non_empty(std::env::current_dir().ok()),
        }
    }

    /// Apply, in order: home directory, working directory, `/home/<name>`.
    pub fn sanitize(&self, text: &str) -> String {
        let mut out = text.to_string();
        if let Some(home) = &self.home {
            out = out.replace(home.as_str(), HOME_PLACEHOLDER);
        }
        if let Some(cwd) = &self.cwd {
            out = out.replace(cwd.as_str(), CWD_PLACEHOLDER);
        }
        HOME_SEGMENT
            .replace_all(&out, "/home/<USER>")
            .into_owned()
    }
}
