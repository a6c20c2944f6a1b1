//! Archive download
//!
//! Streams a response body to disk in fixed-size chunks, hashing as it goes.

use super::registry;
use crate::core::error::{ProbeError, Result};
use crate::core::output::{self, ProgressGuard};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Chunk size for streaming downloads
const CHUNK_SIZE: usize = 8192;

/// A downloaded archive on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArchive {
    pub path: PathBuf,
    pub bytes: u64,
    /// Recorded for the run report; never compared against anything.
    pub sha256: String,
}

/// Download `url` to `dest`, overwriting any existing file.
///
/// `timeout` bounds the whole transfer, body included.
pub fn download(url: &str, dest: &Path, timeout: Duration) -> Result<LocalArchive> {
    let filename = dest
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());

    let pb = output::spinner(&format!("downloading {}", filename));
    let guard = ProgressGuard(pb);

    let response = registry::get(url, timeout)?;

    if let Some(len) = response
        .header("content-length")
        .and_then(|s| s.parse().ok())
    {
        output::upgrade_to_bytes(&guard.0, len);
    }

    let mut file = std::fs::File::create(dest).map_err(ProbeError::fs("cannot create", dest))?;
    let mut reader = response.into_reader();
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| ProbeError::Transport {
            url: url.to_string(),
            message: format!("read error: {}", e),
        })?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(ProbeError::fs("cannot write", dest))?;
        hasher.update(&buffer[..bytes_read]);

        total_bytes += bytes_read as u64;
        guard.0.set_position(total_bytes);
    }
    file.flush().map_err(ProbeError::fs("cannot write", dest))?;
    drop(guard);

    output::detail(&format!("downloaded {} ({} bytes)", filename, total_bytes));

    Ok(LocalArchive {
        path: dest.to_path_buf(),
        bytes: total_bytes,
        sha256: hex::encode(hasher.finalize()),
    })
}
