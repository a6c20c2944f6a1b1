//! Crate archive extraction
//!
//! A `.crate` file is a gzip-compressed tarball whose entries live under a
//! single `name-version/` directory. Extraction always starts from an empty
//! directory so stale files from an earlier run never leak into a build.

use crate::core::error::{ProbeError, Result};
use crate::core::output::{self, ProgressGuard};
use crate::internal::fs_utils;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

fn unsafe_entry(msg: String) -> ProbeError {
    ProbeError::Extract(msg)
}

/// Resolve `target` against `base`, both relative to the extraction root.
///
/// Returns the normalized relative path, or `None` if it is absolute or
/// climbs above the root at any point.
fn resolve_inside(base: &Path, target: &Path) -> Option<PathBuf> {
    let mut parts: Vec<&OsStr> = Vec::new();
    for component in base.components().chain(target.components()) {
        match component {
            Component::Normal(segment) => parts.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.into_iter().collect())
}

/// Refuse to write through a symlink planted by an earlier entry.
fn reject_symlinked_ancestors(dest: &Path, rel: &Path) -> Result<()> {
    for ancestor in rel.ancestors().filter(|a| !a.as_os_str().is_empty()) {
        let on_disk = dest.join(ancestor);
        if std::fs::symlink_metadata(&on_disk).is_ok_and(|m| m.file_type().is_symlink()) {
            return Err(unsafe_entry(format!(
                "{} would be written through symlink {}",
                rel.display(),
                on_disk.display()
            )));
        }
    }
    Ok(())
}

/// Validated target of a link entry, relative to the extraction root.
///
/// Symlink targets resolve against the link's own directory; hard link
/// targets name another archive member and resolve against the root.
fn link_target<R: Read>(entry: &tar::Entry<'_, R>, rel: &Path, hard: bool) -> Result<PathBuf> {
    let target = entry
        .link_name()
        .map_err(|e| unsafe_entry(format!("tar link_name error: {}", e)))?
        .ok_or_else(|| unsafe_entry(format!("link without target: {}", rel.display())))?;

    let base = if hard {
        Path::new("")
    } else {
        rel.parent().unwrap_or(Path::new(""))
    };
    resolve_inside(base, &target).ok_or_else(|| {
        unsafe_entry(format!(
            "unsafe link target: {} -> {}",
            rel.display(),
            target.display()
        ))
    })
}

/// Unpack every entry of a tar stream into `dest`.
fn unpack_tar<R: Read>(reader: R, dest: &Path) -> Result<usize> {
    let mut archive = tar::Archive::new(reader);
    let mut count = 0;

    let entries = archive
        .entries()
        .map_err(|e| unsafe_entry(format!("tar read error: {}", e)))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| unsafe_entry(format!("tar entry error: {}", e)))?;
        let raw = entry
            .path()
            .map_err(|e| unsafe_entry(format!("tar path error: {}", e)))?
            .into_owned();

        let rel = resolve_inside(Path::new(""), &raw).ok_or_else(|| {
            unsafe_entry(format!("archive contains unsafe path: {}", raw.display()))
        })?;
        if rel.as_os_str().is_empty() {
            continue;
        }

        reject_symlinked_ancestors(dest, &rel)?;
        let full_path = dest.join(&rel);
        if let Some(parent) = full_path.parent() {
            fs_utils::ensure_dir(parent)?;
        }

        match entry.header().entry_type() {
            tar::EntryType::Link => {
                // tar would resolve this against the process working directory.
                let target = link_target(&entry, &rel, true)?;
                reject_symlinked_ancestors(dest, &target)?;
                std::fs::hard_link(dest.join(&target), &full_path)
                    .map_err(ProbeError::fs("cannot link", &full_path))?;
            }
            kind => {
                if kind == tar::EntryType::Symlink {
                    link_target(&entry, &rel, false)?;
                }
                entry.unpack(&full_path).map_err(|e| {
                    unsafe_entry(format!("unpack error for {}: {}", rel.display(), e))
                })?;
            }
        }
        count += 1;
    }

    Ok(count)
}

/// Return the package root inside an extraction directory.
///
/// Crate archives hold one `name-version/` directory. Directories are taken
/// in sorted name order; with none present the extraction root is the
/// source directory.
pub fn source_root(extract_dir: &Path) -> Result<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(extract_dir)
        .map_err(ProbeError::fs("cannot read directory", extract_dir))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    Ok(dirs
        .into_iter()
        .next()
        .unwrap_or_else(|| extract_dir.to_path_buf()))
}

/// Extract a `.crate` archive into `extract_dir`, wiping it first.
///
/// Returns the package source directory.
pub fn extract_crate(archive: &Path, extract_dir: &Path) -> Result<PathBuf> {
    fs_utils::recreate_dir(extract_dir)?;

    let file = File::open(archive).map_err(ProbeError::fs("cannot open", archive))?;
    let decoder = flate2::read::GzDecoder::new(BufReader::new(file));

    let filename = archive
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "archive".to_string());
    let guard = ProgressGuard(output::spinner(&format!("extracting {}", filename)));
    let count = unpack_tar(decoder, extract_dir)?;
    drop(guard);

    output::detail(&format!(
        "extracted {} entries to {}",
        count,
        extract_dir.display()
    ));
    source_root(extract_dir)
}
