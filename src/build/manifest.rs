//! Cargo manifest patching
//!
//! Two edits are made to `Cargo.toml` files:
//!
//! - an extracted crate gets an empty `[workspace]` table so cargo treats it
//!   as its own build root instead of joining an enclosing workspace;
//! - a consumer gets a `[patch.crates-io]` entry pointing the probed crate at
//!   its extracted source.
//!
//! Both edits preserve every byte they do not need to touch.

use crate::core::error::{ProbeError, Result};
use crate::core::output;
use serde::Serialize;
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, InlineTable, Item, Table, TableLike, Value};

pub const MANIFEST_NAME: &str = "Cargo.toml";

/// Outcome of [`isolate_workspace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspacePatch {
    Patched,
    AlreadyIsolated,
    MissingManifest,
}

/// Outcome of [`override_dependency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePatch {
    Added,
    Replaced,
    MissingManifest,
}

fn manifest_path(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_NAME)
}

/// Read a manifest, mapping "not found" to `None`.
fn read_manifest(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ProbeError::fs("cannot read", path)(e)),
    }
}

/// Whether the manifest text already declares a workspace.
///
/// Unparseable manifests fall back to a header scan.
pub fn declares_workspace(text: &str) -> bool {
    match text.parse::<DocumentMut>() {
        Ok(doc) => doc.contains_key("workspace"),
        Err(_) => text.lines().any(|line| {
            let line = line.trim_start();
            line.starts_with("[workspace]") || line.starts_with("[workspace.")
        }),
    }
}

/// Append an empty `[workspace]` table, keeping the original text as a prefix.
pub fn with_empty_workspace(text: &str) -> String {
    let mut patched = String::with_capacity(text.len() + 14);
    patched.push_str(text);
    if !patched.is_empty() {
        if !patched.ends_with('\n') {
            patched.push('\n');
        }
        patched.push('\n');
    }
    patched.push_str("[workspace]\n");
    patched
}

/// Make the crate in `src_dir` its own workspace root.
///
/// Idempotent: a manifest that already declares a workspace is not written.
pub fn isolate_workspace(src_dir: &Path) -> Result<WorkspacePatch> {
    let path = manifest_path(src_dir);
    let Some(text) = read_manifest(&path)? else {
        output::warning(&format!(
            "{} not found; cannot patch workspace settings",
            path.display()
        ));
        return Ok(WorkspacePatch::MissingManifest);
    };

    if declares_workspace(&text) {
        output::detail("Cargo.toml already declares a workspace; no patch needed");
        return Ok(WorkspacePatch::AlreadyIsolated);
    }

    std::fs::write(&path, with_empty_workspace(&text))
        .map_err(ProbeError::fs("cannot write", &path))?;
    output::detail("patched Cargo.toml with an empty [workspace] table");
    Ok(WorkspacePatch::Patched)
}

/// Dependency keys that select a source other than a local path.
const OTHER_SOURCE_KEYS: [&str; 6] = [
    "git",
    "branch",
    "tag",
    "rev",
    "registry",
    "registry-index",
];

/// Get `key` from a table as a table, creating or replacing it if needed.
fn child_table<'a>(parent: &'a mut dyn TableLike, key: &str) -> Option<&'a mut dyn TableLike> {
    let item = parent.entry(key).or_insert_with(|| {
        let mut table = Table::new();
        table.set_implicit(true);
        Item::Table(table)
    });
    if !item.is_table_like() {
        *item = Item::Table(Table::new());
    }
    item.as_table_like_mut()
}

/// Set `[patch.crates-io].<krate>.path` in a manifest document.
///
/// An existing entry keeps its position, its formatting and unrelated keys
/// such as `features`; its `path` is set and any git or registry source keys
/// are dropped. Returns `None` if the document cannot hold
/// a patch table.
pub fn set_path_override(
    doc: &mut DocumentMut,
    krate: &str,
    local_path: &str,
) -> Option<OverridePatch> {
    let patch = child_table(doc.as_table_mut(), "patch")?;
    // Implicit tables still print their header once they hold a key.
    let registry = child_table(patch, "crates-io")?;

    if let Some(entry) = registry.get_mut(krate)
        && let Some(entry) = entry.as_table_like_mut()
    {
        // Cargo rejects a dependency with more than one source.
        for key in OTHER_SOURCE_KEYS {
            entry.remove(key);
        }
        match entry.get_mut("path").and_then(Item::as_value_mut) {
            Some(existing) => {
                let decor = existing.decor().clone();
                *existing = Value::from(local_path);
                *existing.decor_mut() = decor;
            }
            None => {
                entry.insert("path", toml_edit::value(local_path));
            }
        }
        return Some(OverridePatch::Replaced);
    }

    let mut inline = InlineTable::new();
    inline.insert("path", Value::from(local_path));
    registry.insert(krate, Item::Value(Value::InlineTable(inline)));
    Some(OverridePatch::Added)
}

/// Point the consumer in `consumer_dir` at a local checkout of `krate`.
pub fn override_dependency(
    consumer_dir: &Path,
    krate: &str,
    local_path: &Path,
) -> Result<OverridePatch> {
    let path = manifest_path(consumer_dir);
    let Some(text) = read_manifest(&path)? else {
        output::warning(&format!(
            "{} not found; cannot override {}",
            path.display(),
            krate
        ));
        return Ok(OverridePatch::MissingManifest);
    };

    let mut doc = text
        .parse::<DocumentMut>()
        .map_err(|e| ProbeError::Manifest {
            path: path.clone(),
            message: e.to_string(),
        })?;

    let local = local_path.to_string_lossy();
    let outcome =
        set_path_override(&mut doc, krate, &local).ok_or_else(|| ProbeError::Manifest {
            path: path.clone(),
            message: "cannot add a [patch.crates-io] table".to_string(),
        })?;

    std::fs::write(&path, doc.to_string()).map_err(ProbeError::fs("cannot write", &path))?;
    output::detail(&format!("[patch.crates-io] {} -> {}", krate, local));
    Ok(outcome)
}
