//! Crates directory lock
//!
//! Runs share the crates directory (archives, extraction and clone
//! directories). One run at a time holds `.crate-probe.lock`; the file carries
//! the holder's pid so a refused run can say who has it.

use super::error::{ProbeError, Result};
use super::output;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

pub const LOCK_FILE_NAME: &str = ".crate-probe.lock";

/// Lock files untouched for longer than this are left over from a crashed run.
const STALE_AFTER: Duration = Duration::from_secs(2 * 60 * 60);

fn lock_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

/// Held lock on a crates directory; the file is removed on drop.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Whether `path` still names the open lock file.
///
/// A holder deletes the file on release; a run that opened it just before
/// then locks an unlinked inode nobody else can see.
#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (file.metadata(), std::fs::metadata(path)) {
        (Ok(open), Ok(named)) => open.dev() == named.dev() && open.ino() == named.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> bool {
    path.exists()
}

/// Take the crates directory lock or fail with [`ProbeError::Locked`].
///
/// Age never overrides a held lock: the OS releases it when the holder
/// exits, so an old file that can be locked is simply reused.
pub fn acquire_dir_lock(crates_dir: &Path) -> Result<DirLock> {
    let path = crates_dir.join(LOCK_FILE_NAME);

    for _ in 0..3 {
        let stale = lock_age(&path).is_some_and(|age| age > STALE_AFTER);

        // Open without truncating: the current holder's pid must survive a
        // failed attempt.
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(ProbeError::fs("cannot create lock file", &path))?;

        if file.try_lock_exclusive().is_err() {
            if let Some(pid) = lock_holder(crates_dir) {
                output::detail(&format!("lock held by pid {}", pid));
            }
            return Err(ProbeError::Locked(path));
        }

        if !still_linked(&file, &path) {
            continue;
        }

        if stale && let Some(pid) = lock_holder(crates_dir) {
            output::warning(&format!("reclaiming stale lock left by pid {}", pid));
        }

        file.set_len(0)
            .and_then(|()| writeln!(file, "{}", std::process::id()))
            .map_err(ProbeError::fs("cannot write lock file", &path))?;

        return Ok(DirLock { file, path });
    }

    Err(ProbeError::Locked(path))
}

/// Pid recorded in a lock file, if it holds one.
pub fn lock_holder(crates_dir: &Path) -> Option<u32> {
    std::fs::read_to_string(crates_dir.join(LOCK_FILE_NAME))
        .ok()?
        .trim()
        .parse()
        .ok()
}
