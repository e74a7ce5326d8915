//! # Data Directory Lock
//!
//! Uses `fs2` for cross-platform file locking (flock on Unix, LockFile on
//! Windows) so only one node process ever writes a given ledger.

use crate::domain::errors::LedgerStoreError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Exclusive lock on a data directory, released on drop.
///
/// ```ignore
/// let _lock = DataDirLock::acquire(Path::new("/var/lib/telemetry-ledger"))?;
/// // Lock is held until `_lock` goes out of scope
/// ```
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl DataDirLock {
    const LOCK_FILE: &'static str = "LOCK";

    /// Acquire the lock without waiting.
    ///
    /// # Errors
    ///
    /// `LedgerStoreError::Locked` if a live process holds it.
    pub fn acquire(data_dir: &Path) -> Result<Self, LedgerStoreError> {
        std::fs::create_dir_all(data_dir)?;
        let lock_path = data_dir.join(Self::LOCK_FILE);

        // Do not truncate before holding the lock: the PID inside belongs
        // to the current holder.
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;

        if file.try_lock_exclusive().is_err() {
            let holder = Self::read_pid(&mut file);
            if let Some(pid) = holder.filter(|pid| !is_process_running(*pid)) {
                warn!(pid, path = %lock_path.display(), "Lock file names a dead process but the lock is still held");
            }
            return Err(LedgerStoreError::Locked {
                pid: holder,
                path: lock_path,
            });
        }

        let pid = std::process::id();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        writeln!(file, "{}", pid)?;
        file.sync_all()?;

        info!(pid, path = %lock_path.display(), "Data directory locked");
        Ok(Self {
            file,
            path: lock_path,
            pid,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_pid(file: &mut File) -> Option<u32> {
        let mut contents = String::new();
        file.seek(SeekFrom::Start(0)).ok()?;
        file.read_to_string(&mut contents).ok()?;
        contents.trim().parse().ok()
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        #[allow(clippy::incompatible_msrv)]
        let _ = FileExt::unlock(&self.file);
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Whether a process with `pid` still exists.
fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        Path::new(&format!("/proc/{}", pid)).exists()
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}
