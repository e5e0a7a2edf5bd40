//! Lock file for single-instance enforcement.
//!
//! The lock is an `flock` on `$XDG_RUNTIME_DIR/shadefilter.lock`, so it goes
//! away with the process that held it. The file carries the holder's PID for
//! error messages.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::LOCK_FILE_NAME;

pub struct InstanceLock {
    // Holding the file keeps the lock
    _file: File,
    path: PathBuf,
}

/// Result of trying to take the lock.
pub enum LockAttempt {
    Acquired(InstanceLock),
    /// Another instance holds it; its PID if the file could be read.
    Held(Option<u32>),
}

impl InstanceLock {
    pub fn acquire() -> Result<LockAttempt> {
        Self::acquire_at(&default_lock_path())
    }

    pub fn acquire_at(lock_path: &Path) -> Result<LockAttempt> {
        // Without truncation so the holder's PID stays readable
        let mut lock_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)
            .with_context(|| format!("Failed to open lock file {}", lock_path.display()))?;

        if lock_file.try_lock_exclusive().is_err() {
            let holder = std::fs::read_to_string(lock_path)
                .ok()
                .and_then(|content| content.trim().parse::<u32>().ok());
            return Ok(LockAttempt::Held(holder));
        }

        lock_file.set_len(0)?;
        lock_file.seek(SeekFrom::Start(0))?;
        writeln!(&lock_file, "{}", std::process::id())?;
        lock_file.flush()?;

        Ok(LockAttempt::Acquired(Self {
            _file: lock_file,
            path: lock_path.to_path_buf(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn default_lock_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join(LOCK_FILE_NAME)
}
