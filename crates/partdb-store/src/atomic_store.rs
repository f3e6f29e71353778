//! Exclusive store lock file.
//!
//! The lock is a `store.lock` file created with `create_new`; holding the
//! guard is holding the lock. A second acquirer fails immediately with
//! `LockBusy` rather than waiting.

use crate::error::StoreError;
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = "store.lock";

pub fn lock_path(store_root: &Path) -> PathBuf {
    store_root.join(LOCK_FILE_NAME)
}

/// Held lock on a store directory; released on drop.
#[derive(Debug)]
pub struct StoreLockGuard {
    lock_path: PathBuf,
    _file: File,
}

impl StoreLockGuard {
    pub fn acquire(store_root: &Path) -> Result<Self, StoreError> {
        let lock_path = lock_path(store_root);
        let lock_io = |message: String| StoreError::LockIo {
            lock_path: lock_path.display().to_string(),
            message,
        };
        fs::create_dir_all(store_root).map_err(|e| lock_io(e.to_string()))?;

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                let _ = writeln!(
                    file,
                    "pid={}\nutc={}",
                    std::process::id(),
                    Utc::now().to_rfc3339()
                );
                Ok(Self {
                    lock_path,
                    _file: file,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::LockBusy {
                    lock_path: lock_path.display().to_string(),
                })
            }
            Err(err) => Err(lock_io(err.to_string())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for StoreLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "partdb-lock-{prefix}-{}-{unique}",
            std::process::id()
        ))
    }

    #[test]
    fn second_acquire_is_busy_until_release() {
        let root = temp_root("busy");
        let guard = StoreLockGuard::acquire(&root).expect("first acquire should succeed");
        let contents = fs::read_to_string(guard.path()).expect("lock file should exist");
        assert!(contents.starts_with("pid="));

        let err = StoreLockGuard::acquire(&root).expect_err("second acquire must fail");
        assert!(matches!(err, StoreError::LockBusy { .. }));

        drop(guard);
        assert!(!lock_path(&root).exists());
        StoreLockGuard::acquire(&root).expect("lock is free again");

        let _ = fs::remove_dir_all(root);
    }
}
