//! Exclusive lock serializing runs over the same manifest file.

use crate::error::LockError;
use fs4::FileExt;
use std::{
    fs::{self, File, OpenOptions},
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tracing::debug;

/// Held lock on `<lock_dir>/<manifest basename>.lock`. Dropping it releases
/// the lock but leaves the file in place; [`ManifestLock::release`] also
/// removes it.
#[derive(Debug)]
pub struct ManifestLock {
    path: PathBuf,
    file: File,
}

impl ManifestLock {
    pub fn path_for(lock_dir: &Path, manifest: &Path) -> PathBuf {
        let basename = manifest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "manifest".to_string());
        lock_dir.join(format!("{basename}.lock"))
    }

    /// Block until the lock is held.
    pub fn acquire(lock_dir: &Path, manifest: &Path) -> Result<Self, LockError> {
        let path = Self::path_for(lock_dir, manifest);
        loop {
            let file = open_lock_file(&path)?;
            file.lock_exclusive().map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;
            // The previous holder may have removed the file while we waited.
            if is_current(&file, &path)? {
                debug!("Acquired lock {:?}", path);
                return Ok(Self { path, file });
            }
            debug!("Lock file {:?} was replaced, retrying", path);
        }
    }

    /// Take the lock if nobody else holds it.
    pub fn try_acquire(lock_dir: &Path, manifest: &Path) -> Result<Option<Self>, LockError> {
        let path = Self::path_for(lock_dir, manifest);
        loop {
            let file = open_lock_file(&path)?;
            match file.try_lock_exclusive() {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(source) => return Err(LockError::Io { path, source }),
            }
            if is_current(&file, &path)? {
                return Ok(Some(Self { path, file }));
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file, then unlock. The file is unlinked while still
    /// locked so a waiter never ends up holding a detached file.
    pub fn release(self) -> Result<(), LockError> {
        let err = |source: io::Error| LockError::Io {
            path: self.path.clone(),
            source,
        };

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(err(e)),
        }
        self.file.unlock().map_err(err)?;
        debug!("Released lock {:?}", self.path);
        Ok(())
    }
}

fn open_lock_file(path: &Path) -> Result<File, LockError> {
    let io_err = |source: io::Error| LockError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(io_err)
}

/// Whether `file` is still the file linked at `path`.
fn is_current(file: &File, path: &Path) -> Result<bool, LockError> {
    let io_err = |source: io::Error| LockError::Io {
        path: path.to_path_buf(),
        source,
    };

    let on_disk = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(io_err(e)),
    };
    let held = file.metadata().map_err(io_err)?;
    Ok(same_file(&held, &on_disk))
}

#[cfg(unix)]
fn same_file(a: &fs::Metadata, b: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(_: &fs::Metadata, _: &fs::Metadata) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::mpsc, thread, time::Duration};

    #[test]
    fn test_second_handle_contends() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Path::new("/data/batch/items.json");

        let held = ManifestLock::acquire(dir.path(), manifest).unwrap();
        assert_eq!(held.path(), dir.path().join("items.json.lock"));
        assert!(ManifestLock::try_acquire(dir.path(), manifest).unwrap().is_none());

        held.release().unwrap();
        assert!(!dir.path().join("items.json.lock").exists());

        let again = ManifestLock::try_acquire(dir.path(), manifest).unwrap();
        assert!(again.is_some());
    }

    #[test]
    fn test_lock_scoped_to_basename() {
        let dir = tempfile::tempdir().unwrap();
        let _a = ManifestLock::acquire(dir.path(), Path::new("/a/items.json")).unwrap();

        assert!(ManifestLock::try_acquire(dir.path(), Path::new("/b/items.json")).unwrap().is_none());
        assert!(ManifestLock::try_acquire(dir.path(), Path::new("/b/other.json")).unwrap().is_some());
    }

    #[test]
    fn test_waiter_relocks_after_holder_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let lock_dir = dir.path().to_path_buf();
        let manifest = Path::new("/data/items.json");

        let first = ManifestLock::acquire(&lock_dir, manifest).unwrap();

        let (acquired_tx, acquired_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let waiter_dir = lock_dir.clone();
        let waiter = thread::spawn(move || {
            let lock = ManifestLock::acquire(&waiter_dir, manifest).unwrap();
            acquired_tx.send(()).unwrap();
            done_rx.recv().unwrap();
            lock.release().unwrap();
        });

        thread::sleep(Duration::from_millis(200));
        first.release().unwrap();
        acquired_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // The waiter holds the file that is linked at the lock path now.
        assert!(lock_dir.join("items.json.lock").exists());
        assert!(ManifestLock::try_acquire(&lock_dir, manifest).unwrap().is_none());

        done_tx.send(()).unwrap();
        waiter.join().unwrap();
        assert!(ManifestLock::try_acquire(&lock_dir, manifest).unwrap().is_some());
    }
}
