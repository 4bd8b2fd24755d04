//! Lock-scoped atomic mutation helpers for JSONL snapshots.
//!
//! A lock file beside the snapshot covers the whole load, mutate, save span.
//! A second writer fails fast with `LockBusy` instead of waiting.

use crate::record::{Record, RecordKey};
use crate::store::{RecordStore, SnapshotError};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::error::Error as StdError;
use std::ffi::OsString;
use std::fmt::{Display, Formatter};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn snapshot_lock_path(snapshot_path: &Path) -> PathBuf {
    let mut path: OsString = snapshot_path.as_os_str().to_os_string();
    path.push(".lock");
    PathBuf::from(path)
}

#[derive(Debug)]
pub enum AtomicStoreMutationError<E> {
    LockBusy { lock_path: String },
    LockIo { lock_path: String, message: String },
    Store(SnapshotError),
    Mutation(E),
}

impl<E> AtomicStoreMutationError<E> {
    fn lock_busy(lock_path: &Path) -> Self {
        Self::LockBusy {
            lock_path: lock_path.display().to_string(),
        }
    }

    fn lock_io(lock_path: &Path, message: impl Into<String>) -> Self {
        Self::LockIo {
            lock_path: lock_path.display().to_string(),
            message: message.into(),
        }
    }
}

impl<E: Display> Display for AtomicStoreMutationError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LockBusy { lock_path } => write!(f, "snapshot lock busy: {lock_path}"),
            Self::LockIo { lock_path, message } => {
                write!(f, "failed to acquire snapshot lock {lock_path}: {message}")
            }
            Self::Store(err) => write!(f, "{err}"),
            Self::Mutation(err) => write!(f, "{err}"),
        }
    }
}

impl<E> StdError for AtomicStoreMutationError<E> where
    E: Display + std::fmt::Debug + StdError + 'static
{
}

/// Run `body` while holding the lock for `path`.
///
/// `body` is responsible for its own loading and saving; use this when one
/// mutation spans several snapshot files guarded by a single lock.
pub fn with_snapshot_lock<T, E, F>(
    path: impl AsRef<Path>,
    body: F,
) -> Result<T, AtomicStoreMutationError<E>>
where
    F: FnOnce() -> Result<T, AtomicStoreMutationError<E>>,
{
    let path = path.as_ref();
    let _guard = SnapshotLockGuard::acquire(path).map_err(|err| match err {
        AtomicStoreMutationError::LockBusy { lock_path } => {
            AtomicStoreMutationError::LockBusy { lock_path }
        }
        AtomicStoreMutationError::LockIo { lock_path, message } => {
            AtomicStoreMutationError::LockIo { lock_path, message }
        }
        AtomicStoreMutationError::Store(source) => AtomicStoreMutationError::Store(source),
        AtomicStoreMutationError::Mutation(unreachable) => match unreachable {},
    })?;
    body()
}

/// Execute one lock-scoped store mutation against a snapshot path.
///
/// A missing snapshot starts as an empty store. The mutator returns
/// `(value, changed)` where:
/// - `value` is returned to the caller
/// - `changed=true` persists the store before lock release.
pub fn mutate_snapshot<K, R, T, E, F>(
    path: impl AsRef<Path>,
    mutator: F,
) -> Result<T, AtomicStoreMutationError<E>>
where
    K: RecordKey + Serialize + DeserializeOwned,
    R: Record + Serialize + DeserializeOwned,
    F: FnOnce(&mut RecordStore<K, R>) -> Result<(T, bool), E>,
{
    let path = path.as_ref();
    with_snapshot_lock(path, || {
        let mut store =
            RecordStore::load_jsonl_or_empty(path).map_err(AtomicStoreMutationError::Store)?;
        let (value, changed) = mutator(&mut store).map_err(AtomicStoreMutationError::Mutation)?;
        if changed {
            store
                .save_jsonl(path)
                .map_err(AtomicStoreMutationError::Store)?;
        }
        Ok(value)
    })
}

struct SnapshotLockGuard {
    lock_path: PathBuf,
    _file: File,
}

impl SnapshotLockGuard {
    fn acquire(path: &Path) -> Result<Self, AtomicStoreMutationError<std::convert::Infallible>> {
        let lock_path = snapshot_lock_path(path);
        if let Some(parent) = lock_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| AtomicStoreMutationError::lock_io(&lock_path, e.to_string()))?;
        }

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
                tracing::debug!(lock = %lock_path.display(), "snapshot lock acquired");
                Ok(Self {
                    lock_path,
                    _file: file,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::warn!(lock = %lock_path.display(), "snapshot lock busy");
                Err(AtomicStoreMutationError::lock_busy(&lock_path))
            }
            Err(err) => Err(AtomicStoreMutationError::lock_io(
                &lock_path,
                err.to_string(),
            )),
        }
    }
}

impl Drop for SnapshotLockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
        tracing::debug!(lock = %self.lock_path.display(), "snapshot lock released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::student::Student;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_path(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "recordkit-atomic-{prefix}-{}-{unique}.jsonl",
            std::process::id()
        ))
    }

    #[test]
    fn mutation_persists_only_when_changed() {
        let path = temp_path("changed");
        let key = mutate_snapshot::<u64, Student, _, StoreError, _>(&path, |store| {
            let key = store.create(Student::new("Alice Johnson", 85.5))?;
            Ok((key, true))
        })
        .expect("mutation should succeed");
        assert_eq!(key, 1);
        assert!(path.exists());
        assert!(!snapshot_lock_path(&path).exists());

        let count = mutate_snapshot::<u64, Student, _, StoreError, _>(&path, |store| {
            Ok((store.len(), false))
        })
        .expect("read-only mutation should succeed");
        assert_eq!(count, 1);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn held_lock_reports_busy() {
        let path = temp_path("busy");
        let lock = snapshot_lock_path(&path);
        fs::write(&lock, "pid=0\n").expect("lock fixture should write");

        let result = mutate_snapshot::<u64, Student, (), StoreError, _>(&path, |_| Ok(((), true)));
        assert!(matches!(result, Err(AtomicStoreMutationError::LockBusy { .. })));
        assert!(!path.exists());

        let _ = fs::remove_file(lock);
    }

    #[test]
    fn mutation_error_skips_save() {
        let path = temp_path("mutation-error");
        let result = mutate_snapshot::<u64, Student, (), StoreError, _>(&path, |store| {
            store.create(Student::new("", 10.0))?;
            Ok(((), true))
        });
        assert!(matches!(
            result,
            Err(AtomicStoreMutationError::Mutation(StoreError::InvalidField { .. }))
        ));
        assert!(!path.exists());
    }
}
