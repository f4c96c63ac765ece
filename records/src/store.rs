use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::{ClinicError, Result};

/// The persisted entity collections, one JSON array file each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Patients,
    Appointments,
    Invoices,
    Notifications,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Self::Users,
        Self::Patients,
        Self::Appointments,
        Self::Invoices,
        Self::Notifications,
    ];

    pub const fn file_name(&self) -> &'static str {
        match self {
            Self::Users => "users.json",
            Self::Patients => "patients.json",
            Self::Appointments => "appointments.json",
            Self::Invoices => "invoices.json",
            Self::Notifications => "notifications.json",
        }
    }

    const fn index(&self) -> usize {
        match self {
            Self::Users => 0,
            Self::Patients => 1,
            Self::Appointments => 2,
            Self::Invoices => 3,
            Self::Notifications => 4,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name().trim_end_matches(".json"))
    }
}

type CollectionLocks = [Mutex<()>; 5];

/// Locks shared by every store opened on the same directory in this process.
fn shared_locks(dir: &Path) -> Arc<CollectionLocks> {
    static REGISTRY: OnceLock<Mutex<HashMap<PathBuf, Arc<CollectionLocks>>>> = OnceLock::new();

    let mut registry = REGISTRY
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(registry.entry(dir.to_path_buf()).or_default())
}

/// Flat-file store: the single source of truth for every collection.
///
/// Loads fail open (missing or corrupt files read as empty); saves fail
/// closed and replace the whole file atomically.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    locks: Arc<CollectionLocks>,
}

impl FileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| ClinicError::storage(&root, e))?;
        let canonical = fs::canonicalize(&root).map_err(|e| ClinicError::storage(&root, e))?;
        tracing::debug!(root = %canonical.display(), "opened file store");

        Ok(Self {
            locks: shared_locks(&canonical),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.file_name())
    }

    /// Exclusive lock for one collection's refresh-mutate-persist sequence,
    /// shared by all stores on this directory within the process. A poisoned
    /// lock is still handed out: the data lives on disk, not behind the mutex.
    pub fn lock(&self, collection: Collection) -> MutexGuard<'_, ()> {
        self.locks[collection.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the current on-disk state of a collection.
    pub fn load<T: DeserializeOwned>(&self, collection: Collection) -> Vec<T> {
        let path = self.path(collection);

        match fs::read_to_string(&path) {
            Ok(raw) => self.parse(collection, &path, &raw),
            Err(e) if e.kind() == ErrorKind::NotFound => match self.create_empty(&path) {
                Ok(true) => Vec::new(),
                // Someone else created it first; read theirs.
                Ok(false) => match fs::read_to_string(&path) {
                    Ok(raw) => self.parse(collection, &path, &raw),
                    Err(e) => {
                        tracing::warn!(%collection, error = %e, "unreadable collection file, reading as empty");
                        Vec::new()
                    }
                },
                Err(e) => {
                    tracing::warn!(%collection, error = %e, "could not create empty collection file");
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::warn!(%collection, error = %e, "unreadable collection file, reading as empty");
                Vec::new()
            }
        }
    }

    /// Overwrite a collection with `records`.
    pub fn save<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.staged(&json)?;
        let path = self.path(collection);
        tmp.persist(&path)
            .map_err(|e| ClinicError::storage(&path, e.error))?;
        tracing::debug!(%collection, count = records.len(), "saved collection");
        Ok(())
    }

    /// Parse a collection file. A corrupt file is moved aside to
    /// `<name>.corrupt` so the next save cannot destroy what is left of it.
    fn parse<T: DeserializeOwned>(&self, collection: Collection, path: &Path, raw: &str) -> Vec<T> {
        match serde_json::from_str(raw) {
            Ok(records) => records,
            Err(e) => {
                let backup = corrupt_path(path);
                match fs::rename(path, &backup) {
                    Ok(()) => tracing::warn!(
                        %collection,
                        error = %e,
                        backup = %backup.display(),
                        "corrupt collection file moved aside, reading as empty"
                    ),
                    Err(rename) => tracing::warn!(
                        %collection,
                        error = %e,
                        rename_error = %rename,
                        "corrupt collection file, reading as empty"
                    ),
                }
                Vec::new()
            }
        }
    }

    /// Write `[]` to `path` unless a file already exists there. Returns
    /// whether this call created it.
    fn create_empty(&self, path: &Path) -> Result<bool> {
        let tmp = self.staged("[]\n")?;
        match tmp.persist_noclobber(path) {
            Ok(_) => Ok(true),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(ClinicError::storage(path, e.error)),
        }
    }

    /// Fully written and synced temp file in the store directory.
    fn staged(&self, contents: &str) -> Result<NamedTempFile> {
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|e| ClinicError::storage(&self.root, e))?;
        tmp.write_all(contents.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| ClinicError::storage(tmp.path(), e))?;
        Ok(tmp)
    }
}

fn corrupt_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".corrupt");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u64,
        label: String,
    }

    fn row(id: u64, label: &str) -> Row {
        Row {
            id,
            label: label.to_string(),
        }
    }

    #[test]
    fn test_missing_file_loads_empty_and_is_created() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();

        let rows: Vec<Row> = store.load(Collection::Appointments);
        assert!(rows.is_empty());

        let raw = fs::read_to_string(store.path(Collection::Appointments)).unwrap();
        assert_eq!(raw.trim(), "[]");
    }

    #[test]
    fn test_corrupt_file_loads_empty_and_is_kept_aside() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        fs::write(store.path(Collection::Invoices), "{ not json").unwrap();

        let rows: Vec<Row> = store.load(Collection::Invoices);
        assert!(rows.is_empty());

        store.save(Collection::Invoices, &[row(1, "new")]).unwrap();
        let kept = fs::read_to_string(temp_dir.path().join("invoices.json.corrupt")).unwrap();
        assert_eq!(kept, "{ not json");
    }

    #[test]
    fn test_load_of_missing_file_never_overwrites_existing_data() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        let path = store.path(Collection::Users);

        assert!(store.create_empty(&path).unwrap());
        store.save(Collection::Users, &[row(1, "kept")]).unwrap();
        assert!(!store.create_empty(&path).unwrap());

        let loaded: Vec<Row> = store.load(Collection::Users);
        assert_eq!(loaded, vec![row(1, "kept")]);
    }

    #[test]
    fn test_stores_on_same_dir_share_locks() {
        let temp_dir = TempDir::new().unwrap();
        let first = FileStore::open(temp_dir.path()).unwrap();
        let second = FileStore::open(temp_dir.path().join(".")).unwrap();
        let elsewhere = TempDir::new().unwrap();
        let other = FileStore::open(elsewhere.path()).unwrap();

        let _guard = first.lock(Collection::Appointments);
        assert!(second.locks[Collection::Appointments.index()].try_lock().is_err());
        assert!(second.locks[Collection::Invoices.index()].try_lock().is_ok());
        assert!(other.locks[Collection::Appointments.index()].try_lock().is_ok());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        let rows = vec![row(1, "first"), row(2, "second")];

        store.save(Collection::Patients, &rows).unwrap();

        let loaded: Vec<Row> = store.load(Collection::Patients);
        assert_eq!(loaded, rows);
    }

    #[test]
    fn test_save_is_whole_collection_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();

        store.save(Collection::Users, &[row(1, "a"), row(2, "b")]).unwrap();
        store.save(Collection::Users, &[row(3, "c")]).unwrap();

        let loaded: Vec<Row> = store.load(Collection::Users);
        assert_eq!(loaded, vec![row(3, "c")]);
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        store.save(Collection::Notifications, &[row(1, "x")]).unwrap();

        let entries: Vec<_> = fs::read_dir(temp_dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_save_failure_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("store");
        let store = FileStore::open(&root).unwrap();
        fs::remove_dir_all(&root).unwrap();

        let result = store.save(Collection::Users, &[row(1, "lost")]);
        assert!(matches!(result, Err(ClinicError::Storage { .. })));
    }

    #[test]
    fn test_collection_file_names() {
        let names: Vec<&str> = Collection::ALL.iter().map(|c| c.file_name()).collect();
        assert_eq!(
            names,
            vec![
                "users.json",
                "patients.json",
                "appointments.json",
                "invoices.json",
                "notifications.json"
            ]
        );
        assert_eq!(Collection::Appointments.to_string(), "appointments");
    }
}
