use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::audit::AuditLog;
use crate::error::Result;
use crate::models::{Account, Appointment, Invoice, Notification, Patient};
use crate::store::{Collection, FileStore};

/// A record type persisted as one [`Collection`].
pub trait Record: Serialize + DeserializeOwned + Clone {
    const COLLECTION: Collection;
}

/// Records carrying a numeric id assigned as `max(existing) + 1`.
pub trait Identified {
    fn id(&self) -> u64;
}

impl Record for Account {
    const COLLECTION: Collection = Collection::Users;
}

impl Record for Patient {
    const COLLECTION: Collection = Collection::Patients;
}

impl Record for Appointment {
    const COLLECTION: Collection = Collection::Appointments;
}

impl Record for Invoice {
    const COLLECTION: Collection = Collection::Invoices;
}

impl Record for Notification {
    const COLLECTION: Collection = Collection::Notifications;
}

impl Identified for Patient {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Identified for Appointment {
    fn id(&self) -> u64 {
        self.id
    }
}

impl Identified for Invoice {
    fn id(&self) -> u64 {
        self.id
    }
}

/// Next id for a collection; `1` when it is empty.
pub fn next_id<T: Identified>(records: &[T]) -> u64 {
    records
        .iter()
        .map(Identified::id)
        .max()
        .map_or(1, |max| max + 1)
}

/// In-memory working copy of one collection.
///
/// Every public operation refreshes the copy from the store first. Mutations
/// go through [`Repository::transact`], which holds the collection lock across
/// refresh, mutation and the whole-collection save.
#[derive(Debug)]
pub struct Repository<T: Record> {
    store: Arc<FileStore>,
    audit: Arc<AuditLog>,
    records: Vec<T>,
}

impl<T: Record> Repository<T> {
    pub fn new(store: Arc<FileStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            store,
            audit,
            records: Vec::new(),
        }
    }

    /// Replace the working copy with the collection's on-disk state.
    pub fn refresh(&mut self) -> &[T] {
        self.records = self.store.load(T::COLLECTION);
        &self.records
    }

    /// The working copy as of the last refresh.
    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<T> {
        &mut self.records
    }

    /// Write the working copy back, replacing the persisted collection.
    pub fn persist(&self) -> Result<()> {
        self.store.save(T::COLLECTION, &self.records)
    }

    /// Refresh, then run a read-only query against the fresh copy.
    pub fn read<R>(&mut self, query: impl FnOnce(&[T]) -> R) -> R {
        self.refresh();
        query(&self.records)
    }

    /// Refresh, mutate and persist under the collection lock.
    ///
    /// When `mutate` fails nothing is written and the working copy is
    /// reloaded, so a half-applied change never survives.
    pub fn transact<R>(&mut self, mutate: impl FnOnce(&mut Vec<T>) -> Result<R>) -> Result<R> {
        let store = Arc::clone(&self.store);
        let _guard = store.lock(T::COLLECTION);

        self.refresh();
        match mutate(&mut self.records) {
            Ok(value) => {
                self.persist()?;
                Ok(value)
            }
            Err(e) => {
                self.refresh();
                Err(e)
            }
        }
    }

    pub(crate) fn audit(&self) -> &AuditLog {
        &self.audit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClinicError;
    use crate::models::Role;
    use tempfile::TempDir;

    fn open_repo<T: Record>(temp_dir: &TempDir) -> Repository<T> {
        let store = Arc::new(FileStore::open(temp_dir.path()).unwrap());
        let audit = Arc::new(AuditLog::new(temp_dir.path()));
        Repository::new(store, audit)
    }

    fn patient(id: u64) -> Patient {
        Patient::linked(id, format!("user{id}"), format!("Patient {id}"))
    }

    #[test]
    fn test_next_id_empty_is_one() {
        let empty: Vec<Patient> = Vec::new();
        assert_eq!(next_id(&empty), 1);
    }

    #[test]
    fn test_next_id_is_max_plus_one() {
        let records = vec![patient(4), patient(2), patient(9)];
        assert_eq!(next_id(&records), 10);
    }

    #[test]
    fn test_transact_persists() {
        let temp_dir = TempDir::new().unwrap();
        let mut repo: Repository<Account> = open_repo(&temp_dir);

        repo.transact(|accounts| {
            accounts.push(Account::new("ana", "pw", Role::Patient, "Ana"));
            Ok(())
        })
        .unwrap();

        let mut other: Repository<Account> = open_repo(&temp_dir);
        assert_eq!(other.refresh().len(), 1);
    }

    #[test]
    fn test_failed_transact_leaves_state_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let mut repo: Repository<Patient> = open_repo(&temp_dir);
        repo.transact(|patients| {
            patients.push(patient(1));
            Ok(())
        })
        .unwrap();

        let result: Result<()> = repo.transact(|patients| {
            patients.clear();
            Err(ClinicError::invalid("rejected after touching the copy"))
        });

        assert!(result.is_err());
        assert_eq!(repo.records().len(), 1);
        let mut other: Repository<Patient> = open_repo(&temp_dir);
        assert_eq!(other.refresh().len(), 1);
    }

    #[test]
    fn test_sequential_sessions_keep_both_mutations() {
        let temp_dir = TempDir::new().unwrap();
        let mut first: Repository<Patient> = open_repo(&temp_dir);
        let mut second: Repository<Patient> = open_repo(&temp_dir);

        // Load second's stale copy before first writes.
        second.refresh();

        first
            .transact(|patients| {
                let id = next_id(patients);
                patients.push(patient(id));
                Ok(())
            })
            .unwrap();
        second
            .transact(|patients| {
                let id = next_id(patients);
                patients.push(patient(id));
                Ok(())
            })
            .unwrap();

        let ids: Vec<u64> = first.read(|patients| patients.iter().map(|p| p.id).collect());
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_interleaved_sessions_last_writer_wins() {
        let temp_dir = TempDir::new().unwrap();
        let mut first: Repository<Patient> = open_repo(&temp_dir);
        let mut second: Repository<Patient> = open_repo(&temp_dir);

        // Both in-flight mutations start from the same empty state.
        first.refresh();
        second.refresh();

        first.records_mut().push(patient(1));
        second.records_mut().push(patient(7));

        first.persist().unwrap();
        second.persist().unwrap();

        let ids: Vec<u64> = first.read(|patients| patients.iter().map(|p| p.id).collect());
        assert_eq!(ids, vec![7]);
    }
}
