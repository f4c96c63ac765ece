use std::sync::Arc;

use crate::access::require_management;
use crate::audit::AuditLog;
use crate::error::{ClinicError, Result};
use crate::models::{NewPatient, Patient, PatientUpdate, Principal, Role, PHONE_NOT_PROVIDED};
use crate::repository::{next_id, Repository};
use crate::store::FileStore;

/// Patient records: self-service view plus management CRUD.
#[derive(Debug)]
pub struct PatientDirectory {
    repo: Repository<Patient>,
}

impl PatientDirectory {
    pub fn new(store: Arc<FileStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            repo: Repository::new(store, audit),
        }
    }

    /// The record linked to a patient principal.
    pub fn own_record(&mut self, principal: &Principal) -> Result<Patient> {
        match principal.role() {
            Role::Patient => {}
            Role::Doctor | Role::Management => {
                return Err(ClinicError::unauthorized(
                    "only patients have a linked record to view",
                ))
            }
        }

        let username = principal.username();
        self.repo
            .read(|patients| patients.iter().find(|p| p.is_linked_to(username)).cloned())
            .ok_or_else(|| ClinicError::not_found("linked patient", username))
    }

    /// Every record. Doctors and management only.
    pub fn list(&mut self, principal: &Principal) -> Result<Vec<Patient>> {
        match principal.role() {
            Role::Doctor | Role::Management => Ok(self.repo.read(|patients| patients.to_vec())),
            Role::Patient => Err(ClinicError::unauthorized(
                "patients may only view their own record",
            )),
        }
    }

    pub fn create(&mut self, principal: &Principal, new: NewPatient) -> Result<Patient> {
        require_management(principal, "create patient records")?;
        if new.name.trim().is_empty() {
            return Err(ClinicError::invalid("patient name must not be empty"));
        }

        let created = self.repo.transact(|patients| {
            if let Some(username) = new.username.as_deref() {
                ensure_unlinked(patients, username, None)?;
            }
            let patient = Patient {
                id: next_id(patients),
                name: new.name.trim().to_string(),
                age: new.age,
                phone: new
                    .phone
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| PHONE_NOT_PROVIDED.to_string()),
                username: new.username,
            };
            patients.push(patient.clone());
            Ok(patient)
        })?;

        self.repo.audit().record(format!(
            "management {} created patient {} ({})",
            principal.username(),
            created.id,
            created.name
        ));
        Ok(created)
    }

    pub fn update(&mut self, principal: &Principal, id: u64, update: PatientUpdate) -> Result<Patient> {
        require_management(principal, "edit patient records")?;

        let updated = self.repo.transact(|patients| {
            let index = patients
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| ClinicError::not_found("patient", id))?;
            if let Some(username) = update.username.as_deref() {
                ensure_unlinked(patients, username, Some(id))?;
            }
            let patient = &mut patients[index];

            if let Some(name) = update.name.filter(|n| !n.trim().is_empty()) {
                patient.name = name.trim().to_string();
            }
            if let Some(age) = update.age {
                patient.age = Some(age);
            }
            if let Some(phone) = update.phone.filter(|p| !p.trim().is_empty()) {
                patient.phone = phone;
            }
            if let Some(username) = update.username {
                patient.username = Some(username);
            }
            Ok(patient.clone())
        })?;

        self.repo.audit().record(format!(
            "management {} edited patient {}",
            principal.username(),
            updated.id
        ));
        Ok(updated)
    }

    pub fn remove(&mut self, principal: &Principal, id: u64) -> Result<Patient> {
        require_management(principal, "remove patient records")?;

        let removed = self.repo.transact(|patients| {
            let index = patients
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| ClinicError::not_found("patient", id))?;
            Ok(patients.remove(index))
        })?;

        self.repo.audit().record(format!(
            "management {} removed patient {} ({})",
            principal.username(),
            removed.id,
            removed.name
        ));
        Ok(removed)
    }

    pub(crate) fn audit(&self) -> &AuditLog {
        self.repo.audit()
    }
}

/// A username may be linked to at most one patient record.
fn ensure_unlinked(patients: &[Patient], username: &str, except: Option<u64>) -> Result<()> {
    let taken = patients
        .iter()
        .any(|p| p.is_linked_to(username) && Some(p.id) != except);
    if taken {
        Err(ClinicError::DuplicateIdentity(username.to_string()))
    } else {
        Ok(())
    }
}
