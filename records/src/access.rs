use std::sync::Arc;

use crate::audit::AuditLog;
use crate::error::{ClinicError, Result};
use crate::models::{Account, Patient, Principal, Role};
use crate::repository::{next_id, Repository};
use crate::store::FileStore;

const DEFAULT_MANAGER: (&str, &str, &str) = ("admin", "admin", "Administrator");

/// Desired credentials for a new account.
#[derive(Debug, Clone)]
pub struct Signup {
    pub username: String,
    pub password: String,
    pub name: String,
}

impl Signup {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            name: name.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        let username = self.username.trim();
        if username.is_empty() || username.chars().any(char::is_whitespace) {
            return Err(ClinicError::invalid(
                "username must be non-empty and contain no whitespace",
            ));
        }
        if self.password.is_empty() {
            return Err(ClinicError::invalid("password must not be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(ClinicError::invalid("name must not be empty"));
        }
        Ok(())
    }
}

/// Result of a self-service doctor signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoctorOnboarding {
    Created(Account),
    /// Code missing or wrong; nothing was created. Offer the notification
    /// relay so management can follow up.
    CodeRejected,
}

/// Fails unless `principal` acts as management.
pub(crate) fn require_management(principal: &Principal, action: &str) -> Result<()> {
    match principal.role() {
        Role::Management => Ok(()),
        Role::Patient | Role::Doctor => Err(ClinicError::unauthorized(format!(
            "{} ({}) may not {action}",
            principal.username(),
            principal.role()
        ))),
    }
}

/// Authentication, account onboarding and the doctor authorization code.
#[derive(Debug)]
pub struct AccessControl {
    accounts: Repository<Account>,
    patients: Repository<Patient>,
    auth_code: String,
}

impl AccessControl {
    pub fn new(store: Arc<FileStore>, audit: Arc<AuditLog>, auth_code: impl Into<String>) -> Self {
        Self {
            accounts: Repository::new(Arc::clone(&store), Arc::clone(&audit)),
            patients: Repository::new(store, audit),
            auth_code: auth_code.into(),
        }
    }

    pub fn authenticate(&mut self, username: &str, password: &str, expected: Role) -> Result<Principal> {
        let account = self
            .find(username)
            .ok_or_else(|| ClinicError::not_found("account", username))?;

        if account.password != password {
            tracing::info!(username, "rejected login: bad credential");
            return Err(ClinicError::BadCredential(username.to_string()));
        }
        if account.role != expected {
            return Err(ClinicError::WrongRole {
                username: username.to_string(),
                actual: account.role,
                expected,
            });
        }

        self.accounts
            .audit()
            .record(format!("login: {username} role={expected}"));
        Ok(Principal::from_account(&account))
    }

    /// Compare a supplied code against the single static management secret.
    pub fn authorize_doctor_creation(&self, supplied: &str) -> bool {
        !self.auth_code.is_empty() && supplied.trim() == self.auth_code
    }

    pub fn find(&mut self, username: &str) -> Option<Account> {
        self.accounts
            .read(|accounts| accounts.iter().find(|a| a.username == username).cloned())
    }

    /// Self-service patient registration. Also links a patient record.
    pub fn register_patient(&mut self, signup: Signup) -> Result<Account> {
        self.create(Role::Patient, signup)
    }

    /// Self-service doctor registration, gated on the authorization code.
    pub fn onboard_doctor(&mut self, signup: Signup, code: Option<&str>) -> Result<DoctorOnboarding> {
        match code {
            Some(code) if self.authorize_doctor_creation(code) => {
                self.create(Role::Doctor, signup).map(DoctorOnboarding::Created)
            }
            _ => {
                tracing::info!(username = %signup.username, "doctor signup refused: missing or invalid code");
                Ok(DoctorOnboarding::CodeRejected)
            }
        }
    }

    /// Management creates any kind of account without presenting the code.
    pub fn create_account(&mut self, principal: &Principal, role: Role, signup: Signup) -> Result<Account> {
        require_management(principal, "create accounts")?;
        self.create(role, signup)
    }

    pub fn remove_account(&mut self, principal: &Principal, username: &str) -> Result<Account> {
        require_management(principal, "remove accounts")?;

        let removed = self.accounts.transact(|accounts| {
            let index = accounts
                .iter()
                .position(|a| a.username == username)
                .ok_or_else(|| ClinicError::not_found("account", username))?;
            Ok(accounts.remove(index))
        })?;

        self.accounts.audit().record(format!(
            "management {} removed account {username}",
            principal.username()
        ));
        Ok(removed)
    }

    /// Current roster of doctor accounts.
    pub fn doctors(&mut self) -> Vec<Account> {
        self.accounts.read(|accounts| {
            accounts
                .iter()
                .filter(|a| a.role == Role::Doctor)
                .cloned()
                .collect()
        })
    }

    /// Fails with `NotFound` unless `username` is on the doctor roster.
    pub fn require_doctor(&mut self, username: &str) -> Result<()> {
        if self.doctors().iter().any(|d| d.username == username) {
            Ok(())
        } else {
            Err(ClinicError::not_found("doctor", username))
        }
    }

    /// Bootstrap a management login when none exists. Returns whether one
    /// was created.
    pub fn ensure_default_manager(&mut self) -> Result<bool> {
        let (username, password, name) = DEFAULT_MANAGER;
        let created = self.accounts.transact(|accounts| {
            if accounts.iter().any(|a| a.role == Role::Management) {
                return Ok(false);
            }
            if accounts.iter().any(|a| a.username == username) {
                return Err(ClinicError::DuplicateIdentity(username.to_string()));
            }
            accounts.push(Account::new(username, password, Role::Management, name));
            Ok(true)
        })?;

        if created {
            tracing::warn!("created default management account '{username}'; change its password");
            self.accounts
                .audit()
                .record(format!("default management account created: {username}"));
        }
        Ok(created)
    }

    pub fn reveal_auth_code(&self, principal: &Principal) -> Result<&str> {
        require_management(principal, "view the authorization code")?;
        self.accounts.audit().record(format!(
            "management {} viewed the authorization code",
            principal.username()
        ));
        Ok(&self.auth_code)
    }

    fn create(&mut self, role: Role, signup: Signup) -> Result<Account> {
        signup.validate()?;
        let account = Account::new(
            signup.username.trim(),
            signup.password,
            role,
            signup.name.trim(),
        );

        let inserted = account.clone();
        self.accounts.transact(move |accounts| {
            if accounts.iter().any(|a| a.username == inserted.username) {
                return Err(ClinicError::DuplicateIdentity(inserted.username));
            }
            accounts.push(inserted);
            Ok(())
        })?;
        self.accounts
            .audit()
            .record(format!("account created: {} ({role})", account.username));

        match role {
            Role::Patient => {
                self.ensure_linked_patient(&account.username, &account.name)?;
            }
            Role::Doctor | Role::Management => {}
        }
        Ok(account)
    }

    /// Check-before-insert keeps exactly one patient per linked username.
    fn ensure_linked_patient(&mut self, username: &str, name: &str) -> Result<bool> {
        let created = self.patients.transact(|patients| {
            if patients.iter().any(|p| p.is_linked_to(username)) {
                return Ok(false);
            }
            let id = next_id(patients);
            patients.push(Patient::linked(id, username, name));
            Ok(true)
        })?;

        if created {
            self.patients
                .audit()
                .record(format!("patient record created and linked to {username}"));
        }
        Ok(created)
    }
}
