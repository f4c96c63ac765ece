use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ClinicError;

/// Closed set of roles a principal can act under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Management,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Management => "management",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "patient" => Ok(Self::Patient),
            "doctor" => Ok(Self::Doctor),
            "management" => Ok(Self::Management),
            other => Err(ClinicError::invalid(format!("unknown role '{other}'"))),
        }
    }
}

/// A registered login. `username` is the stable identity and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    /// Opaque comparison secret.
    pub password: String,
    pub role: Role,
    pub name: String,
}

impl Account {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        role: Role,
        name: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role,
            name: name.into(),
        }
    }
}

/// An authenticated account acting under its role.
///
/// Only produced by a successful authentication, so holding one is proof the
/// credential check happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    username: String,
    role: Role,
    name: String,
}

impl Principal {
    pub(crate) fn from_account(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            role: account.role,
            name: account.name.clone(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
