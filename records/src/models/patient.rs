use serde::{Deserialize, Serialize};

use crate::error::{ClinicError, Result};

pub const PHONE_NOT_PROVIDED: &str = "not provided";

/// A patient record, optionally linked to a login by username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl Patient {
    /// Record auto-created for a freshly registered patient account.
    pub fn linked(id: u64, username: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            age: None,
            phone: PHONE_NOT_PROVIDED.to_string(),
            username: Some(username.into()),
        }
    }

    pub fn is_linked_to(&self, username: &str) -> bool {
        self.username.as_deref() == Some(username)
    }
}

/// Input for a management-created patient record.
#[derive(Debug, Clone, Default)]
pub struct NewPatient {
    pub name: String,
    pub age: Option<u32>,
    pub phone: Option<String>,
    pub username: Option<String>,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct PatientUpdate {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub phone: Option<String>,
    pub username: Option<String>,
}

/// Parse an age typed by a caller. Negative or non-numeric values are rejected.
pub fn parse_age(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .map_err(|_| ClinicError::invalid(format!("age must be a non-negative integer, got '{}'", raw.trim())))
}
