use std::path::PathBuf;

use thiserror::Error;

use crate::models::Role;

/// Errors raised by clinic record operations.
///
/// Everything except [`ClinicError::Storage`] and [`ClinicError::Serialization`]
/// is reported before any mutation, so the persisted collections are left as
/// they were.
#[derive(Debug, Error)]
pub enum ClinicError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid installment count: {0}")]
    InvalidCount(String),

    #[error("bad credential for {0}")]
    BadCredential(String),

    #[error("account {username} has role '{actual}', not '{expected}'")]
    WrongRole {
        username: String,
        actual: Role,
        expected: Role,
    },

    #[error("username already registered: {0}")]
    DuplicateIdentity(String),

    #[error("storage failure at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize records: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClinicError>;

impl ClinicError {
    /// Create not found error
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Create unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create validation error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Recoverable errors leave all state untouched; the rest abort the
    /// enclosing operation and nothing may be assumed persisted.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Storage { .. } | Self::Serialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = ClinicError::not_found("appointment", 42);
        assert_eq!(err.to_string(), "appointment not found: 42");
    }

    #[test]
    fn test_wrong_role_message() {
        let err = ClinicError::WrongRole {
            username: "ana".to_string(),
            actual: Role::Patient,
            expected: Role::Doctor,
        };
        assert_eq!(
            err.to_string(),
            "account ana has role 'patient', not 'doctor'"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(ClinicError::invalid("age").is_recoverable());
        assert!(ClinicError::unauthorized("nope").is_recoverable());
        assert!(ClinicError::BadCredential("ana".into()).is_recoverable());

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(!ClinicError::storage("/tmp/x.json", io).is_recoverable());
    }
}
