use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{ClinicError, Result};

/// Static placeholder handed out by management. No rotation or expiry.
pub const DEFAULT_AUTH_CODE: &str = "MGMT-2025-CODE";

/// Whether `completed` and `cancelled` appointments may be re-opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransitionPolicy {
    /// Terminal states stay terminal.
    #[default]
    Strict,
    /// Any status may follow any other.
    Permissive,
}

impl FromStr for TransitionPolicy {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "permissive" => Ok(Self::Permissive),
            other => Err(ClinicError::invalid(format!(
                "unknown transition policy '{other}'"
            ))),
        }
    }
}

/// Clinic configuration
#[derive(Debug, Clone)]
pub struct ClinicConfig {
    pub data_dir: PathBuf,
    pub auth_code: String,
    pub transition_policy: TransitionPolicy,
}

impl ClinicConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_auth_code(mut self, code: impl Into<String>) -> Self {
        self.auth_code = code.into();
        self
    }

    pub fn with_transition_policy(mut self, policy: TransitionPolicy) -> Self {
        self.transition_policy = policy;
        self
    }

    /// Read configuration from environment variables with fallback
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("CLINIC_DATA_DIR").unwrap_or_else(|_| "data".to_string());
        let auth_code =
            std::env::var("CLINIC_AUTH_CODE").unwrap_or_else(|_| DEFAULT_AUTH_CODE.to_string());
        let transition_policy = match std::env::var("CLINIC_TRANSITION_POLICY") {
            Ok(raw) => raw.parse()?,
            Err(_) => TransitionPolicy::default(),
        };

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            auth_code,
            transition_policy,
        })
    }
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            auth_code: DEFAULT_AUTH_CODE.to_string(),
            transition_policy: TransitionPolicy::Strict,
        }
    }
}
