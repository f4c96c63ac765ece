use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ClinicError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        Self::Scheduled,
        Self::Confirmed,
        Self::Completed,
        Self::Cancelled,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = ClinicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ClinicError::invalid(format!("unknown appointment status '{wanted}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: u64,
    pub patient_username: String,
    /// Snapshot taken at scheduling time; never re-synced with the account.
    pub patient_name: String,
    #[serde(default)]
    pub doctor_username: Option<String>,
    /// Free-form, not parsed.
    pub datetime: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
    pub modified_at: DateTime<Utc>,
    pub modified_by: String,
}

impl Appointment {
    pub fn is_owned_by(&self, username: &str) -> bool {
        self.patient_username == username
    }

    pub fn is_assigned_to(&self, username: &str) -> bool {
        self.doctor_username.as_deref() == Some(username)
    }

    pub(crate) fn touch(&mut self, actor: &str) {
        self.modified_at = Utc::now();
        self.modified_by = actor.to_string();
    }
}

/// Patient-side edit. `doctor: Some(None)` unassigns the doctor.
#[derive(Debug, Clone, Default)]
pub struct AppointmentEdit {
    pub datetime: Option<String>,
    pub doctor: Option<Option<String>>,
}

impl AppointmentEdit {
    pub fn is_empty(&self) -> bool {
        self.datetime.is_none() && self.doctor.is_none()
    }
}
