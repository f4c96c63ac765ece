use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Out-of-band request addressed to management. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub timestamp: DateTime<Utc>,
    pub username: String,
    pub name: String,
    pub message: String,
}
