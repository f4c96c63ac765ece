use std::sync::Arc;

use chrono::Utc;

use crate::access::require_management;
use crate::audit::AuditLog;
use crate::error::{ClinicError, Result};
use crate::models::{Notification, Principal};
use crate::repository::Repository;
use crate::store::FileStore;

/// Requests for management, e.g. a doctor asking for the authorization code
/// without it ever being printed to them.
#[derive(Debug)]
pub struct NotificationRelay {
    repo: Repository<Notification>,
}

impl NotificationRelay {
    pub fn new(store: Arc<FileStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            repo: Repository::new(store, audit),
        }
    }

    /// Append a request. No login is needed; the requester usually has none.
    pub fn submit(&mut self, username: &str, name: &str, message: &str) -> Result<Notification> {
        let (username, name, message) = (username.trim(), name.trim(), message.trim());
        if username.is_empty() || message.is_empty() {
            return Err(ClinicError::invalid(
                "a notification needs the requested username and a message",
            ));
        }

        let notification = Notification {
            timestamp: Utc::now(),
            username: username.to_string(),
            name: name.to_string(),
            message: message.to_string(),
        };
        let appended = notification.clone();
        self.repo.transact(move |notifications| {
            notifications.push(appended);
            Ok(())
        })?;

        self.repo.audit().record(format!(
            "notification from {username} / {name}: {message}"
        ));
        Ok(notification)
    }

    /// All notifications in submission order. Management only.
    pub fn list(&mut self, principal: &Principal) -> Result<Vec<Notification>> {
        require_management(principal, "read notifications")?;
        Ok(self.repo.read(|notifications| notifications.to_vec()))
    }
}
