use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

const LOG_FILE: &str = "actions.log";
const HEADER: &str = "Clinic records action log";

/// Append-only `[timestamp] message` log of state-changing actions.
///
/// Write failures are reported through `tracing` and swallowed: the audited
/// change has already been persisted by the time it is recorded.
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(LOG_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!(target: "audit", "{message}");

        if let Err(e) = self.append(message) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to append audit entry");
        }
    }

    fn append(&self, message: &str) -> std::io::Result<()> {
        let is_new = !self.path.exists();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if is_new {
            writeln!(file, "{HEADER}")?;
        }
        writeln!(
            file,
            "[{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            message
        )
    }
}
