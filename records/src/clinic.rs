use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::access::AccessControl;
use crate::audit::AuditLog;
use crate::config::ClinicConfig;
use crate::error::Result;
use crate::invoice::InvoiceLedger;
use crate::lifecycle::{AppointmentBook, NewAppointment};
use crate::models::{Appointment, AppointmentEdit, Principal};
use crate::patients::PatientDirectory;
use crate::relay::NotificationRelay;
use crate::reports::{self, Statistics};
use crate::store::FileStore;

const CSV_FILE: &str = "patients.csv";
const REPORT_FILE: &str = "statistics.txt";

/// One session over a clinic data directory.
///
/// All components share the same store and audit log but keep their own
/// working copies, so two `Clinic` handles on one directory behave as two
/// independent sessions.
#[derive(Debug)]
pub struct Clinic {
    config: ClinicConfig,
    store: Arc<FileStore>,
    pub access: AccessControl,
    pub patients: PatientDirectory,
    pub appointments: AppointmentBook,
    pub invoices: InvoiceLedger,
    pub relay: NotificationRelay,
}

impl Clinic {
    pub fn open(config: ClinicConfig) -> Result<Self> {
        let store = Arc::new(FileStore::open(&config.data_dir)?);
        let audit = Arc::new(AuditLog::new(store.root()));
        tracing::info!(data_dir = %config.data_dir.display(), policy = ?config.transition_policy, "clinic opened");

        Ok(Self {
            access: AccessControl::new(Arc::clone(&store), Arc::clone(&audit), config.auth_code.clone()),
            patients: PatientDirectory::new(Arc::clone(&store), Arc::clone(&audit)),
            appointments: AppointmentBook::new(
                Arc::clone(&store),
                Arc::clone(&audit),
                config.transition_policy,
            ),
            invoices: InvoiceLedger::new(Arc::clone(&store), Arc::clone(&audit)),
            relay: NotificationRelay::new(Arc::clone(&store), audit),
            store,
            config,
        })
    }

    pub fn config(&self) -> &ClinicConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        self.store.root()
    }

    /// Schedule against the current doctor roster.
    pub fn schedule_appointment(
        &mut self,
        principal: &Principal,
        request: NewAppointment,
    ) -> Result<Appointment> {
        let roster = self.access.doctors();
        self.appointments.schedule(principal, request, &roster)
    }

    pub fn edit_appointment(
        &mut self,
        principal: &Principal,
        id: u64,
        edit: AppointmentEdit,
    ) -> Result<Appointment> {
        let roster = self.access.doctors();
        self.appointments.edit(principal, id, edit, &roster)
    }

    /// Export patients as CSV, by default into the data directory.
    pub fn export_patients_csv(
        &mut self,
        principal: &Principal,
        path: Option<&Path>,
    ) -> Result<(PathBuf, usize)> {
        let path = path.map_or_else(|| self.data_dir().join(CSV_FILE), Path::to_path_buf);
        let count = reports::export_patients_csv(&mut self.patients, principal, &path)?;
        Ok((path, count))
    }

    /// Write the statistics summary, by default into the data directory.
    pub fn write_statistics(
        &mut self,
        principal: &Principal,
        path: Option<&Path>,
    ) -> Result<(PathBuf, Statistics)> {
        let path = path.map_or_else(|| self.data_dir().join(REPORT_FILE), Path::to_path_buf);
        let stats = reports::write_statistics(&mut self.patients, principal, &path)?;
        Ok((path, stats))
    }
}
