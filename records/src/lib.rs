//! Clinic records: accounts, patients, appointments, invoices and management
//! notifications persisted as flat JSON collections.
//!
//! Every operation refreshes the collection it touches from disk, validates,
//! mutates the fresh copy and writes the whole collection back.

pub mod access;
pub mod audit;
pub mod clinic;
pub mod config;
pub mod error;
pub mod invoice;
pub mod lifecycle;
pub mod models;
pub mod patients;
pub mod relay;
pub mod reports;
pub mod repository;
pub mod store;

pub use access::{AccessControl, DoctorOnboarding, Signup};
pub use clinic::Clinic;
pub use config::{ClinicConfig, TransitionPolicy};
pub use error::{ClinicError, Result};
pub use invoice::{plan_installments, InvoiceLedger};
pub use lifecycle::{AppointmentBook, NewAppointment};
pub use models::*;
pub use patients::PatientDirectory;
pub use relay::NotificationRelay;
pub use reports::Statistics;
pub use repository::Repository;
pub use store::{Collection, FileStore};
