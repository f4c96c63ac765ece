use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clinic_records::invoice::{parse_amount, parse_count};
use clinic_records::{parse_age, AppointmentStatus, Role};
use rust_decimal::Decimal;

#[derive(Parser, Debug)]
#[command(name = "clinic")]
#[command(about = "Clinic records: accounts, patients, appointments and invoices")]
#[command(version)]
pub struct Cli {
    /// Directory holding the JSON collections and the action log
    #[arg(long, global = true, env = "CLINIC_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(flatten)]
    pub credentials: Credentials,

    #[command(subcommand)]
    pub command: Command,
}

/// Login used by every privileged subcommand.
#[derive(Args, Debug, Default)]
pub struct Credentials {
    #[arg(long, global = true, env = "CLINIC_USER")]
    pub user: Option<String>,

    #[arg(long, global = true, env = "CLINIC_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// patient, doctor or management
    #[arg(long, global = true)]
    pub role: Option<Role>,
}

#[derive(Args, Debug)]
pub struct SignupArgs {
    pub username: String,
    #[arg(id = "new_password", value_name = "PASSWORD")]
    pub password: String,
    /// Display name
    pub name: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the data files and a default management login
    Init,

    /// Self-service patient registration
    RegisterPatient(SignupArgs),

    /// Self-service doctor registration; needs the authorization code
    RegisterDoctor {
        #[command(flatten)]
        signup: SignupArgs,

        #[arg(long, env = "CLINIC_DOCTOR_CODE", hide_env_values = true)]
        code: Option<String>,
    },

    /// Leave a message for management, e.g. to request the doctor code
    Notify {
        username: String,
        name: String,
        message: String,
    },

    /// Show the doctor authorization code (management)
    AuthCode,

    #[command(subcommand)]
    Account(AccountCommand),

    #[command(subcommand)]
    Patient(PatientCommand),

    #[command(subcommand)]
    Appointment(AppointmentCommand),

    #[command(subcommand)]
    Invoice(InvoiceCommand),

    /// List messages left for management
    Notifications,

    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Subcommand, Debug)]
pub enum AccountCommand {
    /// Create an account of any role (management)
    Create {
        #[arg(id = "account_role", value_name = "ROLE")]
        role: Role,
        #[command(flatten)]
        signup: SignupArgs,
    },
    Remove {
        username: String,
    },
    /// List doctor accounts
    Doctors,
}

#[derive(Subcommand, Debug)]
pub enum PatientCommand {
    /// Show the caller's own patient record
    Me,
    List,
    Create {
        name: String,
        #[arg(long, value_parser = parse_age)]
        age: Option<u32>,
        #[arg(long)]
        phone: Option<String>,
        /// Link the record to an existing login
        #[arg(long)]
        username: Option<String>,
    },
    Update {
        id: u64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_parser = parse_age)]
        age: Option<u32>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        username: Option<String>,
    },
    Remove {
        id: u64,
    },
}

#[derive(Subcommand, Debug)]
pub enum AppointmentCommand {
    Schedule {
        datetime: String,
        #[arg(long)]
        doctor: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    List,
    Edit {
        id: u64,
        #[arg(long)]
        datetime: Option<String>,
        #[arg(long, conflicts_with = "unassign")]
        doctor: Option<String>,
        /// Remove the assigned doctor
        #[arg(long)]
        unassign: bool,
    },
    Cancel {
        id: u64,
    },
    Remove {
        id: u64,
    },
    /// Set the status of an assigned appointment (doctor)
    Status {
        id: u64,
        status: AppointmentStatus,
    },
}

#[derive(Subcommand, Debug)]
pub enum InvoiceCommand {
    Create {
        patient: String,
        #[arg(value_parser = parse_amount)]
        total: Decimal,
        #[arg(value_parser = parse_count)]
        installments: u32,
    },
    List {
        #[arg(long)]
        patient: Option<String>,
    },
    /// Flip an installment between paid and pending
    Toggle {
        id: u64,
        number: u32,
    },
    Remove {
        id: u64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Export patients as `;`-delimited CSV
    Csv {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Write the statistics summary
    Stats {
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
