use std::io::Write;

use anyhow::{bail, Context, Result};
use clinic_records::{
    Account, Appointment, AppointmentEdit, Clinic, DoctorOnboarding, Invoice, NewAppointment,
    NewPatient, Patient, PatientUpdate, Principal, Role, Signup,
};

use crate::args::{
    AccountCommand, AppointmentCommand, Command, Credentials, InvoiceCommand, PatientCommand,
    ReportCommand, SignupArgs,
};

impl From<SignupArgs> for Signup {
    fn from(args: SignupArgs) -> Self {
        Signup::new(args.username, args.password, args.name)
    }
}

fn login(clinic: &mut Clinic, credentials: &Credentials) -> Result<Principal> {
    let (Some(user), Some(password), Some(role)) = (
        credentials.user.as_deref(),
        credentials.password.as_deref(),
        credentials.role,
    ) else {
        bail!("this command needs --user, --password and --role");
    };
    clinic
        .access
        .authenticate(user, password, role)
        .with_context(|| format!("login failed for '{user}'"))
}

fn print_account(out: &mut impl Write, account: &Account) -> Result<()> {
    writeln!(out, "{} | {} | {}", account.username, account.role, account.name)?;
    Ok(())
}

fn print_patient(out: &mut impl Write, patient: &Patient) -> Result<()> {
    writeln!(
        out,
        "#{} {} | age: {} | phone: {} | user: {}",
        patient.id,
        patient.name,
        patient.age.map_or_else(|| "-".to_string(), |age| age.to_string()),
        patient.phone,
        patient.username.as_deref().unwrap_or("-")
    )?;
    Ok(())
}

fn print_appointment(out: &mut impl Write, appointment: &Appointment) -> Result<()> {
    writeln!(
        out,
        "#{} {} | patient: {} ({}) | doctor: {} | {}",
        appointment.id,
        appointment.datetime,
        appointment.patient_name,
        appointment.patient_username,
        appointment.doctor_username.as_deref().unwrap_or("-"),
        appointment.status
    )?;
    if !appointment.notes.is_empty() {
        writeln!(out, "    notes: {}", appointment.notes)?;
    }
    Ok(())
}

fn print_invoice(out: &mut impl Write, invoice: &Invoice) -> Result<()> {
    writeln!(
        out,
        "invoice #{} for {} | total {} | paid {} | {} pending",
        invoice.id,
        invoice.patient_username,
        invoice.total,
        invoice.paid_total(),
        invoice.pending_count()
    )?;
    for installment in &invoice.installments {
        writeln!(
            out,
            "    {}. {} [{}]",
            installment.number,
            installment.amount,
            if installment.paid { "paid" } else { "pending" }
        )?;
    }
    Ok(())
}

/// Execute one subcommand against an open clinic, writing results to `out`.
pub fn run(
    clinic: &mut Clinic,
    credentials: &Credentials,
    command: Command,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Init => {
            let created = clinic.access.ensure_default_manager()?;
            if created {
                writeln!(out, "created default management login 'admin' (password 'admin')")?;
            }
            writeln!(out, "data directory ready: {}", clinic.data_dir().display())?;
        }
        Command::RegisterPatient(signup) => {
            let account = clinic.access.register_patient(signup.into())?;
            writeln!(out, "patient account '{}' registered", account.username)?;
        }
        Command::RegisterDoctor { signup, code } => {
            match clinic.access.onboard_doctor(signup.into(), code.as_deref())? {
                DoctorOnboarding::Created(account) => {
                    writeln!(out, "doctor account '{}' registered", account.username)?;
                }
                DoctorOnboarding::CodeRejected => {
                    writeln!(out, "authorization code missing or invalid; no account created")?;
                    writeln!(
                        out,
                        "ask management for the code with: clinic notify <username> <name> <message>"
                    )?;
                }
            }
        }
        Command::Notify { username, name, message } => {
            clinic.relay.submit(&username, &name, &message)?;
            writeln!(out, "message delivered to management")?;
        }
        Command::AuthCode => {
            let principal = login(clinic, credentials)?;
            writeln!(out, "{}", clinic.access.reveal_auth_code(&principal)?)?;
        }
        Command::Account(command) => {
            let principal = login(clinic, credentials)?;
            run_account(clinic, &principal, command, out)?;
        }
        Command::Patient(command) => {
            let principal = login(clinic, credentials)?;
            run_patient(clinic, &principal, command, out)?;
        }
        Command::Appointment(command) => {
            let principal = login(clinic, credentials)?;
            run_appointment(clinic, &principal, command, out)?;
        }
        Command::Invoice(command) => {
            let principal = login(clinic, credentials)?;
            run_invoice(clinic, &principal, command, out)?;
        }
        Command::Notifications => {
            let principal = login(clinic, credentials)?;
            let notifications = clinic.relay.list(&principal)?;
            if notifications.is_empty() {
                writeln!(out, "no notifications")?;
            }
            for n in notifications {
                writeln!(
                    out,
                    "[{}] {} ({}): {}",
                    n.timestamp.format("%Y-%m-%d %H:%M"),
                    n.name,
                    n.username,
                    n.message
                )?;
            }
        }
        Command::Report(command) => {
            let principal = login(clinic, credentials)?;
            match command {
                ReportCommand::Csv { output } => {
                    let (path, rows) = clinic.export_patients_csv(&principal, output.as_deref())?;
                    writeln!(out, "exported {rows} patient(s) to {}", path.display())?;
                }
                ReportCommand::Stats { output } => {
                    let (path, stats) = clinic.write_statistics(&principal, output.as_deref())?;
                    write!(out, "{stats}")?;
                    writeln!(out, "report written to {}", path.display())?;
                }
            }
        }
    }
    Ok(())
}

fn run_account(
    clinic: &mut Clinic,
    principal: &Principal,
    command: AccountCommand,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        AccountCommand::Create { role, signup } => {
            let account = clinic.access.create_account(principal, role, signup.into())?;
            writeln!(out, "{} account '{}' created", account.role, account.username)?;
        }
        AccountCommand::Remove { username } => {
            let account = clinic.access.remove_account(principal, &username)?;
            writeln!(out, "account '{}' removed", account.username)?;
        }
        AccountCommand::Doctors => {
            for doctor in clinic.access.doctors() {
                print_account(out, &doctor)?;
            }
        }
    }
    Ok(())
}

fn run_patient(
    clinic: &mut Clinic,
    principal: &Principal,
    command: PatientCommand,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        PatientCommand::Me => {
            let patient = clinic.patients.own_record(principal)?;
            print_patient(out, &patient)?;
        }
        PatientCommand::List => {
            for patient in clinic.patients.list(principal)? {
                print_patient(out, &patient)?;
            }
        }
        PatientCommand::Create { name, age, phone, username } => {
            let patient = clinic.patients.create(
                principal,
                NewPatient { name, age, phone, username },
            )?;
            print_patient(out, &patient)?;
        }
        PatientCommand::Update { id, name, age, phone, username } => {
            let patient = clinic.patients.update(
                principal,
                id,
                PatientUpdate { name, age, phone, username },
            )?;
            print_patient(out, &patient)?;
        }
        PatientCommand::Remove { id } => {
            let patient = clinic.patients.remove(principal, id)?;
            writeln!(out, "patient #{} ({}) removed", patient.id, patient.name)?;
        }
    }
    Ok(())
}

fn run_appointment(
    clinic: &mut Clinic,
    principal: &Principal,
    command: AppointmentCommand,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        AppointmentCommand::Schedule { datetime, doctor, notes } => {
            let appointment = clinic.schedule_appointment(
                principal,
                NewAppointment { datetime, doctor, notes },
            )?;
            print_appointment(out, &appointment)?;
        }
        AppointmentCommand::List => {
            let appointments = clinic.appointments.list_for(principal);
            if appointments.is_empty() {
                writeln!(out, "no appointments")?;
            }
            for appointment in &appointments {
                print_appointment(out, appointment)?;
            }
        }
        AppointmentCommand::Edit { id, datetime, doctor, unassign } => {
            let edit = AppointmentEdit {
                datetime,
                doctor: if unassign { Some(None) } else { doctor.map(Some) },
            };
            if edit.is_empty() {
                bail!("nothing to change; pass --datetime, --doctor or --unassign");
            }
            let appointment = clinic.edit_appointment(principal, id, edit)?;
            print_appointment(out, &appointment)?;
        }
        AppointmentCommand::Cancel { id } => {
            let appointment = clinic.appointments.cancel(principal, id)?;
            print_appointment(out, &appointment)?;
        }
        AppointmentCommand::Remove { id } => {
            let appointment = clinic.appointments.remove(principal, id)?;
            writeln!(out, "appointment #{} removed", appointment.id)?;
        }
        AppointmentCommand::Status { id, status } => {
            let appointment = clinic.appointments.set_status(principal, id, status)?;
            print_appointment(out, &appointment)?;
        }
    }
    Ok(())
}

fn run_invoice(
    clinic: &mut Clinic,
    principal: &Principal,
    command: InvoiceCommand,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        InvoiceCommand::Create { patient, total, installments } => {
            if clinic.access.find(&patient).map(|a| a.role) != Some(Role::Patient) {
                tracing::warn!(patient = %patient, "invoice created for a username with no patient login");
            }
            let invoice = clinic.invoices.create(principal, &patient, total, installments)?;
            print_invoice(out, &invoice)?;
        }
        InvoiceCommand::List { patient } => {
            let invoices = clinic.invoices.list_for(principal, patient.as_deref())?;
            if invoices.is_empty() {
                writeln!(out, "no invoices")?;
            }
            for invoice in &invoices {
                print_invoice(out, invoice)?;
            }
        }
        InvoiceCommand::Toggle { id, number } => {
            let installment = clinic.invoices.toggle_paid(principal, id, number)?;
            writeln!(
                out,
                "installment {} of invoice #{id} is now {}",
                installment.number,
                if installment.paid { "paid" } else { "pending" }
            )?;
        }
        InvoiceCommand::Remove { id } => {
            let invoice = clinic.invoices.remove(principal, id)?;
            writeln!(out, "invoice #{} removed", invoice.id)?;
        }
    }
    Ok(())
}
