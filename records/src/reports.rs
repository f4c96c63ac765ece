//! Derived views over the patient collection. Regenerated on demand and never
//! read back.

use std::fmt;
use std::fs;
use std::path::Path;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::access::require_management;
use crate::error::{ClinicError, Result};
use crate::models::{Patient, Principal};
use crate::patients::PatientDirectory;

const DELIMITER: &str = ";";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub patient_count: usize,
    /// Mean over patients whose age is known.
    pub average_age: Option<Decimal>,
    pub patients: Vec<Patient>,
}

impl Statistics {
    pub fn from_patients(patients: &[Patient]) -> Self {
        let ages: Vec<u32> = patients.iter().filter_map(|p| p.age).collect();
        let average_age = if ages.is_empty() {
            None
        } else {
            let sum: u64 = ages.iter().map(|&age| u64::from(age)).sum();
            let mean = Decimal::from(sum) / Decimal::from(ages.len() as u64);
            Some(mean.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        };

        Self {
            patient_count: patients.len(),
            average_age,
            patients: patients.to_vec(),
        }
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Clinic statistics report")?;
        writeln!(f, "{}", "=".repeat(40))?;
        writeln!(f, "Total patients: {}", self.patient_count)?;
        match self.average_age {
            Some(average) => writeln!(f, "Average age: {average:.2}")?,
            None => writeln!(f, "Average age: n/a")?,
        }
        writeln!(f)?;
        writeln!(f, "Patients:")?;
        for p in &self.patients {
            writeln!(
                f,
                "- {} | {} | {} | user: {}",
                p.name,
                p.age.map_or_else(|| "-".to_string(), |a| a.to_string()),
                p.phone,
                p.username.as_deref().unwrap_or("")
            )?;
        }
        Ok(())
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(DELIMITER) || value.contains(['"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// `;`-delimited rows with a `name;age;phone;username` header.
pub fn patients_csv(patients: &[Patient]) -> String {
    let mut out = String::from("name;age;phone;username\n");
    for p in patients {
        let age = p.age.map(|a| a.to_string()).unwrap_or_default();
        let row = [
            csv_field(&p.name),
            age,
            csv_field(&p.phone),
            csv_field(p.username.as_deref().unwrap_or("")),
        ];
        out.push_str(&row.join(DELIMITER));
        out.push('\n');
    }
    out
}

pub fn statistics(directory: &mut PatientDirectory, principal: &Principal) -> Result<Statistics> {
    require_management(principal, "view statistics")?;
    let patients = directory.list(principal)?;
    Ok(Statistics::from_patients(&patients))
}

pub fn export_patients_csv(
    directory: &mut PatientDirectory,
    principal: &Principal,
    path: &Path,
) -> Result<usize> {
    require_management(principal, "export patients")?;
    let patients = directory.list(principal)?;
    fs::write(path, patients_csv(&patients)).map_err(|e| ClinicError::storage(path, e))?;

    directory
        .audit()
        .record(format!("patients exported to {}", path.display()));
    Ok(patients.len())
}

pub fn write_statistics(
    directory: &mut PatientDirectory,
    principal: &Principal,
    path: &Path,
) -> Result<Statistics> {
    let stats = statistics(directory, principal)?;
    fs::write(path, stats.to_string()).map_err(|e| ClinicError::storage(path, e))?;

    directory
        .audit()
        .record(format!("statistics report written to {}", path.display()));
    Ok(stats)
}
