use std::sync::Arc;

use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::access::require_management;
use crate::audit::AuditLog;
use crate::error::{ClinicError, Result};
use crate::models::{Installment, Invoice, Principal, Role};
use crate::repository::{next_id, Repository};
use crate::store::FileStore;

fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Split `total` into `count` installments.
///
/// Installments 1..n-1 get `round(total / n, 2)`; the last one gets whatever
/// remains, so the amounts always add back up to `total` to the cent. The
/// remainder may be zero when the rounded-up shares already cover the total.
pub fn plan_installments(total: Decimal, count: u32) -> Result<Vec<Installment>> {
    if total <= Decimal::ZERO {
        return Err(ClinicError::InvalidAmount(format!("total must be positive, got {total}")));
    }
    if total.normalize().scale() > 2 {
        return Err(ClinicError::InvalidAmount(format!(
            "total {total} has more than two decimal places"
        )));
    }
    if count == 0 {
        return Err(ClinicError::InvalidCount("at least one installment is required".into()));
    }
    if Decimal::from(count) * Decimal::new(1, 2) > total {
        return Err(ClinicError::InvalidCount(format!(
            "{count} installments would be smaller than one cent each"
        )));
    }

    let base = to_cents(total / Decimal::from(count));
    let mut installments: Vec<Installment> = (1..count)
        .map(|number| Installment {
            number,
            amount: base,
            paid: false,
        })
        .collect();

    let assigned: Decimal = installments.iter().map(|i| i.amount).sum();
    let last = to_cents(total - assigned);
    if last < Decimal::ZERO {
        return Err(ClinicError::InvalidCount(format!(
            "{count} installments of {base} exceed the total {total}"
        )));
    }
    installments.push(Installment {
        number: count,
        amount: last,
        paid: false,
    });

    Ok(installments)
}

/// Parse a typed amount; accepts `,` as the decimal separator.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    raw.trim()
        .replace(',', ".")
        .parse::<Decimal>()
        .map_err(|_| ClinicError::InvalidAmount(format!("'{}' is not a number", raw.trim())))
}

pub fn parse_count(raw: &str) -> Result<u32> {
    raw.trim()
        .parse::<u32>()
        .ok()
        .filter(|count| *count > 0)
        .ok_or_else(|| ClinicError::InvalidCount(format!("'{}' is not a positive integer", raw.trim())))
}

/// Invoice storage and installment bookkeeping.
#[derive(Debug)]
pub struct InvoiceLedger {
    repo: Repository<Invoice>,
}

impl InvoiceLedger {
    pub fn new(store: Arc<FileStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            repo: Repository::new(store, audit),
        }
    }

    pub fn create(
        &mut self,
        principal: &Principal,
        patient_username: &str,
        total: Decimal,
        count: u32,
    ) -> Result<Invoice> {
        require_management(principal, "create invoices")?;
        let patient_username = patient_username.trim();
        if patient_username.is_empty() {
            return Err(ClinicError::invalid("invoice needs a patient username"));
        }
        let installments = plan_installments(total, count)?;

        let invoice = self.repo.transact(|invoices| {
            let invoice = Invoice {
                id: next_id(invoices),
                patient_username: patient_username.to_string(),
                total,
                installments,
                created_at: Utc::now(),
            };
            invoices.push(invoice.clone());
            Ok(invoice)
        })?;

        self.repo.audit().record(format!(
            "invoice {} created for {patient_username}: {total} in {count} installment(s)",
            invoice.id
        ));
        Ok(invoice)
    }

    /// Patients see their own invoices whatever `patient` says; doctors must
    /// name a patient; management may filter or see everything.
    pub fn list_for(&mut self, principal: &Principal, patient: Option<&str>) -> Result<Vec<Invoice>> {
        let filter = match principal.role() {
            Role::Patient => Some(principal.username()),
            Role::Doctor => Some(patient.ok_or_else(|| {
                ClinicError::invalid("doctors must name the patient whose invoices to view")
            })?),
            Role::Management => patient,
        };

        Ok(self.repo.read(|invoices| {
            invoices
                .iter()
                .filter(|inv| filter.map_or(true, |u| inv.patient_username == u))
                .cloned()
                .collect()
        }))
    }

    /// Flip one installment between paid and pending.
    pub fn toggle_paid(&mut self, principal: &Principal, invoice_id: u64, number: u32) -> Result<Installment> {
        require_management(principal, "update invoices")?;

        let installment = self.repo.transact(|invoices| {
            let invoice = invoices
                .iter_mut()
                .find(|inv| inv.id == invoice_id)
                .ok_or_else(|| ClinicError::not_found("invoice", invoice_id))?;
            let installment = invoice.installment_mut(number).ok_or_else(|| {
                ClinicError::not_found("installment", format!("{invoice_id}/{number}"))
            })?;
            installment.paid = !installment.paid;
            Ok(installment.clone())
        })?;

        self.repo.audit().record(format!(
            "management {} marked installment {number} of invoice {invoice_id} as {}",
            principal.username(),
            if installment.paid { "paid" } else { "pending" }
        ));
        Ok(installment)
    }

    pub fn remove(&mut self, principal: &Principal, invoice_id: u64) -> Result<Invoice> {
        require_management(principal, "remove invoices")?;

        let removed = self.repo.transact(|invoices| {
            let index = invoices
                .iter()
                .position(|inv| inv.id == invoice_id)
                .ok_or_else(|| ClinicError::not_found("invoice", invoice_id))?;
            Ok(invoices.remove(index))
        })?;

        self.repo.audit().record(format!(
            "management {} removed invoice {invoice_id}",
            principal.username()
        ));
        Ok(removed)
    }
}
