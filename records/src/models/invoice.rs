use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    /// 1-based position within the invoice.
    pub number: u32,
    pub amount: Decimal,
    pub paid: bool,
}

/// An invoice split into installments whose amounts always sum to `total`.
///
/// Structure is fixed at creation; only the `paid` flags change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: u64,
    pub patient_username: String,
    pub total: Decimal,
    pub installments: Vec<Installment>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn pending_count(&self) -> usize {
        self.installments.iter().filter(|i| !i.paid).count()
    }

    pub fn paid_total(&self) -> Decimal {
        self.installments
            .iter()
            .filter(|i| i.paid)
            .map(|i| i.amount)
            .sum()
    }

    pub fn installment_mut(&mut self, number: u32) -> Option<&mut Installment> {
        self.installments.iter_mut().find(|i| i.number == number)
    }
}
