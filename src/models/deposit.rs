//! Deposits (acomptes) scheduled against a quote.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::money::deposits::deposit_amounts;

code_enum! {
    pub enum DepositKind {
        Initial => "inicial",
        Intermediate => "intermediario",
        Final => "final",
        Custom => "personalizado",
    }
}

code_enum! {
    pub enum DepositStatus {
        Pending => "pendente",
        Paid => "pago",
        Overdue => "vencido",
        Cancelled => "cancelado",
    }
}

/// A partial payment requested as a percentage of a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: i64,
    pub number: String,
    pub quote_id: i64,
    pub kind: DepositKind,
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub percentage: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_ht: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_ttc: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_tax: Decimal,
    pub due_date: Option<NaiveDate>,
    pub status: DepositStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Deposit {
    /// New pending deposit with zero amounts; call [`Deposit::recompute`] to price it.
    pub fn new(
        quote_id: i64,
        kind: DepositKind,
        description: impl Into<String>,
        percentage: Decimal,
        due_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: 0,
            number: String::new(),
            quote_id,
            kind,
            description: description.into(),
            percentage,
            amount_ht: Decimal::ZERO,
            amount_ttc: Decimal::ZERO,
            amount_tax: Decimal::ZERO,
            due_date,
            status: DepositStatus::Pending,
            paid_at: None,
        }
    }

    /// Re-derive amounts from the parent quote's totals.
    pub fn recompute(&mut self, quote_total_ht: Decimal, quote_total_ttc: Decimal) -> Result<()> {
        let amounts = deposit_amounts(quote_total_ht, quote_total_ttc, self.percentage)?;
        self.amount_ht = amounts.amount_ht;
        self.amount_ttc = amounts.amount_ttc;
        self.amount_tax = amounts.amount_tax;
        Ok(())
    }

    /// Still awaiting payment (pending or overdue)
    pub fn is_outstanding(&self) -> bool {
        matches!(self.status, DepositStatus::Pending | DepositStatus::Overdue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_recompute_thirty_percent() {
        let mut deposit = Deposit::new(1, DepositKind::Initial, "Acompte", dec!(30), None);
        deposit.recompute(dec!(2150.00), dec!(2580.00)).unwrap();
        assert_eq!(deposit.amount_ht, dec!(645.00));
        assert_eq!(deposit.amount_ttc, dec!(774.00));
        assert_eq!(deposit.amount_tax, dec!(129.00));
    }

    #[test]
    fn test_recompute_rejects_zero_percentage() {
        let mut deposit = Deposit::new(1, DepositKind::Custom, "x", dec!(0), None);
        assert!(deposit.recompute(dec!(100), dec!(120)).is_err());
        assert_eq!(deposit.amount_ttc, dec!(0));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(DepositStatus::Overdue.as_str(), "vencido");
        assert_eq!(DepositKind::from_code("intermediario"), Some(DepositKind::Intermediate));
    }
}
