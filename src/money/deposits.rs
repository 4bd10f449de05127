//! Deposit (acompte) calculations against a quote's totals.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::deposit::{Deposit, DepositStatus};

use super::calculators::{checked_add, checked_div, checked_mul, percent_of, round_money};

/// Amounts owed for one deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DepositAmounts {
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_ht: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_ttc: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount_tax: Decimal,
}

/// Compute a deposit's HT/TTC/TVA amounts from the parent document totals.
///
/// HT and TTC are each taken as `percentage` of the document figure and rounded
/// to the cent; TVA is their exact difference, so the three amounts always add up.
///
/// # Errors
/// `InvalidPercentage` when `percentage <= 0`. Percentages above 100 are
/// accepted (see [`DepositSummary::percentage_sum`]). `InvalidAmount` when a
/// total is negative or the product overflows.
pub fn deposit_amounts(
    document_total_ht: Decimal,
    document_total_ttc: Decimal,
    percentage: Decimal,
) -> Result<DepositAmounts> {
    if percentage <= Decimal::ZERO {
        return Err(AppError::InvalidPercentage(percentage));
    }
    if document_total_ht < Decimal::ZERO || document_total_ttc < Decimal::ZERO {
        return Err(AppError::invalid_amount(
            "document_total",
            "document totals must not be negative",
        ));
    }

    let amount_ht = round_money(percent_of("amount_ht", document_total_ht, percentage)?, 2);
    let amount_ttc = round_money(percent_of("amount_ttc", document_total_ttc, percentage)?, 2);

    Ok(DepositAmounts {
        amount_ht,
        amount_ttc,
        amount_tax: amount_ttc - amount_ht,
    })
}

/// Aggregate view of a document's deposits
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositSummary {
    #[serde(with = "rust_decimal::serde::str")]
    pub total_paid_ttc: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_pending_ttc: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub percent_paid: Decimal,
    /// Sum of non-cancelled deposit percentages. Not capped: the UI warns above 100.
    #[serde(with = "rust_decimal::serde::str")]
    pub percentage_sum: Decimal,
    pub paid_count: usize,
    pub pending_count: usize,
}

impl DepositSummary {
    /// Whether the scheduled deposits ask for more than the whole document
    pub fn exceeds_total(&self) -> bool {
        self.percentage_sum > Decimal::ONE_HUNDRED
    }
}

/// Partition deposits by status and sum their TTC amounts.
///
/// Pending and overdue deposits both count as outstanding; cancelled deposits
/// are ignored entirely. `percent_paid` is 0 when the document total is 0.
///
/// # Errors
/// `InvalidAmount` when a sum overflows.
pub fn aggregate_deposits(deposits: &[Deposit], document_total_ttc: Decimal) -> Result<DepositSummary> {
    let mut total_paid_ttc = Decimal::ZERO;
    let mut total_pending_ttc = Decimal::ZERO;
    let mut percentage_sum = Decimal::ZERO;
    let mut paid_count = 0;
    let mut pending_count = 0;

    for deposit in deposits {
        match deposit.status {
            DepositStatus::Paid => {
                total_paid_ttc = checked_add("total_paid_ttc", total_paid_ttc, deposit.amount_ttc)?;
                paid_count += 1;
            }
            DepositStatus::Pending | DepositStatus::Overdue => {
                total_pending_ttc = checked_add("total_pending_ttc", total_pending_ttc, deposit.amount_ttc)?;
                pending_count += 1;
            }
            DepositStatus::Cancelled => continue,
        }
        percentage_sum = checked_add("percentage_sum", percentage_sum, deposit.percentage)?;
    }

    let percent_paid = if document_total_ttc.is_zero() {
        Decimal::ZERO
    } else {
        let ratio = checked_div("percent_paid", total_paid_ttc, document_total_ttc)?;
        round_money(checked_mul("percent_paid", ratio, Decimal::ONE_HUNDRED)?, 2)
    };

    Ok(DepositSummary {
        total_paid_ttc,
        total_pending_ttc,
        percent_paid,
        percentage_sum,
        paid_count,
        pending_count,
    })
}

/// Balance still owed on a document: never negative, even on overpayment.
pub fn remaining_balance(document_total_ttc: Decimal, total_paid_ttc: Decimal) -> Decimal {
    (document_total_ttc - total_paid_ttc).max(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deposit::DepositKind;
    use rust_decimal_macros::dec;

    fn deposit(percentage: Decimal, amount_ttc: Decimal, status: DepositStatus) -> Deposit {
        let mut d = Deposit::new(1, DepositKind::Custom, "test", percentage, None);
        d.amount_ttc = amount_ttc;
        d.status = status;
        d
    }

    #[test]
    fn test_deposit_amounts_thirty_percent() {
        let amounts = deposit_amounts(dec!(2150.00), dec!(2580.00), dec!(30)).unwrap();
        assert_eq!(amounts.amount_ht, dec!(645.00));
        assert_eq!(amounts.amount_ttc, dec!(774.00));
        assert_eq!(amounts.amount_tax, dec!(129.00));
    }

    #[test]
    fn test_deposit_amounts_tax_is_exact_difference() {
        for pct in [dec!(0.5), dec!(12.5), dec!(33.33), dec!(66.67), dec!(100), dec!(110)] {
            let amounts = deposit_amounts(dec!(1234.56), dec!(1481.47), pct).unwrap();
            assert_eq!(amounts.amount_ttc - amounts.amount_ht, amounts.amount_tax);
        }
    }

    #[test]
    fn test_deposit_amounts_rejects_non_positive_percentage() {
        assert!(matches!(
            deposit_amounts(dec!(100), dec!(120), dec!(0)),
            Err(AppError::InvalidPercentage(_))
        ));
        assert!(matches!(
            deposit_amounts(dec!(100), dec!(120), dec!(-10)),
            Err(AppError::InvalidPercentage(_))
        ));
    }

    #[test]
    fn test_aggregate_deposits_paid_and_pending() {
        let deposits = vec![
            deposit(dec!(20), dec!(500), DepositStatus::Paid),
            deposit(dec!(10), dec!(300), DepositStatus::Paid),
            deposit(dec!(10), dec!(200), DepositStatus::Pending),
        ];

        let summary = aggregate_deposits(&deposits, dec!(2580.00)).unwrap();

        assert_eq!(summary.total_paid_ttc, dec!(800));
        assert_eq!(summary.total_pending_ttc, dec!(200));
        assert_eq!(summary.percent_paid, round_money(dec!(800) / dec!(2580) * dec!(100), 2));
        assert_eq!(summary.paid_count, 2);
        assert_eq!(summary.pending_count, 1);
    }

    #[test]
    fn test_aggregate_deposits_ignores_cancelled_and_counts_overdue() {
        let deposits = vec![
            deposit(dec!(30), dec!(300), DepositStatus::Cancelled),
            deposit(dec!(40), dec!(400), DepositStatus::Overdue),
        ];

        let summary = aggregate_deposits(&deposits, dec!(1000)).unwrap();

        assert_eq!(summary.total_paid_ttc, dec!(0));
        assert_eq!(summary.total_pending_ttc, dec!(400));
        assert_eq!(summary.percentage_sum, dec!(40));
    }

    #[test]
    fn test_aggregate_deposits_zero_total() {
        let deposits = vec![deposit(dec!(50), dec!(10), DepositStatus::Paid)];
        let summary = aggregate_deposits(&deposits, dec!(0)).unwrap();
        assert_eq!(summary.percent_paid, dec!(0));
    }

    #[test]
    fn test_percentage_sum_over_hundred_is_reported_not_rejected() {
        let deposits = vec![
            deposit(dec!(60), dec!(600), DepositStatus::Pending),
            deposit(dec!(50), dec!(500), DepositStatus::Pending),
        ];
        let summary = aggregate_deposits(&deposits, dec!(1000)).unwrap();
        assert_eq!(summary.percentage_sum, dec!(110));
        assert!(summary.exceeds_total());
    }

    #[test]
    fn test_deposit_overflow_is_an_error() {
        let half = Decimal::MAX / dec!(2);
        assert!(matches!(
            deposit_amounts(half, half, dec!(300)),
            Err(AppError::InvalidAmount { .. })
        ));

        let deposits = vec![
            deposit(dec!(50), half, DepositStatus::Paid),
            deposit(dec!(50), half, DepositStatus::Paid),
            deposit(dec!(50), half, DepositStatus::Paid),
        ];
        assert!(matches!(
            aggregate_deposits(&deposits, dec!(1000)),
            Err(AppError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_remaining_balance_never_negative() {
        assert_eq!(remaining_balance(dec!(2580), dec!(774)), dec!(1806));
        assert_eq!(remaining_balance(dec!(100), dec!(100.01)), dec!(0));
        assert_eq!(remaining_balance(dec!(0), dec!(0)), dec!(0));
        for paid in [dec!(0), dec!(1), dec!(999.99), dec!(5000)] {
            assert!(remaining_balance(dec!(1000), paid) >= Decimal::ZERO);
        }
    }
}
