//! Money engine for quotes, deposits and invoices.
//!
//! Line totals, TVA and document aggregation are pure functions of their
//! inputs. Deposit figures are derived from a document's totals.

pub mod calculators;
pub mod deposits;
pub mod tax;

// Re-export commonly used items
pub use calculators::{
    compute_line, document_totals, line_tax, line_total_ht, line_total_ttc, round_money,
    unit_price_ttc, DocumentTotals, LineInput, LineTotals, TaxBreakdown,
};
pub use deposits::{aggregate_deposits, deposit_amounts, remaining_balance, DepositAmounts, DepositSummary};
pub use tax::TaxRate;
