//! Core money and TVA calculation functions.
//!
//! Pure functions for quote and invoice math - no database access.

use std::collections::BTreeMap;

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::money::tax::TaxRate;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Round to specified decimal places using standard half-up rounding.
///
/// Values exactly halfway between two possibilities round away from zero,
/// which is how amounts are printed on quotes and invoices.
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use devis_core::money::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(3));
/// assert_eq!(round_money(dec!(2.345), 2), dec!(2.35));
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero)
}

/// Reason carried by `InvalidAmount` when a result no longer fits in a `Decimal`
pub(crate) const OVERFLOW: &str = "overflow";

pub(crate) fn checked_mul(field: &'static str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_mul(b).ok_or_else(|| AppError::invalid_amount(field, OVERFLOW))
}

pub(crate) fn checked_add(field: &'static str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_add(b).ok_or_else(|| AppError::invalid_amount(field, OVERFLOW))
}

pub(crate) fn checked_div(field: &'static str, a: Decimal, b: Decimal) -> Result<Decimal> {
    a.checked_div(b).ok_or_else(|| AppError::invalid_amount(field, OVERFLOW))
}

/// `amount × pct / 100`
pub(crate) fn percent_of(field: &'static str, amount: Decimal, pct: Decimal) -> Result<Decimal> {
    checked_div(field, checked_mul(field, amount, pct)?, HUNDRED)
}

/// `amount × (1 + rate/100)`, rounded to the cent
fn with_tax(field: &'static str, amount: Decimal, rate: TaxRate) -> Result<Decimal> {
    let factor = Decimal::ONE + rate.percent() / HUNDRED;
    Ok(round_money(checked_mul(field, amount, factor)?, 2))
}

/// Validate that a percentage lies in [0, 100].
pub(crate) fn check_discount(field: &'static str, pct: Decimal) -> Result<()> {
    if pct < Decimal::ZERO || pct > HUNDRED {
        return Err(AppError::invalid_amount(
            field,
            format!("{} is outside [0, 100]", pct),
        ));
    }
    Ok(())
}

/// Pre-tax total of one line: `quantity × unit_price_ht × (1 − discount_pct/100)`.
///
/// # Errors
/// `InvalidAmount` when quantity or unit price is negative, or the discount is
/// outside [0, 100], or when the product overflows. Inputs are never clamped.
pub fn line_total_ht(quantity: Decimal, unit_price_ht: Decimal, discount_pct: Decimal) -> Result<Decimal> {
    if quantity < Decimal::ZERO {
        return Err(AppError::invalid_amount("quantity", format!("{} is negative", quantity)));
    }
    if unit_price_ht < Decimal::ZERO {
        return Err(AppError::invalid_amount(
            "unit_price_ht",
            format!("{} is negative", unit_price_ht),
        ));
    }
    check_discount("discount_pct", discount_pct)?;

    let gross = checked_mul("line_total_ht", quantity, unit_price_ht)?;
    let discount = percent_of("line_total_ht", gross, discount_pct)?;
    Ok(round_money(gross - discount, 2))
}

/// Tax-inclusive total of a line: `total_ht × (1 + rate/100)`.
pub fn line_total_ttc(total_ht: Decimal, rate: TaxRate) -> Result<Decimal> {
    with_tax("line_total_ttc", total_ht, rate)
}

/// TVA carried by a line
pub fn line_tax(total_ht: Decimal, total_ttc: Decimal) -> Decimal {
    total_ttc - total_ht
}

/// Unit price including TVA, as shown next to the HT unit price.
pub fn unit_price_ttc(unit_price_ht: Decimal, rate: TaxRate) -> Result<Decimal> {
    with_tax("unit_price_ttc", unit_price_ht, rate)
}

/// Inputs for a single priced line
#[derive(Debug, Clone)]
pub struct LineInput {
    pub quantity: Decimal,
    pub unit_price_ht: Decimal,
    pub discount_pct: Decimal,
    pub tax_rate: TaxRate,
}

/// Derived totals of a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineTotals {
    pub tax_rate: TaxRate,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_ht: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_ttc: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub tax: Decimal,
}

/// Compute HT, TTC and TVA for one line.
pub fn compute_line(input: &LineInput) -> Result<LineTotals> {
    let total_ht = line_total_ht(input.quantity, input.unit_price_ht, input.discount_pct)?;
    let total_ttc = line_total_ttc(total_ht, input.tax_rate)?;
    Ok(LineTotals {
        tax_rate: input.tax_rate,
        total_ht,
        total_ttc,
        tax: line_tax(total_ht, total_ttc),
    })
}

/// Per-rate sums of line totals, before the document discount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaxBreakdown {
    pub rate: TaxRate,
    #[serde(with = "rust_decimal::serde::str")]
    pub base_ht: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub tax: Decimal,
}

/// Totals of a quote or invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentTotals {
    #[serde(with = "rust_decimal::serde::str")]
    pub subtotal_ht: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub discount_value: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_ht: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_ttc: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub tax_value: Decimal,
    pub breakdown: Vec<TaxBreakdown>,
}

impl DocumentTotals {
    pub fn zero() -> Self {
        Self {
            subtotal_ht: Decimal::ZERO,
            discount_value: Decimal::ZERO,
            total_ht: Decimal::ZERO,
            total_ttc: Decimal::ZERO,
            tax_value: Decimal::ZERO,
            breakdown: vec![],
        }
    }
}

/// Aggregate line totals into document totals.
///
/// The document discount is applied to the HT subtotal and, separately, to the
/// sum of line TTC amounts. TVA is the difference of the two discounted totals,
/// so lines at different rates each keep their own rate.
pub fn document_totals(lines: &[LineTotals], discount_pct: Decimal) -> Result<DocumentTotals> {
    check_discount("document_discount_pct", discount_pct)?;

    let mut subtotal_ht = Decimal::ZERO;
    let mut lines_ttc = Decimal::ZERO;
    let mut by_rate: BTreeMap<TaxRate, (Decimal, Decimal)> = BTreeMap::new();

    for line in lines {
        subtotal_ht = checked_add("subtotal_ht", subtotal_ht, line.total_ht)?;
        lines_ttc = checked_add("total_ttc", lines_ttc, line.total_ttc)?;
        let entry = by_rate.entry(line.tax_rate).or_insert((Decimal::ZERO, Decimal::ZERO));
        entry.0 = checked_add("base_ht", entry.0, line.total_ht)?;
        entry.1 = checked_add("tax", entry.1, line.tax)?;
    }

    let discount_value = round_money(percent_of("discount_value", subtotal_ht, discount_pct)?, 2);
    let total_ht = subtotal_ht - discount_value;

    let discount_ttc = round_money(percent_of("total_ttc", lines_ttc, discount_pct)?, 2);
    let total_ttc = lines_ttc - discount_ttc;

    let breakdown = by_rate
        .into_iter()
        .map(|(rate, (base_ht, tax))| TaxBreakdown { rate, base_ht, tax })
        .collect();

    Ok(DocumentTotals {
        subtotal_ht,
        discount_value,
        total_ht,
        total_ttc,
        tax_value: total_ttc - total_ht,
        breakdown,
    })
}

/// Sale prices of a catalogue product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPricing {
    pub margin_ht: Decimal,
    pub margin_pct: Decimal,
    pub sale_price_ht: Decimal,
    pub sale_price_ttc: Decimal,
}

/// Derive a product's sale price from its purchase price and margin.
///
/// A positive `margin_pct` wins over `margin_ht`; otherwise the percentage is
/// back-computed from the absolute margin.
pub fn product_pricing(
    purchase_price: Decimal,
    margin_pct: Decimal,
    margin_ht: Decimal,
    rate: TaxRate,
) -> Result<ProductPricing> {
    if purchase_price < Decimal::ZERO {
        return Err(AppError::invalid_amount(
            "purchase_price",
            format!("{} is negative", purchase_price),
        ));
    }
    if margin_pct < Decimal::ZERO {
        return Err(AppError::invalid_amount("margin_pct", format!("{} is negative", margin_pct)));
    }

    let (margin_ht, margin_pct) = if margin_pct > Decimal::ZERO {
        (round_money(percent_of("margin_ht", purchase_price, margin_pct)?, 2), margin_pct)
    } else if purchase_price > Decimal::ZERO {
        let ratio = checked_div("margin_pct", margin_ht, purchase_price)?;
        (margin_ht, round_money(checked_mul("margin_pct", ratio, HUNDRED)?, 2))
    } else {
        (margin_ht, Decimal::ZERO)
    };

    let sale_price_ht = checked_add("sale_price_ht", purchase_price, margin_ht)?;
    Ok(ProductPricing {
        margin_ht,
        margin_pct,
        sale_price_ht,
        sale_price_ttc: unit_price_ttc(sale_price_ht, rate)?,
    })
}
