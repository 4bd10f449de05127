//! Priced lines shared by quotes and invoices.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::money::calculators::{line_total_ht, line_total_ttc, unit_price_ttc, LineTotals};
use crate::money::TaxRate;

code_enum! {
    /// Unit of measure of a line
    pub enum Unit {
        Unit => "unite",
        Piece => "piece",
        SquareMeter => "m2",
        LinearMeter => "ml",
        Length => "longueur",
        Kilogram => "kg",
        Hour => "heure",
        Flat => "forfait",
    }
}

code_enum! {
    /// Whether a line sells goods or labour
    pub enum Activity {
        Goods => "marchandise",
        Service => "service",
    }
}

/// Document a line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "document", content = "id", rename_all = "snake_case")]
pub enum LineOwner {
    Quote(i64),
    Invoice(i64),
}

/// One priced line of a quote or invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub owner: LineOwner,
    pub reference: String,
    pub description: String,
    pub unit: Unit,
    pub activity: Activity,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price_ht: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub unit_price_ttc: Decimal,
    /// Purchase cost, used for margin reporting only
    #[serde(with = "rust_decimal::serde::str")]
    pub purchase_unit_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub discount_pct: Decimal,
    pub tax_rate: TaxRate,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_ht: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_ttc: Decimal,
    pub position: u32,
}

impl LineItem {
    /// Create a line and derive its totals.
    pub fn new(
        owner: LineOwner,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price_ht: Decimal,
        tax_rate: TaxRate,
    ) -> Result<Self> {
        let mut item = Self {
            id: 0,
            owner,
            reference: String::new(),
            description: description.into(),
            unit: Unit::Unit,
            activity: Activity::Goods,
            quantity,
            unit_price_ht,
            unit_price_ttc: Decimal::ZERO,
            purchase_unit_price: Decimal::ZERO,
            discount_pct: Decimal::ZERO,
            tax_rate,
            total_ht: Decimal::ZERO,
            total_ttc: Decimal::ZERO,
            position: 0,
        };
        item.recompute()?;
        Ok(item)
    }

    /// Apply a per-line discount and re-derive totals.
    pub fn with_discount(mut self, discount_pct: Decimal) -> Result<Self> {
        self.discount_pct = discount_pct;
        self.recompute()?;
        Ok(self)
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn with_unit(mut self, unit: Unit, activity: Activity) -> Self {
        self.unit = unit;
        self.activity = activity;
        self
    }

    /// Re-derive unit TTC price and line totals from the current inputs.
    pub fn recompute(&mut self) -> Result<()> {
        self.total_ht = line_total_ht(self.quantity, self.unit_price_ht, self.discount_pct)?;
        self.total_ttc = line_total_ttc(self.total_ht, self.tax_rate)?;
        self.unit_price_ttc = unit_price_ttc(self.unit_price_ht, self.tax_rate)?;
        Ok(())
    }

    pub fn tax(&self) -> Decimal {
        self.total_ttc - self.total_ht
    }

    pub fn totals(&self) -> LineTotals {
        LineTotals {
            tax_rate: self.tax_rate,
            total_ht: self.total_ht,
            total_ttc: self.total_ttc,
            tax: self.tax(),
        }
    }

    /// Purchase cost of the whole line
    pub fn purchase_total(&self) -> Decimal {
        self.quantity * self.purchase_unit_price
    }

    /// Copy this line onto another document, keeping inputs and totals.
    pub fn copy_to(&self, owner: LineOwner) -> Self {
        Self {
            id: 0,
            owner,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_line_derives_totals() {
        let item = LineItem::new(LineOwner::Quote(1), "Peinture murs", dec!(50), dec!(25.00), TaxRate::Standard)
            .unwrap();
        assert_eq!(item.total_ht, dec!(1250.00));
        assert_eq!(item.total_ttc, dec!(1500.00));
        assert_eq!(item.unit_price_ttc, dec!(30.00));
        assert_eq!(item.tax(), dec!(250.00));
    }

    #[test]
    fn test_line_discount() {
        let item = LineItem::new(LineOwner::Quote(1), "Enduit", dec!(4), dec!(50), TaxRate::Intermediate)
            .unwrap()
            .with_discount(dec!(10))
            .unwrap();
        assert_eq!(item.total_ht, dec!(180.00));
        assert_eq!(item.total_ttc, dec!(198.00));
    }

    #[test]
    fn test_line_rejects_negative_quantity() {
        assert!(LineItem::new(LineOwner::Invoice(1), "x", dec!(-1), dec!(1), TaxRate::Exempt).is_err());
    }

    #[test]
    fn test_copy_to_invoice_resets_id() {
        let mut item = LineItem::new(LineOwner::Quote(7), "Sous-couche", dec!(2), dec!(12.5), TaxRate::Reduced)
            .unwrap();
        item.id = 42;
        let copy = item.copy_to(LineOwner::Invoice(3));
        assert_eq!(copy.id, 0);
        assert_eq!(copy.owner, LineOwner::Invoice(3));
        assert_eq!(copy.total_ttc, item.total_ttc);
    }

    #[test]
    fn test_unit_codes() {
        assert_eq!(Unit::SquareMeter.as_str(), "m2");
        assert_eq!(Unit::from_code("forfait"), Some(Unit::Flat));
        assert_eq!(Activity::from_code("service"), Some(Activity::Service));
        assert_eq!(Unit::from_code("litre"), None);
    }
}
