//! Regulatory TVA rates.
//!
//! Rates form a closed set: documents may only carry one of the codes below.

use rust_decimal::Decimal;

code_enum! {
    /// TVA rate applied to a line item.
    #[derive(Default)]
    pub enum TaxRate {
        #[default]
        Standard => "20",
        Intermediate => "10",
        Reduced => "5.5",
        Exempt => "0",
    }
}

impl TaxRate {
    /// Rate as a percentage (20, 10, 5.5, 0)
    pub fn percent(&self) -> Decimal {
        match self {
            TaxRate::Standard => Decimal::new(20, 0),
            TaxRate::Intermediate => Decimal::new(10, 0),
            TaxRate::Reduced => Decimal::new(55, 1),
            TaxRate::Exempt => Decimal::ZERO,
        }
    }

    /// Like `from_code`, but also accepts padded input and a decimal comma (`5,5`).
    pub fn parse_code(code: &str) -> Option<Self> {
        Self::from_code(&code.trim().replace(',', "."))
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaxRate::Standard => "TVA 20%",
            TaxRate::Intermediate => "TVA 10%",
            TaxRate::Reduced => "TVA 5,5%",
            TaxRate::Exempt => "Exonérée",
        }
    }
}
