//! Customers and their commercial terms.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::money::calculators::check_discount;
use crate::money::TaxRate;

use super::quote::PaymentTerms;

/// A custom TVA rate negotiated with one client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientTaxRate {
    pub description: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub percent: Decimal,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: i64,
    /// Linked user account, if the client can sign in
    pub account_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub default_tax_rate: TaxRate,
    #[serde(with = "rust_decimal::serde::str")]
    pub global_discount_pct: Decimal,
    pub payment_terms: PaymentTerms,
    pub tax_rates: Vec<ClientTaxRate>,
}

impl Client {
    pub fn new(id: i64, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            account_id: None,
            name: name.into(),
            email: email.into(),
            phone: String::new(),
            default_tax_rate: TaxRate::default(),
            global_discount_pct: Decimal::ZERO,
            payment_terms: PaymentTerms::Cash,
            tax_rates: vec![],
        }
    }

    pub fn set_global_discount(&mut self, pct: Decimal) -> Result<()> {
        check_discount("global_discount_pct", pct)?;
        self.global_discount_pct = pct;
        Ok(())
    }

    /// Register a custom rate. Descriptions are unique per client; a new default
    /// clears the flag on every other rate.
    pub fn add_tax_rate(
        &mut self,
        description: impl Into<String>,
        percent: Decimal,
        is_default: bool,
    ) -> Result<()> {
        let description = description.into();
        if self.tax_rates.iter().any(|r| r.description == description) {
            return Err(AppError::Conflict(format!(
                "client {} already has a tax rate named '{}'",
                self.id, description
            )));
        }
        if percent < Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(AppError::invalid_amount("tax_rate", format!("{} is outside [0, 100]", percent)));
        }

        if is_default {
            self.clear_default();
        }
        self.tax_rates.push(ClientTaxRate {
            description,
            percent,
            is_default,
        });
        Ok(())
    }

    /// Make the named rate the client's single default.
    pub fn set_default_tax_rate(&mut self, description: &str) -> Result<()> {
        if !self.tax_rates.iter().any(|r| r.description == description) {
            return Err(AppError::NotFound(format!(
                "tax rate '{}' for client {}",
                description, self.id
            )));
        }
        for rate in &mut self.tax_rates {
            rate.is_default = rate.description == description;
        }
        Ok(())
    }

    fn clear_default(&mut self) {
        for rate in &mut self.tax_rates {
            rate.is_default = false;
        }
    }

    pub fn default_custom_rate(&self) -> Option<&ClientTaxRate> {
        self.tax_rates.iter().find(|r| r.is_default)
    }

    /// Rate applied to new lines for this client
    pub fn effective_tax_percent(&self) -> Decimal {
        self.default_custom_rate()
            .map(|r| r.percent)
            .unwrap_or_else(|| self.default_tax_rate.percent())
    }
}
