//! Invoices (factures), standalone or issued from an accepted quote.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::money::calculators::{check_discount, document_totals, DocumentTotals};
use crate::money::deposits::remaining_balance;

use super::line_item::{LineItem, LineOwner};
use super::quote::{PaymentMethod, PaymentTerms, Quote, QuoteStatus};

code_enum! {
    pub enum InvoiceStatus {
        Draft => "brouillon",
        Sent => "envoyee",
        Paid => "payee",
        Cancelled => "annulee",
        Overdue => "en_retard",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: i64,
    pub number: String,
    pub uuid: Uuid,
    pub client_id: i64,
    /// Quote this invoice was issued from, if any
    pub quote_id: Option<i64>,
    pub author_id: i64,
    pub title: String,
    pub description: String,
    pub lines: Vec<LineItem>,
    #[serde(with = "rust_decimal::serde::str")]
    pub discount_pct: Decimal,
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
    /// Deposits already collected on the originating quote
    #[serde(with = "rust_decimal::serde::str")]
    pub deposits_paid_ttc: Decimal,
    pub issued_on: NaiveDate,
    pub due_on: NaiveDate,
    pub payment_terms: PaymentTerms,
    pub payment_method: PaymentMethod,
    pub status: InvoiceStatus,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_on: Option<NaiveDate>,
}

impl Invoice {
    /// Empty draft invoice for a client
    pub fn new(
        id: i64,
        number: impl Into<String>,
        client_id: i64,
        author_id: i64,
        title: impl Into<String>,
        issued_on: NaiveDate,
        due_on: NaiveDate,
    ) -> Self {
        Self {
            id,
            number: number.into(),
            uuid: Uuid::new_v4(),
            client_id,
            quote_id: None,
            author_id,
            title: title.into(),
            description: String::new(),
            lines: vec![],
            discount_pct: Decimal::ZERO,
            subtotal_ht: Decimal::ZERO,
            discount_value: Decimal::ZERO,
            total_ht: Decimal::ZERO,
            total_ttc: Decimal::ZERO,
            tax_value: Decimal::ZERO,
            deposits_paid_ttc: Decimal::ZERO,
            issued_on,
            due_on,
            payment_terms: PaymentTerms::Cash,
            payment_method: PaymentMethod::BankTransfer,
            status: InvoiceStatus::Draft,
            sent_at: None,
            paid_on: None,
        }
    }

    /// Issue an invoice from an accepted quote, copying its lines and terms.
    ///
    /// # Errors
    /// `InvalidTransition` unless the quote is accepted.
    pub fn from_quote(
        quote: &Quote,
        id: i64,
        number: impl Into<String>,
        client_id: i64,
        issued_on: NaiveDate,
        due_on: NaiveDate,
    ) -> Result<Self> {
        if quote.status != QuoteStatus::Accepted {
            return Err(AppError::InvalidTransition {
                entity: "quote",
                from: quote.status.as_str(),
                action: "invoice",
            });
        }

        let mut invoice = Self::new(id, number, client_id, quote.author_id, quote.title.clone(), issued_on, due_on);
        invoice.quote_id = Some(quote.id);
        invoice.description = quote.description.clone();
        invoice.discount_pct = quote.discount_pct;
        invoice.payment_terms = quote.payment_terms;
        invoice.payment_method = quote.payment_method;
        invoice.lines = quote
            .lines
            .iter()
            .map(|line| line.copy_to(LineOwner::Invoice(id)))
            .collect();
        invoice.deposits_paid_ttc = quote.deposit_summary()?.total_paid_ttc;
        invoice.recalculate()?;
        Ok(invoice)
    }

    pub fn add_line(&mut self, mut item: LineItem) -> Result<()> {
        item.owner = LineOwner::Invoice(self.id);
        item.position = self.lines.len() as u32;
        item.recompute()?;
        self.lines.push(item);
        self.recalculate()?;
        Ok(())
    }

    pub fn set_discount(&mut self, discount_pct: Decimal) -> Result<()> {
        check_discount("discount_pct", discount_pct)?;
        self.discount_pct = discount_pct;
        self.recalculate()?;
        Ok(())
    }

    pub fn recalculate(&mut self) -> Result<DocumentTotals> {
        let line_totals: Vec<_> = self.lines.iter().map(LineItem::totals).collect();
        let totals = document_totals(&line_totals, self.discount_pct)?;
        self.subtotal_ht = totals.subtotal_ht;
        self.discount_value = totals.discount_value;
        self.total_ht = totals.total_ht;
        self.total_ttc = totals.total_ttc;
        self.tax_value = totals.tax_value;
        Ok(totals)
    }

    /// TTC left to pay after deposits collected on the quote
    pub fn amount_due(&self) -> Decimal {
        remaining_balance(self.total_ttc, self.deposits_paid_ttc)
    }

    /// Sent and past its due date without being paid
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        matches!(self.status, InvoiceStatus::Sent | InvoiceStatus::Overdue) && today > self.due_on
    }
}
