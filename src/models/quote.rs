//! Quote requests and quotes (devis).

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::money::calculators::{check_discount, document_totals, DocumentTotals};
use crate::money::deposits::{aggregate_deposits, remaining_balance, DepositSummary};

use super::actor::normalize_email;
use super::deposit::{Deposit, DepositKind};
use super::line_item::{LineItem, LineOwner};
use super::numbering::{generate_unique, NumberedDocument};

code_enum! {
    /// Status shared by quote requests and quotes
    pub enum QuoteStatus {
        Draft => "pendente",
        InElaboration => "em_elaboracao",
        Sent => "enviado",
        Accepted => "aceito",
        Refused => "recusado",
        Expired => "expirado",
    }
}

impl QuoteStatus {
    /// Whether no further transition is possible
    pub fn is_final(&self) -> bool {
        matches!(self, QuoteStatus::Accepted | QuoteStatus::Refused | QuoteStatus::Expired)
    }
}

code_enum! {
    /// Kind of work requested
    pub enum ServiceType {
        InteriorPainting => "pintura_interior",
        ExteriorPainting => "pintura_exterior",
        FullRenovation => "renovacao_completa",
        SurfacePreparation => "preparacao_superficies",
        Decoration => "decoracao",
        Repairs => "reparos",
        Other => "outro",
    }
}

code_enum! {
    pub enum Urgency {
        Low => "baixa",
        Normal => "media",
        High => "alta",
        Critical => "critica",
    }
}

code_enum! {
    /// Payment schedule agreed on a quote or invoice
    pub enum PaymentTerms {
        Cash => "comptant",
        Deposit30 => "acompte_30",
        Deposit50 => "acompte_50",
        Net30 => "echeance_30",
        Net60 => "echeance_60",
        Custom => "personnalise",
    }
}

code_enum! {
    pub enum PaymentMethod {
        BankTransfer => "virement",
        Cheque => "cheque",
        Cash => "espece",
        Card => "carte_bancaire",
    }
}

/// A prospective client's request for a quote.
///
/// `client_id` stays `None` until the request is linked to an account; such
/// requests are orphans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub id: i64,
    pub number: String,
    pub uuid: Uuid,
    pub client_id: Option<i64>,
    pub project_id: Option<i64>,
    pub requester_name: String,
    pub requester_email: String,
    pub requester_phone: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub service_type: ServiceType,
    pub service_description: String,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub approx_area: Option<Decimal>,
    pub urgency: Urgency,
    pub desired_start: Option<NaiveDate>,
    #[serde(with = "rust_decimal::serde::str_option")]
    pub max_budget: Option<Decimal>,
    pub notes: String,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QuoteRequest {
    /// New anonymous request as submitted from the public form
    pub fn new(
        number: impl Into<String>,
        requester_name: impl Into<String>,
        requester_email: impl Into<String>,
        service_type: ServiceType,
        service_description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: 0,
            number: number.into(),
            uuid: Uuid::new_v4(),
            client_id: None,
            project_id: None,
            requester_name: requester_name.into(),
            requester_email: requester_email.into(),
            requester_phone: String::new(),
            address: String::new(),
            city: String::new(),
            postal_code: String::new(),
            service_type,
            service_description: service_description.into(),
            approx_area: None,
            urgency: Urgency::Normal,
            desired_start: None,
            max_budget: None,
            notes: String::new(),
            status: QuoteStatus::Draft,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.client_id.is_none()
    }

    /// Exact email comparison used for orphan linking, ignoring case and
    /// surrounding whitespace
    pub fn email_matches(&self, email: &str) -> bool {
        let email = normalize_email(email);
        !email.is_empty() && normalize_email(&self.requester_email) == email
    }
}

/// A quote elaborated by staff in answer to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    pub number: String,
    pub uuid: Uuid,
    pub request_id: i64,
    pub author_id: i64,
    pub title: String,
    pub description: String,
    pub lines: Vec<LineItem>,
    pub deposits: Vec<Deposit>,
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
    pub execution_days: u32,
    pub valid_until: NaiveDate,
    pub payment_terms: PaymentTerms,
    pub payment_method: PaymentMethod,
    pub notes: String,
    pub status: QuoteStatus,
    pub elaborated_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Quote {
    pub fn new(
        id: i64,
        number: impl Into<String>,
        request_id: i64,
        author_id: i64,
        title: impl Into<String>,
        valid_until: NaiveDate,
        elaborated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            number: number.into(),
            uuid: Uuid::new_v4(),
            request_id,
            author_id,
            title: title.into(),
            description: String::new(),
            lines: vec![],
            deposits: vec![],
            discount_pct: Decimal::ZERO,
            subtotal_ht: Decimal::ZERO,
            discount_value: Decimal::ZERO,
            total_ht: Decimal::ZERO,
            total_ttc: Decimal::ZERO,
            tax_value: Decimal::ZERO,
            execution_days: 0,
            valid_until,
            payment_terms: PaymentTerms::Cash,
            payment_method: PaymentMethod::BankTransfer,
            notes: String::new(),
            status: QuoteStatus::Draft,
            elaborated_at,
            sent_at: None,
            responded_at: None,
        }
    }

    /// Append a line (re-priced for this quote) and refresh totals.
    pub fn add_line(&mut self, mut item: LineItem) -> Result<()> {
        item.owner = LineOwner::Quote(self.id);
        item.position = self.lines.len() as u32;
        item.recompute()?;
        self.lines.push(item);
        self.recalculate()?;
        Ok(())
    }

    pub fn remove_line(&mut self, index: usize) -> Result<Option<LineItem>> {
        if index >= self.lines.len() {
            return Ok(None);
        }
        let removed = self.lines.remove(index);
        self.recalculate()?;
        Ok(Some(removed))
    }

    pub fn set_discount(&mut self, discount_pct: Decimal) -> Result<()> {
        check_discount("discount_pct", discount_pct)?;
        self.discount_pct = discount_pct;
        self.recalculate()?;
        Ok(())
    }

    /// Recompute stored totals from the lines and document discount.
    ///
    /// Outstanding deposits follow the new totals; paid deposits keep the amount
    /// that was actually collected.
    pub fn recalculate(&mut self) -> Result<DocumentTotals> {
        let line_totals: Vec<_> = self.lines.iter().map(LineItem::totals).collect();
        let totals = document_totals(&line_totals, self.discount_pct)?;

        self.subtotal_ht = totals.subtotal_ht;
        self.discount_value = totals.discount_value;
        self.total_ht = totals.total_ht;
        self.total_ttc = totals.total_ttc;
        self.tax_value = totals.tax_value;

        for deposit in self.deposits.iter_mut().filter(|d| d.is_outstanding()) {
            deposit.recompute(self.total_ht, self.total_ttc)?;
        }

        Ok(totals)
    }

    /// Schedule a deposit as a percentage of the current totals.
    ///
    /// The deposit gets an `AC{year}{n}` number, unique within this quote, for
    /// the year the quote was drawn up.
    pub fn add_deposit(
        &mut self,
        kind: DepositKind,
        description: impl Into<String>,
        percentage: Decimal,
        due_date: Option<NaiveDate>,
    ) -> Result<&Deposit> {
        let mut deposit = Deposit::new(self.id, kind, description, percentage, due_date);
        deposit.recompute(self.total_ht, self.total_ttc)?;
        deposit.number = generate_unique(NumberedDocument::Deposit, self.elaborated_at.year(), |candidate| {
            self.deposits.iter().any(|d| d.number == candidate)
        })?;
        self.deposits.push(deposit);
        let index = self.deposits.len() - 1;
        Ok(&self.deposits[index])
    }

    pub fn deposit_summary(&self) -> Result<DepositSummary> {
        aggregate_deposits(&self.deposits, self.total_ttc)
    }

    /// TTC still owed once paid deposits are deducted
    pub fn remaining_balance(&self) -> Result<Decimal> {
        Ok(remaining_balance(self.total_ttc, self.deposit_summary()?.total_paid_ttc))
    }

    /// Sum of scheduled deposit percentages (may exceed 100)
    pub fn deposit_percentage_sum(&self) -> Result<Decimal> {
        Ok(self.deposit_summary()?.percentage_sum)
    }

    /// Purchase cost of all lines
    pub fn purchase_total(&self) -> Decimal {
        self.lines.iter().map(LineItem::purchase_total).sum()
    }
}
