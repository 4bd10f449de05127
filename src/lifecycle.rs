//! Document state machines and their audited entry points.
//!
//! Quote:   Draft → InElaboration → Sent → {Accepted | Refused | Expired}
//! Invoice: Draft → Sent → {Paid | Cancelled | Overdue}
//! Deposit: Pending → {Paid | Overdue | Cancelled}, Overdue → Paid
//!
//! The audited helpers apply the transition first and write the audit entry only
//! when it succeeded.

use chrono::{DateTime, NaiveDate, Utc};

use crate::audit::store::AuditStore;
use crate::audit::writer::AuditTrail;
use crate::error::{AppError, Result};
use crate::models::{Actor, Deposit, DepositStatus, Invoice, InvoiceStatus, Quote, QuoteRequest, QuoteStatus, RequestMeta};

fn invalid(entity: &'static str, from: &'static str, action: &'static str) -> AppError {
    AppError::InvalidTransition { entity, from, action }
}

// ==================== quotes ====================

impl Quote {
    pub fn start_elaboration(&mut self) -> Result<()> {
        match self.status {
            QuoteStatus::Draft => {
                self.status = QuoteStatus::InElaboration;
                Ok(())
            }
            other => Err(invalid("quote", other.as_str(), "start elaboration of")),
        }
    }

    pub fn send(&mut self, at: DateTime<Utc>) -> Result<()> {
        match self.status {
            QuoteStatus::Draft | QuoteStatus::InElaboration => {
                self.status = QuoteStatus::Sent;
                self.sent_at = Some(at);
                Ok(())
            }
            other => Err(invalid("quote", other.as_str(), "send")),
        }
    }

    pub fn accept(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.respond(QuoteStatus::Accepted, at, "accept")
    }

    pub fn refuse(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.respond(QuoteStatus::Refused, at, "refuse")
    }

    fn respond(&mut self, to: QuoteStatus, at: DateTime<Utc>, action: &'static str) -> Result<()> {
        if self.status != QuoteStatus::Sent {
            return Err(invalid("quote", self.status.as_str(), action));
        }
        self.status = to;
        self.responded_at = Some(at);
        Ok(())
    }

    pub fn expire(&mut self) -> Result<()> {
        if self.status.is_final() {
            return Err(invalid("quote", self.status.as_str(), "expire"));
        }
        self.status = QuoteStatus::Expired;
        Ok(())
    }

    /// Past its validity date while still awaiting an answer
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        !self.status.is_final() && today > self.valid_until
    }
}

impl QuoteRequest {
    /// Mirror the status of the quote answering this request.
    pub fn sync_with(&mut self, quote: &Quote, at: DateTime<Utc>) {
        if self.status != quote.status {
            self.status = quote.status;
            self.updated_at = at;
        }
    }
}

// ==================== invoices ====================

impl Invoice {
    pub fn send(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.status != InvoiceStatus::Draft {
            return Err(invalid("invoice", self.status.as_str(), "send"));
        }
        self.status = InvoiceStatus::Sent;
        self.sent_at = Some(at);
        Ok(())
    }

    pub fn mark_paid(&mut self, on: NaiveDate) -> Result<()> {
        match self.status {
            InvoiceStatus::Sent | InvoiceStatus::Overdue => {
                self.status = InvoiceStatus::Paid;
                self.paid_on = Some(on);
                Ok(())
            }
            other => Err(invalid("invoice", other.as_str(), "mark paid")),
        }
    }

    pub fn cancel(&mut self) -> Result<()> {
        match self.status {
            InvoiceStatus::Paid | InvoiceStatus::Cancelled => {
                Err(invalid("invoice", self.status.as_str(), "cancel"))
            }
            _ => {
                self.status = InvoiceStatus::Cancelled;
                Ok(())
            }
        }
    }

    /// Flag a sent invoice past its due date. Returns whether the status changed.
    pub fn mark_overdue(&mut self, today: NaiveDate) -> Result<bool> {
        match self.status {
            InvoiceStatus::Sent if today > self.due_on => {
                self.status = InvoiceStatus::Overdue;
                Ok(true)
            }
            InvoiceStatus::Sent | InvoiceStatus::Overdue => Ok(false),
            other => Err(invalid("invoice", other.as_str(), "mark overdue")),
        }
    }
}

// ==================== deposits ====================

impl Deposit {
    /// Record payment. Paying an already paid deposit changes nothing and
    /// returns `false`.
    pub fn mark_paid(&mut self, at: DateTime<Utc>) -> Result<bool> {
        match self.status {
            DepositStatus::Paid => Ok(false),
            DepositStatus::Cancelled => Err(invalid("deposit", self.status.as_str(), "mark paid")),
            DepositStatus::Pending | DepositStatus::Overdue => {
                self.status = DepositStatus::Paid;
                self.paid_at = Some(at);
                Ok(true)
            }
        }
    }

    pub fn cancel(&mut self) -> Result<()> {
        if self.status == DepositStatus::Paid {
            return Err(invalid("deposit", self.status.as_str(), "cancel"));
        }
        self.status = DepositStatus::Cancelled;
        Ok(())
    }

    /// Flag a pending deposit past its due date. Returns whether the status changed.
    pub fn mark_overdue(&mut self, today: NaiveDate) -> bool {
        match (self.status, self.due_date) {
            (DepositStatus::Pending, Some(due)) if today > due => {
                self.status = DepositStatus::Overdue;
                true
            }
            _ => false,
        }
    }
}

// ==================== audited transitions ====================

pub async fn send_quote<S: AuditStore>(
    trail: &mut AuditTrail<S>,
    actor: Option<&Actor>,
    quote: &mut Quote,
    at: DateTime<Utc>,
    meta: Option<&RequestMeta>,
) -> Result<()> {
    quote.send(at)?;
    trail.record_quote_sent(actor, quote, meta).await?;
    Ok(())
}

pub async fn accept_quote<S: AuditStore>(
    trail: &mut AuditTrail<S>,
    actor: Option<&Actor>,
    quote: &mut Quote,
    at: DateTime<Utc>,
    meta: Option<&RequestMeta>,
) -> Result<()> {
    quote.accept(at)?;
    trail.record_quote_approved(actor, quote, meta).await?;
    Ok(())
}

pub async fn refuse_quote<S: AuditStore>(
    trail: &mut AuditTrail<S>,
    actor: Option<&Actor>,
    quote: &mut Quote,
    reason: Option<&str>,
    at: DateTime<Utc>,
    meta: Option<&RequestMeta>,
) -> Result<()> {
    quote.refuse(at)?;
    trail.record_quote_rejected(actor, quote, reason, meta).await?;
    Ok(())
}

/// Issue an invoice from an accepted quote and audit its creation.
#[allow(clippy::too_many_arguments)]
pub async fn issue_invoice<S: AuditStore>(
    trail: &mut AuditTrail<S>,
    actor: Option<&Actor>,
    quote: &Quote,
    id: i64,
    number: &str,
    client_id: i64,
    issued_on: NaiveDate,
    due_on: NaiveDate,
) -> Result<Invoice> {
    let invoice = Invoice::from_quote(quote, id, number, client_id, issued_on, due_on)?;
    trail.record_invoice_created(actor, &invoice, None).await?;
    Ok(invoice)
}

pub async fn send_invoice<S: AuditStore>(
    trail: &mut AuditTrail<S>,
    actor: Option<&Actor>,
    invoice: &mut Invoice,
    at: DateTime<Utc>,
    meta: Option<&RequestMeta>,
) -> Result<()> {
    invoice.send(at)?;
    trail.record_invoice_sent(actor, invoice, meta).await?;
    Ok(())
}

pub async fn mark_invoice_paid<S: AuditStore>(
    trail: &mut AuditTrail<S>,
    actor: Option<&Actor>,
    invoice: &mut Invoice,
    on: NaiveDate,
    meta: Option<&RequestMeta>,
) -> Result<()> {
    invoice.mark_paid(on)?;
    trail.record_invoice_paid(actor, invoice, meta).await?;
    Ok(())
}

/// Mark a quote's deposit paid; a repeated payment writes no entry.
pub async fn mark_deposit_paid<S: AuditStore>(
    trail: &mut AuditTrail<S>,
    actor: Option<&Actor>,
    quote: &mut Quote,
    deposit_index: usize,
    at: DateTime<Utc>,
    meta: Option<&RequestMeta>,
) -> Result<bool> {
    let deposit = quote
        .deposits
        .get_mut(deposit_index)
        .ok_or_else(|| AppError::NotFound(format!("deposit {} of quote {}", deposit_index, quote.number)))?;

    if !deposit.mark_paid(at)? {
        return Ok(false);
    }
    trail.record_deposit_paid(actor, deposit, meta).await?;
    Ok(true)
}
