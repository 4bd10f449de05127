//! Audit log writer and query helpers.
//!
//! Every `record_*` method writes exactly one entry through [`AuditTrail::record`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::AuditSettings;
use crate::error::Result;
use crate::models::{Actor, Deposit, Invoice, Quote, QuoteRequest, RequestMeta};

use super::diff::diff;
use super::models::{ActionKind, AuditLogEntry, AuditStatistics, NewAuditEntry};
use super::snapshot::{serialize, Auditable, EntityRef, Snapshot};
use super::store::AuditStore;

code_enum! {
    /// Where an orphan linkage was triggered from
    pub enum LinkOrigin {
        AccountSignup => "signal_cadastro",
        ManualAdmin => "manual_admin",
        BatchSweep => "comando_gerenciamento",
    }
}

/// Audit writer bound to one store (usually one unit of work).
pub struct AuditTrail<S> {
    store: S,
    settings: AuditSettings,
}

impl<S: AuditStore> AuditTrail<S> {
    pub fn new(store: S, settings: AuditSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &AuditSettings {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Give back the store, e.g. to commit its transaction.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Write one entry. Entries without a module get the configured default.
    #[instrument(skip(self, entry), fields(action = %entry.action, entity = %entry.entity))]
    pub async fn record(&mut self, mut entry: NewAuditEntry) -> Result<AuditLogEntry> {
        if entry.module.is_empty() {
            entry.module = self.settings.default_module.clone();
        }
        let saved = self.store.insert_entry(entry).await?;
        debug!(id = saved.id, actor = ?saved.actor_id, "Audit entry recorded");
        Ok(saved)
    }

    // ==================== generic actions ====================

    pub async fn record_creation<E: Auditable + ?Sized + Sync>(
        &mut self,
        actor: Option<&Actor>,
        entity: &E,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let after = serialize(entity)?;
        let entry = NewAuditEntry::new(
            ActionKind::Create,
            entity.entity_ref(),
            format!("Created {}", entity.describe()),
        )
        .actor(actor)
        .request(meta)
        .after(after.to_value()?)
        .feature("Creation");
        self.record(entry).await
    }

    /// Record an edit; the field diff is computed from the two snapshots.
    pub async fn record_edit<E: Auditable + ?Sized + Sync>(
        &mut self,
        actor: Option<&Actor>,
        entity: &E,
        before: &Snapshot,
        after: &Snapshot,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let entity_ref = entity.entity_ref();
        let changes = diff(before, after);
        let entry = NewAuditEntry::new(
            ActionKind::Edit,
            entity_ref,
            format!("Edited {}", entity.describe()),
        )
        .actor(actor)
        .request(meta)
        .before(before.to_value()?)
        .after(after.to_value()?)
        .changes(changes)
        .feature("Edit");
        self.record(entry).await
    }

    pub async fn record_deletion<E: Auditable + ?Sized + Sync>(
        &mut self,
        actor: Option<&Actor>,
        entity: &E,
        before: &Snapshot,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let entry = NewAuditEntry::new(
            ActionKind::Delete,
            entity.entity_ref(),
            format!("Deleted {}", entity.describe()),
        )
        .actor(actor)
        .request(meta)
        .before(before.to_value()?)
        .feature("Deletion");
        self.record(entry).await
    }

    pub async fn record_view<E: Auditable + ?Sized + Sync>(
        &mut self,
        actor: Option<&Actor>,
        entity: &E,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let entry = NewAuditEntry::new(
            ActionKind::View,
            entity.entity_ref(),
            format!("Viewed {}", entity.describe()),
        )
        .actor(actor)
        .request(meta)
        .feature("View");
        self.record(entry).await
    }

    // ==================== quote lifecycle ====================

    pub async fn record_quote_sent(
        &mut self,
        actor: Option<&Actor>,
        quote: &Quote,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        self.record_document_event(
            ActionKind::Send,
            actor,
            quote,
            format!("Quote {} sent to client", quote.number),
            "Quote sending",
            meta,
        )
        .await
    }

    pub async fn record_quote_approved(
        &mut self,
        actor: Option<&Actor>,
        quote: &Quote,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        self.record_document_event(
            ActionKind::Approve,
            actor,
            quote,
            format!("Quote {} accepted by client", quote.number),
            "Quote acceptance",
            meta,
        )
        .await
    }

    pub async fn record_quote_rejected(
        &mut self,
        actor: Option<&Actor>,
        quote: &Quote,
        reason: Option<&str>,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let mut description = format!("Quote {} refused by client", quote.number);
        if let Some(reason) = reason.filter(|r| !r.trim().is_empty()) {
            description.push_str(&format!(" - Reason: {}", reason));
        }
        self.record_document_event(ActionKind::Reject, actor, quote, description, "Quote refusal", meta)
            .await
    }

    // ==================== invoices and deposits ====================

    pub async fn record_invoice_created(
        &mut self,
        actor: Option<&Actor>,
        invoice: &Invoice,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let description = match invoice.quote_id {
            Some(quote_id) => format!("Invoice {} created from quote #{}", invoice.number, quote_id),
            None => format!("Invoice {} created", invoice.number),
        };
        self.record_document_event(
            ActionKind::InvoiceCreated,
            actor,
            invoice,
            description,
            "Invoice creation",
            meta,
        )
        .await
    }

    pub async fn record_invoice_sent(
        &mut self,
        actor: Option<&Actor>,
        invoice: &Invoice,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        self.record_document_event(
            ActionKind::InvoiceSent,
            actor,
            invoice,
            format!("Invoice {} sent to client", invoice.number),
            "Invoice sending",
            meta,
        )
        .await
    }

    pub async fn record_invoice_paid(
        &mut self,
        actor: Option<&Actor>,
        invoice: &Invoice,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        self.record_document_event(
            ActionKind::InvoicePaid,
            actor,
            invoice,
            format!("Invoice {} marked as paid ({} TTC)", invoice.number, invoice.total_ttc),
            "Invoice payment",
            meta,
        )
        .await
    }

    pub async fn record_invoice_viewed(
        &mut self,
        actor: Option<&Actor>,
        invoice: &Invoice,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let entry = NewAuditEntry::new(
            ActionKind::View,
            invoice.entity_ref(),
            format!("Invoice {} viewed", invoice.number),
        )
        .actor(actor)
        .request(meta)
        .module("invoices")
        .feature("Invoice view");
        self.record(entry).await
    }

    pub async fn record_invoice_downloaded(
        &mut self,
        actor: Option<&Actor>,
        invoice: &Invoice,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let entry = NewAuditEntry::new(
            ActionKind::Download,
            invoice.entity_ref(),
            format!("Invoice {} downloaded as PDF", invoice.number),
        )
        .actor(actor)
        .request(meta)
        .module("invoices")
        .feature("Invoice download");
        self.record(entry).await
    }

    pub async fn record_deposit_paid(
        &mut self,
        actor: Option<&Actor>,
        deposit: &Deposit,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        self.record_document_event(
            ActionKind::DepositPaid,
            actor,
            deposit,
            format!(
                "Deposit {} of quote #{} paid ({} TTC)",
                deposit.number, deposit.quote_id, deposit.amount_ttc
            ),
            "Deposit payment",
            meta,
        )
        .await
    }

    /// A signed-in user submitted the public request form.
    pub async fn record_public_request_by_user(
        &mut self,
        actor: &Actor,
        request: &QuoteRequest,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let entry = NewAuditEntry::new(
            ActionKind::Create,
            request.entity_ref(),
            format!(
                "Quote request via public form by signed-in user {} ({})",
                actor.display_name, request.number
            ),
        )
        .actor(Some(actor))
        .request(meta)
        .after(json!({
            "signed_in_account": actor.id,
            "form_email": request.requester_email,
            "auto_linked": true,
        }))
        .feature("Public request");
        self.record(entry).await
    }

    // ==================== orphan requests ====================

    /// Orphan requests were found for an account's email.
    pub async fn record_orphan_detected(
        &mut self,
        account: &Actor,
        email: &str,
        found: usize,
    ) -> Result<AuditLogEntry> {
        let entry = NewAuditEntry::new(
            ActionKind::OrphanDetected,
            EntityRef::account(account.id),
            format!("Detected {} orphan requests for {}", found, email),
        )
        .actor(Some(account))
        .after(json!({
            "checked_email": email,
            "orphans_found": found,
            "beneficiary_account": account.id,
        }))
        .feature("Orphan detection");
        self.record(entry).await
    }

    /// One orphan request was linked to `account`.
    ///
    /// `request` is the state before linking; the entry's after-state carries the
    /// new client link.
    pub async fn record_orphan_linked(
        &mut self,
        account: &Actor,
        request: &QuoteRequest,
        origin: LinkOrigin,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let before = serialize(request)?;
        let mut linked = request.clone();
        linked.client_id = Some(account.id);
        let after = serialize(&linked)?;

        let entry = NewAuditEntry::new(
            ActionKind::OrphanLinked,
            request.entity_ref(),
            format!(
                "Automatic link of orphan request {} ({}) to account {} [origin: {}]",
                request.number, request.requester_name, account.email, origin
            ),
        )
        .actor(Some(account))
        .request(meta)
        .changes(diff(&before, &after))
        .before(before.to_value()?)
        .after(after.to_value()?)
        .feature("Orphan linking");
        self.record(entry).await
    }

    /// Summary of one linking batch.
    pub async fn record_orphan_batch(
        &mut self,
        actor: Option<&Actor>,
        subject: EntityRef,
        total_processed: usize,
        total_linked: usize,
        emails: &BTreeSet<String>,
        origin: LinkOrigin,
    ) -> Result<AuditLogEntry> {
        let entry = NewAuditEntry::new(
            ActionKind::BatchProcessed,
            subject,
            format!(
                "Batch processing: {}/{} orphan requests linked, {} emails processed",
                total_linked,
                total_processed,
                emails.len()
            ),
        )
        .actor(actor)
        .after(json!({
            "total_processed": total_processed,
            "total_linked": total_linked,
            "emails_processed": emails,
            "method": origin.as_str(),
        }))
        .feature("Orphan batch");
        self.record(entry).await
    }

    /// The account was told about its linked requests. System entry: no actor.
    pub async fn record_link_notification(
        &mut self,
        account: &Actor,
        request_count: usize,
        method: &str,
    ) -> Result<AuditLogEntry> {
        let entry = NewAuditEntry::new(
            ActionKind::LinkNotification,
            EntityRef::account(account.id),
            format!(
                "Notification sent to {} ({}): {} requests linked",
                account.display_name, account.email, request_count
            ),
        )
        .after(json!({
            "notified_account": account.id,
            "notified_email": account.email,
            "request_count": request_count,
            "link_method": method,
        }))
        .feature("Link notification");
        self.record(entry).await
    }

    async fn record_document_event<E: Auditable + ?Sized + Sync>(
        &mut self,
        action: ActionKind,
        actor: Option<&Actor>,
        entity: &E,
        description: String,
        feature: &str,
        meta: Option<&RequestMeta>,
    ) -> Result<AuditLogEntry> {
        let after = serialize(entity)?;
        let entry = NewAuditEntry::new(action, entity.entity_ref(), description)
            .actor(actor)
            .request(meta)
            .after(after.to_value()?)
            .feature(feature);
        self.record(entry).await
    }

    // ==================== queries ====================

    /// Entries about one entity, newest first.
    pub async fn history_for(&mut self, entity: EntityRef, limit: Option<i64>) -> Result<Vec<AuditLogEntry>> {
        let limit = self.settings.clamp_limit(limit, self.settings.history_limit);
        self.store.entries_for_entity(entity, limit).await
    }

    /// Recent entries by one actor, newest first. Defaults to the configured look-back.
    pub async fn activity_for(
        &mut self,
        actor_id: i64,
        since: Option<DateTime<Utc>>,
        limit: Option<i64>,
    ) -> Result<Vec<AuditLogEntry>> {
        let since = since.unwrap_or_else(|| self.settings.activity_window_start(Utc::now()));
        let limit = self.settings.clamp_limit(limit, self.settings.activity_limit);
        self.store.entries_for_actor(actor_id, since, limit).await
    }

    pub async fn statistics(&mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<AuditStatistics> {
        self.store.statistics(since, until).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::snapshot::EntityKind;
    use crate::db::MemoryStore;
    use crate::error::AppError;
    use crate::models::{Client, ServiceType};
    use chrono::{Duration, NaiveDate};
    use rust_decimal_macros::dec;

    fn trail() -> AuditTrail<MemoryStore> {
        AuditTrail::new(MemoryStore::new(), AuditSettings::default())
    }

    fn staff() -> Actor {
        Actor::new(1, "Admin", "admin@example.com").staff()
    }

    fn quote(title: &str) -> Quote {
        Quote::new(
            5,
            "OR202500005",
            2,
            1,
            title,
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap(),
            Utc::now(),
        )
    }

    fn request() -> QuoteRequest {
        let mut request = QuoteRequest::new(
            "DEV20259999",
            "Test User",
            "test@exemplo.com",
            ServiceType::InteriorPainting,
            "Pintura de teste",
            Utc::now(),
        );
        request.id = 31;
        request
    }

    #[tokio::test]
    async fn test_record_edit_scenario() {
        let mut trail = trail();
        let before_quote = quote("A");
        let mut after_quote = before_quote.clone();
        after_quote.title = "B".into();
        after_quote.set_discount(dec!(5)).unwrap();

        let before = serialize(&before_quote).unwrap();
        let after = serialize(&after_quote).unwrap();
        let entry = trail
            .record_edit(Some(&staff()), &after_quote, &before, &after, None)
            .await
            .unwrap();

        assert_eq!(entry.action, ActionKind::Edit);
        assert_eq!(entry.module, "quotes");
        let changes = entry.changes.unwrap();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["title"].before.as_deref(), Some("A"));
        assert_eq!(changes["title"].after.as_deref(), Some("B"));
        assert_eq!(changes["discount"].before.as_deref(), Some("0"));
        assert_eq!(changes["discount"].after.as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_record_creation_unsupported_kind() {
        let mut trail = trail();
        let client = Client::new(1, "Dupont", "d@example.com");
        let err = trail.record_creation(Some(&staff()), &client, None).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedEntityKind(_)));
        assert!(err.is_audit_recoverable());
        assert!(trail.store().entries().is_empty());
    }

    #[tokio::test]
    async fn test_record_view_and_deletion() {
        let mut trail = trail();
        let q = quote("A");
        let meta = RequestMeta::from_headers(None, Some("127.0.0.1"), Some("Test Browser"), Some("s1"));

        let viewed = trail.record_view(Some(&staff()), &q, Some(&meta)).await.unwrap();
        assert_eq!(viewed.ip_address.as_deref(), Some("127.0.0.1"));
        assert!(viewed.after.is_none());

        let before = serialize(&q).unwrap();
        let deleted = trail.record_deletion(Some(&staff()), &q, &before, None).await.unwrap();
        assert_eq!(deleted.action, ActionKind::Delete);
        assert_eq!(deleted.before.unwrap()["title"], "A");
        assert_eq!(deleted.session_id, "");
    }

    #[tokio::test]
    async fn test_record_quote_rejected_with_reason() {
        let mut trail = trail();
        let entry = trail
            .record_quote_rejected(Some(&staff()), &quote("A"), Some("Too expensive"), None)
            .await
            .unwrap();
        assert_eq!(entry.action, ActionKind::Reject);
        assert!(entry.description.contains("OR202500005"));
        assert!(entry.description.ends_with(" - Reason: Too expensive"));

        let entry = trail
            .record_quote_rejected(Some(&staff()), &quote("A"), Some("  "), None)
            .await
            .unwrap();
        assert!(!entry.description.contains("Reason"));
    }

    #[tokio::test]
    async fn test_record_orphan_linked() {
        let mut trail = trail();
        let account = Actor::new(7, "Test User", "test@exemplo.com");

        let entry = trail
            .record_orphan_linked(&account, &request(), LinkOrigin::ManualAdmin, None)
            .await
            .unwrap();

        assert_eq!(entry.action, ActionKind::OrphanLinked);
        assert_eq!(entry.actor_id, Some(7));
        assert_eq!(entry.entity, EntityRef::new(EntityKind::QuoteRequest, 31));
        assert!(entry.description.contains("DEV20259999"));
        assert!(entry.description.contains("Test User"));
        assert!(entry.description.contains("manual_admin"));
        assert_eq!(entry.before.as_ref().unwrap()["client"], serde_json::Value::Null);
        assert_eq!(entry.after.as_ref().unwrap()["client"], "7");
        assert!(entry.changes.as_ref().unwrap().contains_key("client"));
        assert!(entry.change_summary().contains("client: N/A → 7"));
    }

    #[tokio::test]
    async fn test_record_orphan_batch_and_notification() {
        let mut trail = trail();
        let admin = staff();
        let account = Actor::new(7, "Test User", "test@exemplo.com");
        let emails: BTreeSet<String> = ["test@exemplo.com", "outro@exemplo.com"]
            .into_iter()
            .map(String::from)
            .collect();

        let batch = trail
            .record_orphan_batch(Some(&admin), EntityRef::account(admin.id), 5, 3, &emails, LinkOrigin::BatchSweep)
            .await
            .unwrap();
        assert!(batch.description.contains("3/5"));
        assert!(batch.description.contains("2 emails processed"));
        let after = batch.after.unwrap();
        assert_eq!(after["total_processed"], 5);
        assert_eq!(after["total_linked"], 3);
        assert_eq!(after["method"], "comando_gerenciamento");
        assert_eq!(after["emails_processed"].as_array().unwrap().len(), 2);

        let notice = trail.record_link_notification(&account, 2, "automatic").await.unwrap();
        assert!(notice.is_system());
        assert_eq!(notice.entity, EntityRef::account(7));
        assert!(notice.description.contains("test@exemplo.com"));
        assert_eq!(notice.after.unwrap()["request_count"], 2);
    }

    #[tokio::test]
    async fn test_history_and_activity() {
        let mut trail = trail();
        let account = Actor::new(7, "Test User", "test@exemplo.com");
        let req = request();

        trail.record_creation(Some(&account), &req, None).await.unwrap();
        trail
            .record_orphan_linked(&account, &req, LinkOrigin::AccountSignup, None)
            .await
            .unwrap();
        trail.record_orphan_detected(&account, "test@exemplo.com", 1).await.unwrap();
        trail.record_link_notification(&account, 1, "automatic").await.unwrap();

        let history = trail.history_for(req.entity_ref(), None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action, ActionKind::OrphanLinked);
        assert_eq!(history[1].action, ActionKind::Create);

        let activity = trail.activity_for(7, None, None).await.unwrap();
        assert_eq!(activity.len(), 3);
        assert!(activity.iter().all(|e| e.actor_id == Some(7)));

        let limited = trail.history_for(req.entity_ref(), Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_activity_with_oversized_look_back() {
        let settings = AuditSettings {
            activity_days: 10_000_000_000,
            ..AuditSettings::default()
        };
        let mut trail = AuditTrail::new(MemoryStore::new(), settings);
        let account = Actor::new(7, "Test User", "test@exemplo.com");
        trail.record_orphan_detected(&account, "test@exemplo.com", 1).await.unwrap();

        let activity = trail.activity_for(7, None, None).await.unwrap();
        assert_eq!(activity.len(), 1);
    }

    #[tokio::test]
    async fn test_statistics_window() {
        let mut trail = trail();
        let account = Actor::new(7, "Test User", "test@exemplo.com");
        trail.record_orphan_detected(&account, "test@exemplo.com", 2).await.unwrap();
        trail
            .record_orphan_linked(&account, &request(), LinkOrigin::AccountSignup, None)
            .await
            .unwrap();
        trail
            .record_orphan_batch(
                Some(&staff()),
                EntityRef::account(1),
                5,
                3,
                &BTreeSet::from(["test@exemplo.com".to_string()]),
                LinkOrigin::BatchSweep,
            )
            .await
            .unwrap();

        let now = Utc::now();
        let stats = trail
            .statistics(now - Duration::days(1), now + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_kind.len(), 3);
        assert_eq!(stats.by_actor[0].actor_id, Some(7));

        let empty = trail
            .statistics(now - Duration::days(10), now - Duration::days(5))
            .await
            .unwrap();
        assert_eq!(empty.total, 0);
    }
}
