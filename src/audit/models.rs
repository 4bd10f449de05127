//! Audit log data structures

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Actor, RequestMeta};

use super::diff::FieldDiff;
use super::snapshot::EntityRef;

code_enum! {
    /// Kind of action recorded in the audit log
    pub enum ActionKind {
        Create => "criacao",
        Edit => "edicao",
        Delete => "exclusao",
        View => "visualizacao",
        Send => "envio",
        Approve => "aprovacao",
        Reject => "rejeicao",
        Cancel => "cancelamento",
        Download => "download",
        OrphanLinked => "vinculacao_orfao",
        OrphanDetected => "deteccao_orfao",
        BatchProcessed => "processamento_lote",
        LinkNotification => "notificacao_vinculacao",
        InvoiceCreated => "criacao_fatura",
        InvoiceSent => "envio_fatura",
        InvoicePaid => "pagamento_fatura",
        DepositPaid => "pagamento_acompte",
    }
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Create => "Creation",
            ActionKind::Edit => "Edit",
            ActionKind::Delete => "Deletion",
            ActionKind::View => "View",
            ActionKind::Send => "Sending",
            ActionKind::Approve => "Approval",
            ActionKind::Reject => "Rejection",
            ActionKind::Cancel => "Cancellation",
            ActionKind::Download => "Download",
            ActionKind::OrphanLinked => "Orphan request linked",
            ActionKind::OrphanDetected => "Orphan request detected",
            ActionKind::BatchProcessed => "Batch processing",
            ActionKind::LinkNotification => "Link notification",
            ActionKind::InvoiceCreated => "Invoice created",
            ActionKind::InvoiceSent => "Invoice sent",
            ActionKind::InvoicePaid => "Invoice paid",
            ActionKind::DepositPaid => "Deposit paid",
        }
    }

    /// Actions belonging to orphan-request processing
    pub fn is_orphan_related(&self) -> bool {
        matches!(
            self,
            ActionKind::OrphanLinked
                | ActionKind::OrphanDetected
                | ActionKind::BatchProcessed
                | ActionKind::LinkNotification
        )
    }
}

/// One immutable audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    /// `None` for system-originated actions
    pub actor_id: Option<i64>,
    pub session_id: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub action: ActionKind,
    pub description: String,
    pub entity: EntityRef,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub changes: Option<FieldDiff>,
    pub module: String,
    pub feature: String,
    pub success: bool,
    pub error_message: String,
}

impl AuditLogEntry {
    /// Human summary of changed fields, e.g. `title: A → B; discount: 0 → 5`
    pub fn change_summary(&self) -> String {
        match &self.changes {
            Some(changes) if !changes.is_empty() => changes
                .iter()
                .map(|(field, change)| {
                    format!(
                        "{}: {} → {}",
                        field,
                        change.before.as_deref().unwrap_or("N/A"),
                        change.after.as_deref().unwrap_or("N/A")
                    )
                })
                .collect::<Vec<_>>()
                .join("; "),
            _ => "No changes detected".to_string(),
        }
    }

    pub fn is_system(&self) -> bool {
        self.actor_id.is_none()
    }
}

/// An audit record about to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub timestamp: DateTime<Utc>,
    pub actor_id: Option<i64>,
    pub session_id: String,
    pub ip_address: Option<String>,
    pub user_agent: String,
    pub action: ActionKind,
    pub description: String,
    pub entity: EntityRef,
    pub before: Option<Value>,
    pub after: Option<Value>,
    pub changes: Option<FieldDiff>,
    /// Empty means the configured default module
    pub module: String,
    pub feature: String,
    pub success: bool,
    pub error_message: String,
}

impl NewAuditEntry {
    pub fn new(action: ActionKind, entity: EntityRef, description: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            actor_id: None,
            session_id: String::new(),
            ip_address: None,
            user_agent: String::new(),
            action,
            description: description.into(),
            entity,
            before: None,
            after: None,
            changes: None,
            module: String::new(),
            feature: String::new(),
            success: true,
            error_message: String::new(),
        }
    }

    pub fn actor(mut self, actor: Option<&Actor>) -> Self {
        self.actor_id = actor.map(|a| a.id);
        self
    }

    pub fn request(mut self, meta: Option<&RequestMeta>) -> Self {
        if let Some(meta) = meta {
            self.ip_address = meta.ip_address.clone();
            self.user_agent = meta.user_agent.clone().unwrap_or_default();
            self.session_id = meta.session_id.clone().unwrap_or_default();
        }
        self
    }

    pub fn before(mut self, value: Value) -> Self {
        self.before = Some(value);
        self
    }

    pub fn after(mut self, value: Value) -> Self {
        self.after = Some(value);
        self
    }

    pub fn changes(mut self, changes: FieldDiff) -> Self {
        self.changes = Some(changes);
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = feature.into();
        self
    }

    /// Mark the recorded action as failed
    pub fn failed(mut self, error_message: impl Into<String>) -> Self {
        self.success = false;
        self.error_message = error_message.into();
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Materialize with a store-assigned id
    pub fn into_entry(self, id: i64) -> AuditLogEntry {
        AuditLogEntry {
            id,
            timestamp: self.timestamp,
            actor_id: self.actor_id,
            session_id: self.session_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            action: self.action,
            description: self.description,
            entity: self.entity,
            before: self.before,
            after: self.after,
            changes: self.changes,
            module: self.module,
            feature: self.feature,
            success: self.success,
            error_message: self.error_message,
        }
    }
}

/// Number of entries recorded by one actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorActivity {
    /// `None` groups system-originated entries
    pub actor_id: Option<i64>,
    pub count: u64,
}

/// Most active actors reported by [`AuditStatistics`]
pub const TOP_ACTORS: usize = 10;

/// Aggregate activity over a time window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditStatistics {
    pub total: u64,
    pub by_kind: BTreeMap<ActionKind, u64>,
    /// Top actors by entry count, most active first
    pub by_actor: Vec<ActorActivity>,
    pub by_module: BTreeMap<String, u64>,
    pub by_day: BTreeMap<NaiveDate, u64>,
}

impl AuditStatistics {
    /// Aggregate already-filtered entries.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a AuditLogEntry>,
    {
        let mut stats = Self::default();
        let mut actors: BTreeMap<Option<i64>, u64> = BTreeMap::new();

        for entry in entries {
            stats.total += 1;
            *stats.by_kind.entry(entry.action).or_default() += 1;
            *stats.by_module.entry(entry.module.clone()).or_default() += 1;
            *stats.by_day.entry(entry.timestamp.date_naive()).or_default() += 1;
            *actors.entry(entry.actor_id).or_default() += 1;
        }

        stats.by_actor = top_actors(actors.into_iter());
        stats
    }
}

/// Sort actor counts by activity (ties by id) and keep the top ones.
pub(crate) fn top_actors<I>(counts: I) -> Vec<ActorActivity>
where
    I: Iterator<Item = (Option<i64>, u64)>,
{
    let mut actors: Vec<ActorActivity> = counts
        .map(|(actor_id, count)| ActorActivity { actor_id, count })
        .collect();
    actors.sort_by(|a, b| b.count.cmp(&a.count).then(a.actor_id.cmp(&b.actor_id)));
    actors.truncate(TOP_ACTORS);
    actors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::diff::FieldChange;
    use crate::audit::snapshot::EntityKind;
    use chrono::TimeZone;

    fn entry(id: i64, actor_id: Option<i64>, action: ActionKind, day: u32) -> AuditLogEntry {
        NewAuditEntry::new(action, EntityRef::new(EntityKind::Quote, 1), "x")
            .module("quotes")
            .at(Utc.with_ymd_and_hms(2025, 3, day, 12, 0, 0).unwrap())
            .into_entry(id)
            .with_actor(actor_id)
    }

    impl AuditLogEntry {
        fn with_actor(mut self, actor_id: Option<i64>) -> Self {
            self.actor_id = actor_id;
            self
        }
    }

    #[test]
    fn test_change_summary() {
        let mut changes = FieldDiff::new();
        changes.insert(
            "client".into(),
            FieldChange {
                before: None,
                after: Some("7".into()),
            },
        );
        changes.insert(
            "title".into(),
            FieldChange {
                before: Some("A".into()),
                after: Some("B".into()),
            },
        );
        let e = NewAuditEntry::new(ActionKind::Edit, EntityRef::new(EntityKind::Quote, 1), "edit")
            .changes(changes)
            .into_entry(1);
        assert_eq!(e.change_summary(), "client: N/A → 7; title: A → B");
    }

    #[test]
    fn test_change_summary_without_changes() {
        let e = entry(1, Some(1), ActionKind::View, 1);
        assert_eq!(e.change_summary(), "No changes detected");
        let e = NewAuditEntry::new(ActionKind::Edit, EntityRef::new(EntityKind::Quote, 1), "edit")
            .changes(FieldDiff::new())
            .into_entry(2);
        assert_eq!(e.change_summary(), "No changes detected");
    }

    #[test]
    fn test_request_meta_copied() {
        let meta = RequestMeta {
            ip_address: Some("127.0.0.1".into()),
            user_agent: Some("Test Browser".into()),
            session_id: Some("test_session_123".into()),
        };
        let e = NewAuditEntry::new(ActionKind::View, EntityRef::account(1), "v").request(Some(&meta));
        assert_eq!(e.ip_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(e.user_agent, "Test Browser");
        assert_eq!(e.session_id, "test_session_123");

        let e = NewAuditEntry::new(ActionKind::View, EntityRef::account(1), "v").request(None);
        assert!(e.ip_address.is_none());
        assert_eq!(e.user_agent, "");
    }

    #[test]
    fn test_statistics_from_entries() {
        let entries = vec![
            entry(1, Some(1), ActionKind::Create, 1),
            entry(2, Some(1), ActionKind::Edit, 1),
            entry(3, Some(2), ActionKind::Edit, 2),
            entry(4, None, ActionKind::LinkNotification, 2),
        ];

        let stats = AuditStatistics::from_entries(&entries);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.by_kind[&ActionKind::Edit], 2);
        assert_eq!(stats.by_module["quotes"], 4);
        assert_eq!(stats.by_day.len(), 2);
        assert_eq!(stats.by_actor[0], ActorActivity { actor_id: Some(1), count: 2 });
        assert_eq!(stats.by_actor.len(), 3);
    }

    #[test]
    fn test_top_actors_limited() {
        let counts = (0..15).map(|i| (Some(i as i64), i as u64 + 1));
        let top = top_actors(counts);
        assert_eq!(top.len(), TOP_ACTORS);
        assert_eq!(top[0].actor_id, Some(14));
    }

    #[test]
    fn test_action_codes() {
        assert_eq!(ActionKind::OrphanLinked.as_str(), "vinculacao_orfao");
        assert_eq!(ActionKind::from_code("processamento_lote"), Some(ActionKind::BatchProcessed));
        assert!(ActionKind::LinkNotification.is_orphan_related());
        assert!(!ActionKind::Create.is_orphan_related());
    }
}
