//! Persistence seam of the audit trail

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

use super::models::{AuditLogEntry, AuditStatistics, NewAuditEntry};
use super::snapshot::EntityRef;

/// Append-only storage of audit entries.
///
/// Implementations never update or delete existing entries.
#[async_trait]
pub trait AuditStore: Send {
    /// Persist one entry and return it with its id.
    async fn insert_entry(&mut self, entry: NewAuditEntry) -> Result<AuditLogEntry>;

    /// Entries about one entity, newest first.
    async fn entries_for_entity(&mut self, entity: EntityRef, limit: i64) -> Result<Vec<AuditLogEntry>>;

    /// Entries recorded by one actor since `since`, newest first.
    async fn entries_for_actor(
        &mut self,
        actor_id: i64,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>>;

    /// Aggregates over `[since, until]`.
    async fn statistics(&mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<AuditStatistics>;
}
