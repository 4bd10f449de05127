//! In-process store for tests and embedding callers

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::audit::models::{AuditLogEntry, AuditStatistics, NewAuditEntry};
use crate::audit::snapshot::EntityRef;
use crate::audit::store::AuditStore;
use crate::error::Result;
use crate::models::{normalize_email, Actor, QuoteRequest};
use crate::orphans::store::{AccountStore, QuoteRequestStore};

/// Vec-backed store with the same semantics as the Postgres unit of work.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Vec<AuditLogEntry>,
    requests: Vec<QuoteRequest>,
    accounts: Vec<Actor>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accounts(mut self, accounts: impl IntoIterator<Item = Actor>) -> Self {
        self.accounts.extend(accounts);
        self
    }

    pub fn add_account(&mut self, account: Actor) {
        self.accounts.push(account);
    }

    /// Store a request, assigning the next id when it has none.
    pub fn add_request(&mut self, mut request: QuoteRequest) -> i64 {
        if request.id == 0 {
            request.id = self.requests.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        }
        let id = request.id;
        self.requests.push(request);
        id
    }

    pub fn entries(&self) -> &[AuditLogEntry] {
        &self.entries
    }

    pub fn requests(&self) -> &[QuoteRequest] {
        &self.requests
    }

    pub fn request(&self, id: i64) -> Option<&QuoteRequest> {
        self.requests.iter().find(|r| r.id == id)
    }

    fn newest_first(mut entries: Vec<AuditLogEntry>, limit: i64) -> Vec<AuditLogEntry> {
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        entries.truncate(usize::try_from(limit).unwrap_or(0));
        entries
    }
}

fn same_email(a: &str, b: &str) -> bool {
    normalize_email(a) == normalize_email(b)
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn insert_entry(&mut self, entry: NewAuditEntry) -> Result<AuditLogEntry> {
        let saved = entry.into_entry(self.entries.len() as i64 + 1);
        self.entries.push(saved.clone());
        Ok(saved)
    }

    async fn entries_for_entity(&mut self, entity: EntityRef, limit: i64) -> Result<Vec<AuditLogEntry>> {
        let matching = self.entries.iter().filter(|e| e.entity == entity).cloned().collect();
        Ok(Self::newest_first(matching, limit))
    }

    async fn entries_for_actor(
        &mut self,
        actor_id: i64,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>> {
        let matching = self
            .entries
            .iter()
            .filter(|e| e.actor_id == Some(actor_id) && e.timestamp >= since)
            .cloned()
            .collect();
        Ok(Self::newest_first(matching, limit))
    }

    async fn statistics(&mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<AuditStatistics> {
        Ok(AuditStatistics::from_entries(
            self.entries
                .iter()
                .filter(|e| e.timestamp >= since && e.timestamp <= until),
        ))
    }
}

#[async_trait]
impl QuoteRequestStore for MemoryStore {
    async fn orphans_for_email(&mut self, email: &str) -> Result<Vec<QuoteRequest>> {
        Ok(self
            .requests
            .iter()
            .filter(|r| r.is_orphan() && r.email_matches(email))
            .cloned()
            .collect())
    }

    async fn all_orphans(&mut self) -> Result<Vec<QuoteRequest>> {
        let mut orphans: Vec<_> = self.requests.iter().filter(|r| r.is_orphan()).cloned().collect();
        orphans.sort_by_key(|r| (r.created_at, r.id));
        Ok(orphans)
    }

    async fn link_requests(&mut self, request_ids: &[i64], account_id: i64) -> Result<Vec<i64>> {
        let now = Utc::now();
        let mut linked = Vec::new();
        for request in self
            .requests
            .iter_mut()
            .filter(|r| r.is_orphan() && request_ids.contains(&r.id))
        {
            request.client_id = Some(account_id);
            request.updated_at = now;
            linked.push(request.id);
        }
        Ok(linked)
    }

    async fn count_linked(&mut self, account_id: i64, email: &str) -> Result<i64> {
        Ok(self
            .requests
            .iter()
            .filter(|r| r.client_id == Some(account_id) && same_email(&r.requester_email, email))
            .count() as i64)
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn account_by_email(&mut self, email: &str) -> Result<Option<Actor>> {
        Ok(self
            .accounts
            .iter()
            .filter(|a| same_email(&a.email, email))
            .min_by_key(|a| a.id)
            .cloned())
    }

    async fn first_staff_account(&mut self) -> Result<Option<Actor>> {
        Ok(self.accounts.iter().filter(|a| a.is_staff).min_by_key(|a| a.id).cloned())
    }
}
