//! Persistence: Postgres over the Django schema, plus an in-memory store.

pub mod memory;
pub mod queries;
pub mod rows;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use tracing::{debug, info};

use crate::audit::models::{AuditLogEntry, AuditStatistics, NewAuditEntry};
use crate::audit::snapshot::EntityRef;
use crate::audit::store::AuditStore;
use crate::cache::{self, AppCache};
use crate::config::CoreConfig;
use crate::error::{AppError, Result};
use crate::models::{Actor, QuoteRequest};
use crate::orphans::store::{AccountStore, QuoteRequestStore};

pub use memory::MemoryStore;

/// Connection pool and the caches shared by its units of work
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    cache: AppCache,
}

impl PgStore {
    pub async fn connect(config: &CoreConfig) -> Result<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| AppError::NotFound("DATABASE_URL is not set".to_string()))?;

        info!(max_connections = config.database_max_connections, "Connecting to PostgreSQL...");
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await?;

        Ok(Self::from_pool(pool, AppCache::new(config.content_type_cache_ttl)))
    }

    pub fn from_pool(pool: PgPool, cache: AppCache) -> Self {
        Self { pool, cache }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn cache(&self) -> &AppCache {
        &self.cache
    }

    /// Preload content type ids.
    pub async fn warm(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        cache::warm_cache(&self.cache, &mut conn).await;
        Ok(())
    }

    /// Start a transaction. Everything written through it lands atomically on
    /// [`PgUnitOfWork::commit`].
    pub async fn begin(&self) -> Result<PgUnitOfWork> {
        let tx = self.pool.begin().await?;
        Ok(PgUnitOfWork {
            tx,
            cache: self.cache.clone(),
        })
    }
}

/// One transaction implementing every store trait
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    cache: AppCache,
}

impl PgUnitOfWork {
    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        debug!("Unit of work committed");
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        debug!("Unit of work rolled back");
        Ok(())
    }

    fn rows_into_entries(rows: Vec<rows::AuditRow>) -> Vec<AuditLogEntry> {
        rows.into_iter().filter_map(rows::AuditRow::into_entry).collect()
    }
}

#[async_trait]
impl AuditStore for PgUnitOfWork {
    async fn insert_entry(&mut self, entry: NewAuditEntry) -> Result<AuditLogEntry> {
        let content_type_id = self.cache.content_type_id(&mut self.tx, entry.entity.kind).await?;
        let id = queries::insert_audit_entry(&mut self.tx, content_type_id, &entry).await?;
        Ok(entry.into_entry(id))
    }

    async fn entries_for_entity(&mut self, entity: EntityRef, limit: i64) -> Result<Vec<AuditLogEntry>> {
        let content_type_id = self.cache.content_type_id(&mut self.tx, entity.kind).await?;
        let rows = queries::get_entries_for_object(&mut self.tx, content_type_id, entity.id, limit).await?;
        Ok(Self::rows_into_entries(rows))
    }

    async fn entries_for_actor(
        &mut self,
        actor_id: i64,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>> {
        let rows = queries::get_entries_for_user(&mut self.tx, actor_id, since, limit).await?;
        Ok(Self::rows_into_entries(rows))
    }

    async fn statistics(&mut self, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<AuditStatistics> {
        queries::get_audit_statistics(&mut self.tx, since, until).await
    }
}

#[async_trait]
impl QuoteRequestStore for PgUnitOfWork {
    async fn orphans_for_email(&mut self, email: &str) -> Result<Vec<QuoteRequest>> {
        let rows = queries::get_orphan_requests_by_email(&mut self.tx, email).await?;
        Ok(rows.into_iter().map(QuoteRequest::from).collect())
    }

    async fn all_orphans(&mut self) -> Result<Vec<QuoteRequest>> {
        let rows = queries::get_orphan_requests(&mut self.tx).await?;
        Ok(rows.into_iter().map(QuoteRequest::from).collect())
    }

    async fn link_requests(&mut self, request_ids: &[i64], account_id: i64) -> Result<Vec<i64>> {
        queries::link_requests_to_user(&mut self.tx, request_ids, account_id).await
    }

    async fn count_linked(&mut self, account_id: i64, email: &str) -> Result<i64> {
        queries::count_linked_requests(&mut self.tx, account_id, email).await
    }
}

#[async_trait]
impl AccountStore for PgUnitOfWork {
    async fn account_by_email(&mut self, email: &str) -> Result<Option<Actor>> {
        Ok(queries::get_user_by_email(&mut self.tx, email).await?.map(Actor::from))
    }

    async fn first_staff_account(&mut self) -> Result<Option<Actor>> {
        Ok(queries::get_first_staff_user(&mut self.tx).await?.map(Actor::from))
    }
}
