//! In-memory caching using moka
//!
//! Audit rows reference their subject through Django's content types. The
//! `(app_label, model)` → id mapping never changes at runtime, so lookups are
//! cached for the configured TTL.

use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use sqlx::PgConnection;
use tracing::{debug, info, warn};

use crate::audit::snapshot::EntityKind;
use crate::db::queries;
use crate::error::Result;

/// Application cache holding content type ids
#[derive(Clone)]
pub struct AppCache {
    /// Entity kind -> django_content_type.id
    pub content_types: Cache<EntityKind, i32>,
}

impl AppCache {
    /// Create a new cache instance with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            content_types: Cache::builder()
                .max_capacity(EntityKind::ALL.len() as u64)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Content type id for an entity kind, loading it on a miss.
    pub async fn content_type_id(&self, conn: &mut PgConnection, kind: EntityKind) -> Result<i32> {
        if let Some(id) = self.content_types.get(&kind).await {
            return Ok(id);
        }

        debug!(kind = %kind, "Content type cache miss");
        let row = queries::get_content_type(conn, kind.app_label(), kind.as_str()).await?;
        self.content_types.insert(kind, row.id).await;
        Ok(row.id)
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            content_types_size: self.content_types.entry_count(),
        }
    }

    /// Invalidate all caches
    pub fn invalidate_all(&self) {
        self.content_types.invalidate_all();
        info!("All caches invalidated");
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }
}

/// Cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub content_types_size: u64,
}

/// Load every known content type up front.
///
/// Kinds missing from the database are logged and left for a later lookup to
/// report.
pub async fn warm_cache(cache: &AppCache, conn: &mut PgConnection) {
    for kind in EntityKind::ALL {
        match queries::get_content_type(conn, kind.app_label(), kind.as_str()).await {
            Ok(row) => cache.content_types.insert(*kind, row.id).await,
            Err(e) => warn!(kind = %kind, "Failed to warm content type cache: {}", e),
        }
    }
    debug!("Content type cache warm-up complete. Stats: {:?}", cache.stats());
}
