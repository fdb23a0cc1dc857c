//! Read-through cache of reference data (tiers, ranks, dynamic rates).
//!
//! Services never read the catalog tables directly. Every catalog write goes
//! through [`CatalogCache`] and invalidates it.

use crate::db::Repository;
use crate::domain::{Decimal, Rank};
use crate::engine::{CatalogError, DynamicRateTable, RankLadder, TierCatalog};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CatalogLoadError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// One consistent, validated view of the reference catalogs.
#[derive(Debug)]
pub struct CatalogSnapshot {
    pub tiers: TierCatalog,
    pub ranks: RankLadder,
    pub dynamic_rates: DynamicRateTable,
    cached_at: Instant,
}

impl CatalogSnapshot {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() >= ttl
    }
}

pub struct CatalogCache {
    repo: Arc<Repository>,
    ttl: Duration,
    current: RwLock<Option<Arc<CatalogSnapshot>>>,
}

impl CatalogCache {
    pub fn new(repo: Arc<Repository>, ttl: Duration) -> Self {
        Self {
            repo,
            ttl,
            current: RwLock::new(None),
        }
    }

    /// The cached snapshot, reloading it when missing or older than the TTL.
    ///
    /// # Errors
    /// A misconfigured catalog is surfaced as `CatalogLoadError::Catalog`.
    pub async fn snapshot(&self) -> Result<Arc<CatalogSnapshot>, CatalogLoadError> {
        {
            let current = self.current.read().await;
            if let Some(snapshot) = current.as_ref() {
                if !snapshot.is_expired(self.ttl) {
                    return Ok(Arc::clone(snapshot));
                }
            }
        }

        let mut current = self.current.write().await;
        // Another task may have reloaded while we waited for the lock.
        if let Some(snapshot) = current.as_ref() {
            if !snapshot.is_expired(self.ttl) {
                return Ok(Arc::clone(snapshot));
            }
        }

        let snapshot = Arc::new(self.load().await?);
        debug!(
            tiers = snapshot.tiers.tiers().len(),
            ranks = snapshot.ranks.ranks().len(),
            "Catalog cache reloaded"
        );
        *current = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    async fn load(&self) -> Result<CatalogSnapshot, CatalogLoadError> {
        let tiers = TierCatalog::new(self.repo.list_tiers().await?)?;
        let ranks = RankLadder::new(self.repo.list_ranks().await?)?;
        let dynamic_rates = DynamicRateTable::new(self.repo.list_dynamic_rates().await?);

        Ok(CatalogSnapshot {
            tiers,
            ranks,
            dynamic_rates,
            cached_at: Instant::now(),
        })
    }

    /// Drop the cached snapshot; the next read reloads from the database.
    pub async fn invalidate(&self) {
        *self.current.write().await = None;
        info!("Catalog cache invalidated");
    }

    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_tier(
        &self,
        name: &str,
        min_sales: Decimal,
        max_sales: Decimal,
        percentage: Decimal,
    ) -> Result<i64, CatalogLoadError> {
        let id = self
            .repo
            .upsert_tier(name, min_sales, max_sales, percentage)
            .await?;
        self.invalidate().await;
        Ok(id)
    }

    /// # Errors
    /// Returns an error if the write fails.
    pub async fn upsert_rank(&self, rank: &Rank) -> Result<i64, CatalogLoadError> {
        let id = self.repo.upsert_rank(rank).await?;
        self.invalidate().await;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup_cache(ttl: Duration) -> (CatalogCache, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (CatalogCache::new(Arc::new(Repository::new(pool)), ttl), temp_dir)
    }

    #[tokio::test]
    async fn test_seeded_catalog_loads() {
        let (cache, _dir) = setup_cache(Duration::from_secs(60)).await;
        let snapshot = cache.snapshot().await.unwrap();
        assert_eq!(snapshot.tiers.fallback().name, "Tier C");
        assert_eq!(snapshot.ranks.lowest().name, "Rookie");
        assert_eq!(snapshot.ranks.ranks().len(), 6);
    }

    #[tokio::test]
    async fn test_snapshot_is_shared_until_invalidated() {
        let (cache, _dir) = setup_cache(Duration::from_secs(60)).await;
        let first = cache.snapshot().await.unwrap();
        let second = cache.snapshot().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.invalidate().await;
        let third = cache.snapshot().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
    }

    #[tokio::test]
    async fn test_write_invalidates() {
        let (cache, _dir) = setup_cache(Duration::from_secs(60)).await;
        let before = cache.snapshot().await.unwrap();
        assert_eq!(before.tiers.fallback().percentage, Decimal::from_int(6));

        cache
            .upsert_tier(
                "Tier C",
                Decimal::zero(),
                Decimal::from_scaled(4999999, 2),
                Decimal::from_int(7),
            )
            .await
            .unwrap();

        let after = cache.snapshot().await.unwrap();
        assert_eq!(after.tiers.fallback().percentage, Decimal::from_int(7));
    }

    #[tokio::test]
    async fn test_misconfigured_catalog_is_fatal() {
        let (cache, _dir) = setup_cache(Duration::from_secs(60)).await;
        cache
            .upsert_tier(
                "Overlapping",
                Decimal::from_int(40000),
                Decimal::from_int(60000),
                Decimal::from_int(9),
            )
            .await
            .unwrap();

        let result = cache.snapshot().await;
        assert!(matches!(
            result,
            Err(CatalogLoadError::Catalog(CatalogError::Overlap(_, _)))
        ));
    }

    #[tokio::test]
    async fn test_zero_ttl_always_reloads() {
        let (cache, _dir) = setup_cache(Duration::ZERO).await;
        let first = cache.snapshot().await.unwrap();
        let second = cache.snapshot().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
