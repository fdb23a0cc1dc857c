//! Reference catalog operations: tiers, dynamic rates, ranks and rewards.

use crate::domain::{CommissionTier, Decimal, DynamicRateBand, Rank};
use sqlx::Row;
use std::collections::HashMap;

use super::{decimal_col, Repository};

impl Repository {
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_tiers(&self) -> Result<Vec<CommissionTier>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, min_sales, max_sales, percentage
            FROM commission_tiers
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| CommissionTier {
                id: r.get("id"),
                name: r.get("name"),
                min_sales: decimal_col(r, "min_sales"),
                max_sales: decimal_col(r, "max_sales"),
                percentage: decimal_col(r, "percentage"),
            })
            .collect())
    }

    /// Insert a tier or replace the band of the tier with the same name.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_tier(
        &self,
        name: &str,
        min_sales: Decimal,
        max_sales: Decimal,
        percentage: Decimal,
    ) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            r#"
            INSERT INTO commission_tiers (name, min_sales, max_sales, percentage)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                min_sales = excluded.min_sales,
                max_sales = excluded.max_sales,
                percentage = excluded.percentage
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(min_sales.to_canonical_string())
        .bind(max_sales.to_canonical_string())
        .bind(percentage.to_canonical_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("id"))
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_dynamic_rates(&self) -> Result<Vec<DynamicRateBand>, sqlx::Error> {
        let rows = sqlx::query("SELECT min_sales, max_sales, percentage FROM dynamic_rates ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|r| DynamicRateBand {
                min_sales: decimal_col(r, "min_sales"),
                max_sales: decimal_col(r, "max_sales"),
                percentage: decimal_col(r, "percentage"),
            })
            .collect())
    }

    /// Ranks ordered by position, each with its reward pool.
    ///
    /// # Errors
    /// Returns an error if a query fails.
    pub async fn list_ranks(&self) -> Result<Vec<Rank>, sqlx::Error> {
        let reward_rows = sqlx::query("SELECT rank_id, amount FROM rank_rewards ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let mut pools: HashMap<i64, Vec<Decimal>> = HashMap::new();
        for row in &reward_rows {
            pools
                .entry(row.get("rank_id"))
                .or_default()
                .push(decimal_col(row, "amount"));
        }

        let rows = sqlx::query(
            r#"
            SELECT id, name, position, min_sales, max_sales, emoji, description
            FROM ranks
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let id: i64 = r.get("id");
                Rank {
                    id,
                    name: r.get("name"),
                    position: r.get("position"),
                    min_sales: decimal_col(r, "min_sales"),
                    max_sales: decimal_col(r, "max_sales"),
                    emoji: r.get("emoji"),
                    description: r.get("description"),
                    reward_pool: pools.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }

    /// Insert or update a rank by name and replace its reward pool.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_rank(&self, rank: &Rank) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO ranks (name, position, min_sales, max_sales, emoji, description)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                position = excluded.position,
                min_sales = excluded.min_sales,
                max_sales = excluded.max_sales,
                emoji = excluded.emoji,
                description = excluded.description
            RETURNING id
            "#,
        )
        .bind(rank.name.as_str())
        .bind(rank.position)
        .bind(rank.min_sales.to_canonical_string())
        .bind(rank.max_sales.to_canonical_string())
        .bind(rank.emoji.as_str())
        .bind(rank.description.as_str())
        .fetch_one(&mut *tx)
        .await?;
        let rank_id: i64 = row.get("id");

        sqlx::query("DELETE FROM rank_rewards WHERE rank_id = ?")
            .bind(rank_id)
            .execute(&mut *tx)
            .await?;
        for amount in &rank.reward_pool {
            sqlx::query("INSERT INTO rank_rewards (rank_id, amount) VALUES (?, ?)")
                .bind(rank_id)
                .bind(amount.to_canonical_string())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(rank_id)
    }
}
