//! Monthly rank evaluation and rank-up rewards.

use crate::catalog::CatalogCache;
use crate::db::Repository;
use crate::domain::{
    BonusKind, Decimal, EmployeeId, EmployeeRankRecord, Rank, RankChange, RewardCurrency,
    RewardGrant, YearMonth,
};
use crate::engine::{pick_reward, RankLadder};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::SqliteConnection;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::{BonusLedger, EmployeeLocks, SettlementError, SharedRng};

/// Coin ledger entry kind for rank rewards.
pub const RANK_REWARD_KIND: &str = "rank_reward";

/// Pays out a rank-up reward in one currency.
#[async_trait]
pub trait RewardStrategy: Send + Sync + fmt::Debug {
    fn currency(&self) -> RewardCurrency;

    /// Credit `amount` to the employee for reaching `rank`, writing on
    /// `conn` so the grant commits with the rank record.
    async fn grant(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        rank: &Rank,
        amount: Decimal,
    ) -> Result<RewardGrant, SettlementError>;
}

/// Rewards become a flat bonus on the next settled shift.
#[derive(Debug)]
pub struct BonusReward {
    ledger: Arc<BonusLedger>,
}

impl BonusReward {
    pub fn new(ledger: Arc<BonusLedger>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl RewardStrategy for BonusReward {
    fn currency(&self) -> RewardCurrency {
        RewardCurrency::CommissionBonus
    }

    async fn grant(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        _rank: &Rank,
        amount: Decimal,
    ) -> Result<RewardGrant, SettlementError> {
        let id = self
            .ledger
            .grant_in(conn, employee_id, BonusKind::Flat, amount)
            .await?;
        Ok(RewardGrant {
            amount,
            currency: self.currency(),
            reference: id.as_i64(),
        })
    }
}

/// Rewards are credited to the coin ledger as whole coins.
#[derive(Debug)]
pub struct CoinReward {
    repo: Arc<Repository>,
}

impl CoinReward {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl RewardStrategy for CoinReward {
    fn currency(&self) -> RewardCurrency {
        RewardCurrency::Coins
    }

    async fn grant(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        rank: &Rank,
        amount: Decimal,
    ) -> Result<RewardGrant, SettlementError> {
        let coins = amount.inner().trunc().to_i64().ok_or_else(|| {
            SettlementError::InvalidRequest(format!("reward {} is not a coin amount", amount))
        })?;
        let id = self
            .repo
            .insert_coin_transaction(
                conn,
                employee_id,
                coins,
                RANK_REWARD_KIND,
                &format!("Reward for reaching {}", rank.name),
                Some(&rank.name),
            )
            .await?;
        Ok(RewardGrant {
            amount: Decimal::from_int(coins),
            currency: self.currency(),
            reference: id,
        })
    }
}

pub struct RankEngine {
    repo: Arc<Repository>,
    catalog: Arc<CatalogCache>,
    strategy: Arc<dyn RewardStrategy>,
    rng: SharedRng,
    locks: EmployeeLocks,
}

impl RankEngine {
    pub fn new(
        repo: Arc<Repository>,
        catalog: Arc<CatalogCache>,
        strategy: Arc<dyn RewardStrategy>,
        rng: SharedRng,
    ) -> Self {
        Self {
            repo,
            catalog,
            strategy,
            rng,
            locks: EmployeeLocks::new(),
        }
    }

    /// Match the employee's month-to-date sales against the rank ladder and
    /// record the result. Returns the change when the rank moved; a rank-up
    /// to anything above the lowest rank carries a reward.
    ///
    /// The record and the reward commit in one transaction: a failed grant
    /// leaves the previous record in place, so the next evaluation retries.
    ///
    /// # Errors
    /// Returns `Catalog` if no rank band matches the sales.
    pub async fn evaluate(
        &self,
        employee_id: EmployeeId,
        month: YearMonth,
    ) -> Result<Option<RankChange>, SettlementError> {
        let _guard = self.locks.acquire(employee_id).await;
        let snapshot = self.catalog.snapshot().await?;

        let mut tx = self.repo.begin().await?;
        self.repo.lock_employee_row(&mut tx, employee_id).await?;
        let change = self
            .evaluate_in(&mut tx, &snapshot.ranks, employee_id, month)
            .await?;
        tx.commit().await?;

        if let Some(change) = &change {
            info!(
                employee_id = %employee_id,
                month = %month,
                from = %change.old_rank,
                to = %change.new_rank,
                rank_up = change.rank_up,
                reward = ?change.reward.as_ref().map(|r| r.amount),
                "Rank changed"
            );
        }
        Ok(change)
    }

    async fn evaluate_in(
        &self,
        conn: &mut SqliteConnection,
        ladder: &RankLadder,
        employee_id: EmployeeId,
        month: YearMonth,
    ) -> Result<Option<RankChange>, SettlementError> {
        let total_sales = self.repo.month_sales(&mut *conn, employee_id, month).await?;
        let new_rank = ladder.matching(total_sales)?;
        let stored = self
            .repo
            .get_rank_record(&mut *conn, employee_id, month)
            .await?;

        let old_rank = match &stored {
            Some(record) if record.current_rank == new_rank.name => {
                self.repo
                    .upsert_rank_record(
                        &mut *conn,
                        &EmployeeRankRecord {
                            total_sales,
                            ..record.clone()
                        },
                    )
                    .await?;
                return Ok(None);
            }
            Some(record) => record.current_rank.clone(),
            None if ladder.is_lowest(new_rank) => {
                self.repo
                    .upsert_rank_record(&mut *conn, &EmployeeRankRecord {
                        employee_id,
                        month,
                        current_rank: new_rank.name.clone(),
                        previous_rank: None,
                        total_sales,
                        notified: true,
                    })
                    .await?;
                return Ok(None);
            }
            None => ladder.lowest().name.clone(),
        };

        let rank_up = ladder.is_rank_up(&old_rank, new_rank);
        self.repo
            .upsert_rank_record(&mut *conn, &EmployeeRankRecord {
                employee_id,
                month,
                current_rank: new_rank.name.clone(),
                previous_rank: Some(old_rank.clone()),
                total_sales,
                notified: false,
            })
            .await?;

        let reward = if rank_up && !ladder.is_lowest(new_rank) {
            self.reward(conn, employee_id, new_rank).await?
        } else {
            None
        };

        Ok(Some(RankChange {
            employee_id,
            month,
            old_rank,
            new_rank: new_rank.name.clone(),
            rank_up,
            emoji: new_rank.emoji.clone(),
            reward,
        }))
    }

    async fn reward(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        rank: &Rank,
    ) -> Result<Option<RewardGrant>, SettlementError> {
        let amount = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            pick_reward(rank, &mut *rng)
        };
        match amount {
            Some(amount) => Ok(Some(
                self.strategy.grant(conn, employee_id, rank, amount).await?,
            )),
            None => Ok(None),
        }
    }

    /// Acknowledge the month's rank change. Returns `false` if the employee
    /// has no record for `month`.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_notified(
        &self,
        employee_id: EmployeeId,
        month: YearMonth,
    ) -> Result<bool, sqlx::Error> {
        self.repo.mark_rank_notified(employee_id, month).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn rank_record(
        &self,
        employee_id: EmployeeId,
        month: YearMonth,
    ) -> Result<Option<EmployeeRankRecord>, sqlx::Error> {
        let mut conn = self.repo.pool().acquire().await?;
        self.repo.get_rank_record(&mut conn, employee_id, month).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn coin_balance(&self, employee_id: EmployeeId) -> Result<i64, sqlx::Error> {
        self.repo.coin_balance(employee_id).await
    }
}
