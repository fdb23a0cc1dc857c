//! Monthly ranks, per-employee rank records and rank changes.

use crate::domain::{Decimal, EmployeeId, YearMonth};
use serde::{Deserialize, Serialize};

/// A rank band over cumulative monthly sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    pub id: i64,
    pub name: String,
    /// Fixed ordering; higher is better.
    pub position: i32,
    pub min_sales: Decimal,
    pub max_sales: Decimal,
    pub emoji: String,
    pub description: String,
    /// Possible reward magnitudes; zeros are ignored when picking.
    pub reward_pool: Vec<Decimal>,
}

impl Rank {
    /// Inclusive on both ends.
    pub fn contains(&self, sales: Decimal) -> bool {
        self.min_sales <= sales && sales <= self.max_sales
    }
}

/// One record per employee per calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeRankRecord {
    pub employee_id: EmployeeId,
    pub month: YearMonth,
    pub current_rank: String,
    pub previous_rank: Option<String>,
    pub total_sales: Decimal,
    pub notified: bool,
}

/// Currency a rank reward is paid in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardCurrency {
    /// Granted as a flat ActiveBonus consumed on the next settled shift.
    CommissionBonus,
    /// Credited to the coin ledger (100 coins = $1).
    Coins,
}

/// A reward credited on rank-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardGrant {
    pub amount: Decimal,
    pub currency: RewardCurrency,
    /// Bonus id or coin transaction id, depending on currency.
    pub reference: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankChange {
    pub employee_id: EmployeeId,
    pub month: YearMonth,
    pub old_rank: String,
    pub new_rank: String,
    pub rank_up: bool,
    pub emoji: String,
    pub reward: Option<RewardGrant>,
}
