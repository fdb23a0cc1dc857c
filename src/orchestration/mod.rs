//! Stateful services that combine the pure engine with the repository.

pub mod fortnight;
pub mod ledger;
pub mod locks;
pub mod rank;
pub mod rolling;
pub mod settlement;
pub mod tiers;

#[cfg(test)]
mod test_support;

pub use fortnight::FortnightAggregator;
pub use ledger::BonusLedger;
pub use locks::{EmployeeGuard, EmployeeLocks};
pub use rank::{BonusReward, CoinReward, RankEngine, RewardStrategy};
pub use rolling::RollingPerformanceTracker;
pub use settlement::{Settlement, ShiftSettlementEngine};
pub use tiers::{ResolvedTier, TierRefresh, TierResolver};

use crate::catalog::CatalogLoadError;
use crate::domain::{BonusId, EmployeeId, ShiftId, ShiftInputError, YearMonth};
use crate::engine::{AmountOverflow, CatalogError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// RNG shared by the services that make random picks.
pub type SharedRng = Arc<Mutex<StdRng>>;

/// Seeded when `seed` is set, otherwise from OS entropy.
pub fn shared_rng(seed: Option<u64>) -> SharedRng {
    let rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Arc::new(Mutex::new(rng))
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("invalid shift input: {0}")]
    InvalidInput(#[from] ShiftInputError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("shift {0} not found")]
    ShiftNotFound(ShiftId),
    #[error("bonus {0} not found")]
    BonusNotFound(BonusId),
    #[error("shift {0} is already closed")]
    AlreadyClosed(ShiftId),
    #[error("no fortnight {fortnight} of {month} for employee {employee_id}")]
    FortnightNotFound {
        employee_id: EmployeeId,
        month: YearMonth,
        fortnight: u8,
    },
    #[error("bonus {0} was consumed by a concurrent settlement")]
    BonusConflict(BonusId),
    #[error(transparent)]
    AmountOverflow(#[from] AmountOverflow),
    #[error("export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl From<CatalogLoadError> for SettlementError {
    fn from(err: CatalogLoadError) -> Self {
        match err {
            CatalogLoadError::Catalog(e) => SettlementError::Catalog(e),
            CatalogLoadError::Db(e) => SettlementError::Db(e),
        }
    }
}
