//! Pure computation engine(s) for deterministic settlement logic.
//!
//! Nothing in here touches the database; randomness is always injected.

pub mod commission;
pub mod dynamic_rate;
pub mod fortnight;
pub mod peer;
pub mod rank;
pub mod rolling;
pub mod tiers;

pub use commission::{fold_bonuses, worked_hours, BonusFold, Earnings, NET_SALES_RATIO};
pub use dynamic_rate::{DynamicRateTable, DEFAULT_BASE_COMMISSION_PCT};
pub use fortnight::{fold_period, PeriodShift};
pub use peer::{resolve_percent_all, resolve_percent_prev, PeerBonus, PeerShift};
pub use rank::{pick_reward, RankLadder};
pub use rolling::{performance_flag, weighted_average, RollingWindow, ROLLING_WINDOW_DAYS};
pub use tiers::TierCatalog;

/// A settlement amount left the representable decimal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{0} overflows the decimal range")]
pub struct AmountOverflow(pub &'static str);

/// Reference-data misconfiguration. Always fatal: never silently defaulted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("{0} catalog is empty")]
    Empty(&'static str),

    #[error("band {0} has min above max")]
    InvalidBand(String),

    #[error("bands {0} and {1} overlap")]
    Overlap(String, String),

    #[error("lowest tier {0} does not start at zero; no fallback tier")]
    NoFallback(String),

    #[error("no rank band matches sales {0}")]
    NoMatchingRank(String),
}
