pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use catalog::{CatalogCache, CatalogLoadError, CatalogSnapshot};
pub use config::{CommissionMode, Config, RankRewardMode};
pub use db::{init_db, Repository};
pub use domain::{
    ActiveBonus, BonusId, BonusKind, Decimal, EmployeeId, FortnightPeriod, FortnightSettlement,
    Product, RankChange, SettledShift, ShiftId, ShiftInput, YearMonth,
};
pub use error::AppError;
pub use orchestration::{
    BonusLedger, FortnightAggregator, RankEngine, Settlement, SettlementError,
    ShiftSettlementEngine, TierResolver,
};
