//! Domain types for shift settlement and payroll.
//!
//! This module provides:
//! - Lossless money handling via the Decimal wrapper
//! - Identifiers, products and calendar months
//! - Shift input/settled shift, bonus, tier, rank and fortnight records

pub mod bonus;
pub mod decimal;
pub mod employee;
pub mod fortnight;
pub mod primitives;
pub mod rank;
pub mod shift;
pub mod tier;

pub use bonus::{ActiveBonus, BonusKind, BonusState, UnknownBonusKind, MAX_BONUS_VALUE};
pub use decimal::Decimal;
pub use employee::Employee;
pub use fortnight::{FortnightPeriod, FortnightSettlement, InvalidFortnight};
pub use primitives::{BonusId, EmployeeId, Product, ShiftId, YearMonth, YearMonthParseError};
pub use rank::{EmployeeRankRecord, Rank, RankChange, RewardCurrency, RewardGrant};
pub use shift::{
    models_of, SettledShift, ShiftInput, ShiftInputError, CLOCK_FORMAT, DATE_FORMAT,
    MAX_SHIFT_SALES,
};
pub use tier::{CommissionTier, DynamicRateBand};
