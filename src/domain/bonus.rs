//! Active bonus grants and their consumption state.

use crate::domain::{BonusId, Decimal, EmployeeId, ShiftId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest accepted bonus value (dollars for flat kinds, percentage
/// points otherwise).
pub const MAX_BONUS_VALUE: Decimal =
    Decimal::new(rust_decimal::Decimal::from_parts(1_000_000, 0, 0, false, 0));

/// The five bonus behaviours (flat and flat_immediate share one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    /// Adds `value` percentage points to the running commission percentage.
    PercentNext,
    /// Doubles the running commission percentage.
    DoubleCommission,
    /// Adds `value` dollars to earnings.
    Flat,
    /// Same effect as `Flat`; granted for the shift being settled.
    FlatImmediate,
    /// `value`% of a peer's sale of a shared model in the most recent earlier shift.
    PercentPrev,
    /// `value`% of peers' same-day earlier sales of one randomly chosen model.
    PercentAll,
}

impl BonusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BonusKind::PercentNext => "percent_next",
            BonusKind::DoubleCommission => "double_commission",
            BonusKind::Flat => "flat",
            BonusKind::FlatImmediate => "flat_immediate",
            BonusKind::PercentPrev => "percent_prev",
            BonusKind::PercentAll => "percent_all",
        }
    }

    /// Parse a compact grant code such as `flat_10`, `percent_next_1` or
    /// `double_commission`. Returns `None` for codes that carry no
    /// settlement effect or cannot be parsed.
    pub fn parse_code(code: &str) -> Option<(BonusKind, Decimal)> {
        let code = code.trim();
        if code == "double_commission" {
            return Some((BonusKind::DoubleCommission, Decimal::zero()));
        }

        let parts: Vec<&str> = code.split('_').collect();
        match parts.as_slice() {
            ["flat", value] => Decimal::from_str(value)
                .ok()
                .map(|v| (BonusKind::Flat, v)),
            ["flat", "immediate", value] => Decimal::from_str(value)
                .ok()
                .map(|v| (BonusKind::FlatImmediate, v)),
            ["percent", sub, value] => {
                let kind = match *sub {
                    "next" => BonusKind::PercentNext,
                    "prev" => BonusKind::PercentPrev,
                    "all" => BonusKind::PercentAll,
                    _ => return None,
                };
                Decimal::from_str(value).ok().map(|v| (kind, v))
            }
            _ => None,
        }
    }
}

impl fmt::Display for BonusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bonus kind: {0}")]
pub struct UnknownBonusKind(pub String);

impl FromStr for BonusKind {
    type Err = UnknownBonusKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "percent_next" => Ok(BonusKind::PercentNext),
            "double_commission" => Ok(BonusKind::DoubleCommission),
            "flat" => Ok(BonusKind::Flat),
            "flat_immediate" => Ok(BonusKind::FlatImmediate),
            "percent_prev" => Ok(BonusKind::PercentPrev),
            "percent_all" => Ok(BonusKind::PercentAll),
            other => Err(UnknownBonusKind(other.to_string())),
        }
    }
}

/// Consumption state: `Pending -> Applied(shift)`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BonusState {
    Pending,
    Applied {
        shift_id: ShiftId,
        applied_at: NaiveDateTime,
    },
}

impl BonusState {
    pub fn is_pending(&self) -> bool {
        matches!(self, BonusState::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBonus {
    pub id: BonusId,
    pub employee_id: EmployeeId,
    pub kind: BonusKind,
    pub value: Decimal,
    pub state: BonusState,
    pub created_at: NaiveDateTime,
}
