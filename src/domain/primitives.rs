//! Domain primitives: identifiers, product names, calendar months.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Employee identifier (the chat user id in the front-end).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EmployeeId(pub i64);

impl EmployeeId {
    pub fn new(id: i64) -> Self {
        EmployeeId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persisted shift identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShiftId(pub i64);

impl ShiftId {
    pub fn new(id: i64) -> Self {
        ShiftId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ShiftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Active bonus identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BonusId(pub i64);

impl BonusId {
    pub fn new(id: i64) -> Self {
        BonusId(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for BonusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Product (a.k.a. model): a sales category line item within a shift.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Product(pub String);

impl Product {
    pub fn new(name: impl Into<String>) -> Self {
        Product(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A calendar month, the unit tiers and ranks are keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid month: {0}")]
pub struct YearMonthParseError(pub String);

impl YearMonth {
    /// Create a YearMonth; `month` must be in 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self, YearMonthParseError> {
        if !(1..=12).contains(&month) {
            return Err(YearMonthParseError(format!("{year}-{month}")));
        }
        Ok(YearMonth { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        YearMonth {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The month immediately before this one (January rolls back a year).
    pub fn previous(&self) -> Self {
        if self.month == 1 {
            YearMonth {
                year: self.year - 1,
                month: 12,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// The month immediately after this one (December rolls into January).
    pub fn next(&self) -> Self {
        if self.month == 12 {
            YearMonth {
                year: self.year + 1,
                month: 1,
            }
        } else {
            YearMonth {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = YearMonthParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| YearMonthParseError(s.to_string()))?;
        let year = year
            .parse::<i32>()
            .map_err(|_| YearMonthParseError(s.to_string()))?;
        let month = month
            .parse::<u32>()
            .map_err(|_| YearMonthParseError(s.to_string()))?;
        YearMonth::new(year, month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previous_month_rolls_year() {
        let jan = YearMonth::new(2025, 1).unwrap();
        assert_eq!(jan.previous(), YearMonth::new(2024, 12).unwrap());
        let jul = YearMonth::new(2025, 7).unwrap();
        assert_eq!(jul.previous(), YearMonth::new(2025, 6).unwrap());
    }

    #[test]
    fn test_next_month_rolls_year() {
        let dec = YearMonth::new(2024, 12).unwrap();
        assert_eq!(dec.next(), YearMonth::new(2025, 1).unwrap());
    }

    #[test]
    fn test_month_bounds() {
        let feb = YearMonth::new(2024, 2).unwrap();
        assert_eq!(feb.first_day(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(feb.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        let dec = YearMonth::new(2024, 12).unwrap();
        assert_eq!(dec.last_day(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[test]
    fn test_year_month_roundtrip_string() {
        let ym: YearMonth = "2025-03".parse().unwrap();
        assert_eq!(ym.to_string(), "2025-03");
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("garbage".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_id_display() {
        assert_eq!(EmployeeId::new(42).to_string(), "42");
        assert_eq!(Product::new("Alice").to_string(), "Alice");
    }
}
