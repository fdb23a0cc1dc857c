//! Semi-monthly payroll periods and their settlements.

use crate::domain::{Decimal, EmployeeId, YearMonth};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Last day-of-month that belongs to the first fortnight.
pub const FIRST_FORTNIGHT_LAST_DAY: u32 = 15;

/// Fortnight 1 is days 1-15, fortnight 2 is day 16 to the end of the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FortnightPeriod {
    pub month: YearMonth,
    pub fortnight: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("fortnight must be 1 or 2, got {0}")]
pub struct InvalidFortnight(pub u8);

impl FortnightPeriod {
    pub fn new(month: YearMonth, fortnight: u8) -> Result<Self, InvalidFortnight> {
        if fortnight != 1 && fortnight != 2 {
            return Err(InvalidFortnight(fortnight));
        }
        Ok(FortnightPeriod { month, fortnight })
    }

    /// The period a shift dated `date` is paid in.
    pub fn containing(date: NaiveDate) -> Self {
        let fortnight = if date.day() <= FIRST_FORTNIGHT_LAST_DAY {
            1
        } else {
            2
        };
        FortnightPeriod {
            month: YearMonth::of(date),
            fortnight,
        }
    }

    pub fn start(&self) -> NaiveDate {
        let first = self.month.first_day();
        if self.fortnight == 1 {
            first
        } else {
            first
                .with_day(FIRST_FORTNIGHT_LAST_DAY + 1)
                .unwrap_or(first)
        }
    }

    pub fn end(&self) -> NaiveDate {
        if self.fortnight == 1 {
            let first = self.month.first_day();
            first.with_day(FIRST_FORTNIGHT_LAST_DAY).unwrap_or(first)
        } else {
            self.month.last_day()
        }
    }

    /// 16th of the same month for fortnight 1, 1st of the next month for fortnight 2.
    pub fn payment_date(&self) -> NaiveDate {
        if self.fortnight == 1 {
            let first = self.month.first_day();
            first
                .with_day(FIRST_FORTNIGHT_LAST_DAY + 1)
                .unwrap_or(first)
        } else {
            self.month.next().first_day()
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start() <= date && date <= self.end()
    }
}

/// Aggregated payroll totals for one employee and one fortnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FortnightSettlement {
    pub employee_id: EmployeeId,
    pub period: FortnightPeriod,
    pub shift_count: i64,
    pub worked_hours: Decimal,
    pub total_sales: Decimal,
    pub total_commissions: Decimal,
    pub total_hourly_pay: Decimal,
    pub total_made: Decimal,
    pub performance_count: i64,
    pub bonus_amount: Decimal,
    pub total_salary: Decimal,
    pub payment_date: NaiveDate,
    pub is_paid: bool,
}
