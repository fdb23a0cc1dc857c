//! Shift input collected by the front-end and the settled shift record.

use crate::domain::{BonusId, Decimal, EmployeeId, Product, ShiftId};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Timestamp format used for clock times in storage and reporting.
pub const CLOCK_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format used for shift dates in storage and reporting.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Ceiling on a single product amount and on a shift's total sales.
pub const MAX_SHIFT_SALES: Decimal =
    Decimal::new(rust_decimal::Decimal::from_parts(1_000_000_000, 0, 0, false, 0));

/// Raw shift data handed over by the chat front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftInput {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub clock_in: NaiveDateTime,
    /// `None` while the shift is still open.
    pub clock_out: Option<NaiveDateTime>,
    pub product_sales: BTreeMap<Product, Decimal>,
    /// Client-supplied key; re-submitting the same key returns the stored shift.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShiftInputError {
    #[error("sale amount for {0} is negative")]
    NegativeAmount(Product),
    #[error("sale amount for {0} has more than two decimal places")]
    SubCentAmount(Product),
    #[error("sale amount for {0} exceeds the maximum of {max}", max = MAX_SHIFT_SALES)]
    AmountTooLarge(Product),
    #[error("total sales exceed the maximum of {max}", max = MAX_SHIFT_SALES)]
    TotalTooLarge,
    #[error("clock-out {clock_out} is before clock-in {clock_in}")]
    ClockOutBeforeClockIn {
        clock_in: NaiveDateTime,
        clock_out: NaiveDateTime,
    },
    #[error("employee name must not be empty")]
    EmptyName,
}

impl ShiftInput {
    /// Reject inputs the settlement arithmetic cannot accept.
    pub fn validate(&self) -> Result<(), ShiftInputError> {
        if self.employee_name.trim().is_empty() {
            return Err(ShiftInputError::EmptyName);
        }
        for (product, amount) in &self.product_sales {
            if amount.is_negative() {
                return Err(ShiftInputError::NegativeAmount(product.clone()));
            }
            if *amount > MAX_SHIFT_SALES {
                return Err(ShiftInputError::AmountTooLarge(product.clone()));
            }
            if amount.round_money() != *amount {
                return Err(ShiftInputError::SubCentAmount(product.clone()));
            }
        }
        check_total(&self.product_sales)?;
        if let Some(clock_out) = self.clock_out {
            if clock_out < self.clock_in {
                return Err(ShiftInputError::ClockOutBeforeClockIn {
                    clock_in: self.clock_in,
                    clock_out,
                });
            }
        }
        Ok(())
    }

    /// Sum of the product lines. Call after [`validate`](Self::validate),
    /// which bounds the total.
    pub fn total_sales(&self) -> Decimal {
        self.product_sales.values().sum()
    }

    /// The shift date is the calendar date of clock-in.
    pub fn shift_date(&self) -> NaiveDate {
        self.clock_in.date()
    }

    /// Products with non-zero sales ("current models").
    pub fn models(&self) -> BTreeSet<Product> {
        models_of(&self.product_sales)
    }
}

/// Products with non-zero sales in a product breakdown.
pub fn models_of(product_sales: &BTreeMap<Product, Decimal>) -> BTreeSet<Product> {
    product_sales
        .iter()
        .filter(|(_, amount)| amount.is_positive())
        .map(|(product, _)| product.clone())
        .collect()
}

/// Reject a product breakdown whose total exceeds [`MAX_SHIFT_SALES`].
fn check_total(product_sales: &BTreeMap<Product, Decimal>) -> Result<(), ShiftInputError> {
    let total = product_sales
        .values()
        .try_fold(Decimal::zero(), |acc, amount| acc.checked_add(*amount))
        .ok_or(ShiftInputError::TotalTooLarge)?;
    if total > MAX_SHIFT_SALES {
        return Err(ShiftInputError::TotalTooLarge);
    }
    Ok(())
}

/// A fully settled (or, for open shifts, partially settled) shift.
///
/// Money fields are quantized to cents; this is the record handed to
/// downstream reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledShift {
    pub id: ShiftId,
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub date: NaiveDate,
    pub clock_in: NaiveDateTime,
    pub clock_out: Option<NaiveDateTime>,
    pub product_sales: BTreeMap<Product, Decimal>,
    pub worked_hours: Decimal,
    pub total_sales: Decimal,
    pub net_sales: Decimal,
    pub tier_name: String,
    pub base_commission_pct: Decimal,
    pub bonus_pct: Decimal,
    pub commission_pct: Decimal,
    pub flat_bonus_total: Decimal,
    pub commissions: Decimal,
    pub hourly_pay: Decimal,
    pub total_made: Decimal,
    pub rolling_average: Decimal,
    pub performance_flag: bool,
    pub applied_bonus_ids: Vec<BonusId>,
}

impl SettledShift {
    pub fn is_open(&self) -> bool {
        self.clock_out.is_none()
    }

    /// Human readable commission breakdown, e.g. `12.00% (Tier C: 6.0% +6.0% bonus)`.
    pub fn breakdown(&self) -> String {
        let mut parts = format!("{}: {:.1}%", self.tier_name, self.base_commission_pct.inner());
        if self.bonus_pct.is_positive() {
            parts.push_str(&format!(" +{:.1}% bonus", self.bonus_pct.inner()));
        }
        if self.flat_bonus_total.is_positive() {
            parts.push_str(&format!(" +${} flat", self.flat_bonus_total.to_money_string()));
        }
        format!("{:.2}% ({})", self.commission_pct.inner(), parts)
    }

    /// Flat key/value view with stable field names for reporting mirrors.
    pub fn to_record(&self) -> BTreeMap<&'static str, String> {
        let mut record = BTreeMap::new();
        record.insert("id", self.id.to_string());
        record.insert("employee_id", self.employee_id.to_string());
        record.insert("employee_name", self.employee_name.clone());
        record.insert("date", self.date.format(DATE_FORMAT).to_string());
        record.insert("clock_in", self.clock_in.format(CLOCK_FORMAT).to_string());
        record.insert(
            "clock_out",
            self.clock_out
                .map(|t| t.format(CLOCK_FORMAT).to_string())
                .unwrap_or_default(),
        );
        record.insert("worked_hours", self.worked_hours.to_money_string());
        record.insert("total_sales", self.total_sales.to_money_string());
        record.insert("net_sales", self.net_sales.to_money_string());
        record.insert("tier_name", self.tier_name.clone());
        record.insert("commission_pct", self.commission_pct.to_money_string());
        record.insert("flat_bonus_total", self.flat_bonus_total.to_money_string());
        record.insert("commissions", self.commissions.to_money_string());
        record.insert("hourly_pay", self.hourly_pay.to_money_string());
        record.insert("total_made", self.total_made.to_money_string());
        record.insert("rolling_average", self.rolling_average.to_money_string());
        record.insert("performance_flag", self.performance_flag.to_string());
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, CLOCK_FORMAT).unwrap()
    }

    fn input(sales: &[(&str, &str)]) -> ShiftInput {
        ShiftInput {
            employee_id: EmployeeId::new(1),
            employee_name: "Dana".to_string(),
            clock_in: dt("2025-03-10 10:00:00"),
            clock_out: Some(dt("2025-03-10 15:00:00")),
            product_sales: sales
                .iter()
                .map(|(p, a)| (Product::new(*p), Decimal::from_str(a).unwrap()))
                .collect(),
            request_id: None,
        }
    }

    #[test]
    fn test_total_sales_and_models() {
        let shift = input(&[("A", "250"), ("B", "150"), ("C", "100"), ("D", "0")]);
        assert_eq!(shift.total_sales(), Decimal::from_int(500));
        let models: Vec<_> = shift.models().into_iter().map(|p| p.0).collect();
        assert_eq!(models, vec!["A", "B", "C"]);
        assert!(shift.validate().is_ok());
    }

    #[test]
    fn test_negative_amount_rejected() {
        let shift = input(&[("A", "-1")]);
        assert_eq!(
            shift.validate(),
            Err(ShiftInputError::NegativeAmount(Product::new("A")))
        );
    }

    #[test]
    fn test_sub_cent_amount_rejected() {
        let shift = input(&[("A", "10.005")]);
        assert!(matches!(
            shift.validate(),
            Err(ShiftInputError::SubCentAmount(_))
        ));
    }

    #[test]
    fn test_sales_ceiling() {
        assert!(input(&[("A", "1000000000")]).validate().is_ok());
        assert_eq!(
            input(&[("A", "1000000000.01")]).validate(),
            Err(ShiftInputError::AmountTooLarge(Product::new("A")))
        );
        assert_eq!(
            input(&[("A", "600000000"), ("B", "400000000.01")]).validate(),
            Err(ShiftInputError::TotalTooLarge)
        );
    }

    #[test]
    fn test_decimal_max_amount_rejected_without_panic() {
        let shift = input(&[("A", "79228162514264337593543950335"), ("B", "1")]);
        assert_eq!(
            shift.validate(),
            Err(ShiftInputError::AmountTooLarge(Product::new("A")))
        );
    }

    #[test]
    fn test_clock_out_before_clock_in_rejected() {
        let mut shift = input(&[("A", "10")]);
        shift.clock_out = Some(dt("2025-03-10 09:00:00"));
        assert!(matches!(
            shift.validate(),
            Err(ShiftInputError::ClockOutBeforeClockIn { .. })
        ));
    }

    #[test]
    fn test_shift_date_is_clock_in_date() {
        let mut shift = input(&[("A", "10")]);
        shift.clock_in = dt("2025-03-10 23:00:00");
        shift.clock_out = Some(dt("2025-03-11 03:00:00"));
        assert_eq!(shift.shift_date(), NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
    }
}
