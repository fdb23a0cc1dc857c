//! Employee reference data.

use crate::domain::{Decimal, EmployeeId, YearMonth};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub hourly_wage: Decimal,
    /// Base percentage used by the legacy dynamic-rate commission mode.
    pub base_commission_pct: Decimal,
    pub tier_id: Option<i64>,
    /// Month the stored tier was last resolved for.
    pub tier_month: Option<YearMonth>,
    pub is_active: bool,
}

impl Employee {
    /// Whether the stored tier must be re-resolved for a shift in `month`.
    pub fn needs_tier_refresh(&self, month: YearMonth) -> bool {
        self.tier_id.is_none() || self.tier_month != Some(month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(tier_id: Option<i64>, tier_month: Option<YearMonth>) -> Employee {
        Employee {
            id: EmployeeId::new(7),
            name: "Sam".to_string(),
            hourly_wage: Decimal::from_int(15),
            base_commission_pct: Decimal::from_int(8),
            tier_id,
            tier_month,
            is_active: true,
        }
    }

    #[test]
    fn test_tier_refresh_once_per_month() {
        let march = YearMonth::new(2025, 3).unwrap();
        let april = YearMonth::new(2025, 4).unwrap();
        assert!(employee(None, None).needs_tier_refresh(march));
        assert!(!employee(Some(3), Some(march)).needs_tier_refresh(march));
        assert!(employee(Some(3), Some(march)).needs_tier_refresh(april));
    }
}
