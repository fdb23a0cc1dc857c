//! Legacy per-shift commission adjustment by month-to-date sales.

use crate::domain::{Decimal, DynamicRateBand};

/// Base percentage given to employees provisioned without one.
pub const DEFAULT_BASE_COMMISSION_PCT: i64 = 8;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DynamicRateTable {
    /// Ordered by `min_sales` descending.
    bands: Vec<DynamicRateBand>,
}

impl DynamicRateTable {
    pub fn new(mut bands: Vec<DynamicRateBand>) -> Self {
        bands.sort_by(|a, b| b.min_sales.cmp(&a.min_sales));
        Self { bands }
    }

    /// Extra percentage points for `month_to_date_sales` (current shift
    /// included). Highest matching half-open band wins; no match adds zero.
    pub fn rate_for(&self, month_to_date_sales: Decimal) -> Decimal {
        self.bands
            .iter()
            .find(|band| band.contains(month_to_date_sales))
            .map(|band| band.percentage)
            .unwrap_or_default()
    }

    /// Employee base percentage plus the dynamic rate.
    pub fn commission_pct(&self, base_pct: Decimal, month_to_date_sales: Decimal) -> Decimal {
        base_pct + self.rate_for(month_to_date_sales)
    }
}
