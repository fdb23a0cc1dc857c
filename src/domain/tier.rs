//! Commission tier reference data.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};

/// A commission band: previous-month sales in `[min_sales, max_sales]` earn `percentage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionTier {
    pub id: i64,
    pub name: String,
    pub min_sales: Decimal,
    pub max_sales: Decimal,
    pub percentage: Decimal,
}

impl CommissionTier {
    /// Inclusive on both ends.
    pub fn contains(&self, sales: Decimal) -> bool {
        self.min_sales <= sales && sales <= self.max_sales
    }
}

/// A legacy dynamic-rate band, half-open `[min_sales, max_sales)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicRateBand {
    pub min_sales: Decimal,
    pub max_sales: Decimal,
    pub percentage: Decimal,
}

impl DynamicRateBand {
    pub fn contains(&self, sales: Decimal) -> bool {
        self.min_sales <= sales && sales < self.max_sales
    }
}
