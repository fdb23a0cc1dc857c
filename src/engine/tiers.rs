use crate::domain::{CommissionTier, Decimal};

use super::CatalogError;

/// Validated commission tier catalog, ordered by `min_sales` descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCatalog {
    tiers: Vec<CommissionTier>,
}

impl TierCatalog {
    /// Build a catalog, rejecting overlapping bands and catalogs without a
    /// catch-all lowest tier starting at zero.
    pub fn new(mut tiers: Vec<CommissionTier>) -> Result<Self, CatalogError> {
        if tiers.is_empty() {
            return Err(CatalogError::Empty("commission tiers"));
        }
        for tier in &tiers {
            if tier.min_sales > tier.max_sales {
                return Err(CatalogError::InvalidBand(tier.name.clone()));
            }
        }

        tiers.sort_by(|a, b| b.min_sales.cmp(&a.min_sales));

        for pair in tiers.windows(2) {
            let (upper, lower) = (&pair[0], &pair[1]);
            if lower.max_sales >= upper.min_sales {
                return Err(CatalogError::Overlap(lower.name.clone(), upper.name.clone()));
            }
        }

        let lowest = &tiers[tiers.len() - 1];
        if lowest.min_sales.is_positive() {
            return Err(CatalogError::NoFallback(lowest.name.clone()));
        }

        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> &[CommissionTier] {
        &self.tiers
    }

    /// The catch-all tier every unmatched total falls back to.
    pub fn fallback(&self) -> &CommissionTier {
        &self.tiers[self.tiers.len() - 1]
    }

    /// First tier, scanning by `min_sales` descending, whose inclusive range
    /// holds `sales`; otherwise the fallback tier.
    pub fn resolve(&self, sales: Decimal) -> &CommissionTier {
        self.tiers
            .iter()
            .find(|tier| tier.contains(sales))
            .unwrap_or_else(|| self.fallback())
    }

    pub fn by_id(&self, id: i64) -> Option<&CommissionTier> {
        self.tiers.iter().find(|tier| tier.id == id)
    }
}
