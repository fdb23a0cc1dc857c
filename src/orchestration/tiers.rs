//! Monthly commission tier resolution.

use crate::catalog::{CatalogCache, CatalogSnapshot};
use crate::db::Repository;
use crate::domain::{CommissionTier, Decimal, Employee, EmployeeId, YearMonth};
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;
use tracing::info;

use super::SettlementError;

/// Tier an employee earns in `month`, from the previous month's sales.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTier {
    pub month: YearMonth,
    pub previous_month_sales: Decimal,
    pub tier: CommissionTier,
}

/// Outcome of one employee in a monthly refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierRefresh {
    pub employee_id: EmployeeId,
    pub previous_tier: Option<String>,
    pub tier: CommissionTier,
    pub previous_month_sales: Decimal,
}

impl TierRefresh {
    pub fn changed(&self) -> bool {
        self.previous_tier.as_deref() != Some(self.tier.name.as_str())
    }
}

pub struct TierResolver {
    repo: Arc<Repository>,
    catalog: Arc<CatalogCache>,
}

impl TierResolver {
    pub fn new(repo: Arc<Repository>, catalog: Arc<CatalogCache>) -> Self {
        Self { repo, catalog }
    }

    /// Match the employee's total sales of the month before `month` against
    /// the tier catalog. No history resolves to the fallback tier.
    ///
    /// # Errors
    /// Returns an error if the catalog is misconfigured or a query fails.
    pub async fn resolve_tier(
        &self,
        employee_id: EmployeeId,
        month: YearMonth,
    ) -> Result<ResolvedTier, SettlementError> {
        let snapshot = self.catalog.snapshot().await?;
        let mut conn = self.repo.pool().acquire().await?;
        self.resolve_with(&mut conn, &snapshot, employee_id, month).await
    }

    async fn resolve_with(
        &self,
        conn: &mut SqliteConnection,
        snapshot: &CatalogSnapshot,
        employee_id: EmployeeId,
        month: YearMonth,
    ) -> Result<ResolvedTier, SettlementError> {
        let previous_month_sales = self
            .repo
            .month_sales(conn, employee_id, month.previous())
            .await?;
        let tier = snapshot.tiers.resolve(previous_month_sales).clone();

        Ok(ResolvedTier {
            month,
            previous_month_sales,
            tier,
        })
    }

    /// The tier a shift in `month` settles at. The stored tier is reused
    /// while it is current; otherwise the tier is resolved and persisted on
    /// `conn`, so it changes at most once per month. Every read runs on
    /// `conn` as well.
    ///
    /// # Errors
    /// Returns an error if a query or the tier update fails.
    pub async fn tier_for_shift(
        &self,
        conn: &mut SqliteConnection,
        employee: &Employee,
        month: YearMonth,
        snapshot: &CatalogSnapshot,
    ) -> Result<CommissionTier, SettlementError> {
        if !employee.needs_tier_refresh(month) {
            if let Some(tier) = employee.tier_id.and_then(|id| snapshot.tiers.by_id(id)) {
                return Ok(tier.clone());
            }
        }

        let resolved = self
            .resolve_with(&mut *conn, snapshot, employee.id, month)
            .await?;
        self.repo
            .set_employee_tier(conn, employee.id, resolved.tier.id, month)
            .await?;

        info!(
            employee_id = %employee.id,
            month = %month,
            tier = %resolved.tier.name,
            previous_month_sales = %resolved.previous_month_sales,
            "Resolved monthly tier"
        );

        Ok(resolved.tier)
    }

    /// Re-resolve every active employee's tier for `month`.
    ///
    /// # Errors
    /// Returns an error if the catalog is misconfigured or a query fails.
    pub async fn refresh_all(&self, month: YearMonth) -> Result<Vec<TierRefresh>, SettlementError> {
        let snapshot = self.catalog.snapshot().await?;
        let employees = self.repo.list_active_employees().await?;
        let mut conn = self.repo.pool().acquire().await?;
        let mut refreshed = Vec::with_capacity(employees.len());

        for employee in employees {
            let previous_tier = employee
                .tier_id
                .and_then(|id| snapshot.tiers.by_id(id))
                .map(|tier| tier.name.clone());
            let resolved = self
                .resolve_with(&mut conn, &snapshot, employee.id, month)
                .await?;
            self.repo
                .set_employee_tier(&mut conn, employee.id, resolved.tier.id, month)
                .await?;

            let outcome = TierRefresh {
                employee_id: employee.id,
                previous_tier,
                tier: resolved.tier,
                previous_month_sales: resolved.previous_month_sales,
            };
            if outcome.changed() {
                info!(
                    employee_id = %outcome.employee_id,
                    from = outcome.previous_tier.as_deref().unwrap_or("-"),
                    to = %outcome.tier.name,
                    "Tier changed"
                );
            }
            refreshed.push(outcome);
        }

        info!(month = %month, employees = refreshed.len(), "Monthly tier refresh complete");
        Ok(refreshed)
    }
}
