//! Semi-monthly payroll aggregation.

use crate::db::Repository;
use crate::domain::{Decimal, EmployeeId, FortnightPeriod, FortnightSettlement, YearMonth};
use crate::engine::fold_period;
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;
use tracing::info;

use super::SettlementError;

const EXPORT_HEADER: [&str; 15] = [
    "employee_id",
    "year",
    "month",
    "fortnight",
    "shift_count",
    "worked_hours",
    "total_sales",
    "total_commissions",
    "total_hourly_pay",
    "total_made",
    "performance_count",
    "bonus_amount",
    "total_salary",
    "payment_date",
    "is_paid",
];

pub struct FortnightAggregator {
    repo: Arc<Repository>,
    bonus_rate: Decimal,
}

impl FortnightAggregator {
    pub fn new(repo: Arc<Repository>, bonus_rate: Decimal) -> Self {
        Self { repo, bonus_rate }
    }

    /// Rebuild the stored totals of one period from its shifts.
    ///
    /// # Errors
    /// Returns an error if a query or the upsert fails.
    pub async fn recompute(
        &self,
        employee_id: EmployeeId,
        period: FortnightPeriod,
    ) -> Result<FortnightSettlement, SettlementError> {
        let mut tx = self.repo.begin().await?;
        self.repo.lock_employee_row(&mut tx, employee_id).await?;
        let settlement = self.recompute_in(&mut tx, employee_id, period).await?;
        tx.commit().await?;
        Ok(settlement)
    }

    /// [`recompute`](Self::recompute) on the caller's transaction, so the
    /// totals see the shift written in the same transaction.
    ///
    /// # Errors
    /// Returns an error if a query or the upsert fails.
    pub async fn recompute_in(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        period: FortnightPeriod,
    ) -> Result<FortnightSettlement, SettlementError> {
        let shifts = self
            .repo
            .period_shifts(&mut *conn, employee_id, period.start(), period.end())
            .await?;
        let is_paid = self
            .repo
            .fortnight_is_paid(&mut *conn, employee_id, period)
            .await?;
        let settlement = fold_period(employee_id, period, &shifts, self.bonus_rate, is_paid)?;
        self.repo.upsert_fortnight(&mut *conn, &settlement).await?;

        info!(
            employee_id = %employee_id,
            month = %period.month,
            fortnight = period.fortnight,
            shifts = settlement.shift_count,
            total_salary = %settlement.total_salary,
            "Recomputed fortnight"
        );

        Ok(settlement)
    }

    /// Recompute every (employee, period) that has at least one shift.
    ///
    /// # Errors
    /// Returns an error if a query or upsert fails.
    pub async fn backfill(&self) -> Result<Vec<FortnightSettlement>, SettlementError> {
        let mut periods: Vec<(EmployeeId, FortnightPeriod)> = self
            .repo
            .shift_dates()
            .await?
            .into_iter()
            .map(|(employee_id, date)| (employee_id, FortnightPeriod::containing(date)))
            .collect();
        periods.dedup();

        let mut settlements = Vec::with_capacity(periods.len());
        for (employee_id, period) in periods {
            settlements.push(self.recompute(employee_id, period).await?);
        }

        info!(periods = settlements.len(), "Fortnight backfill complete");
        Ok(settlements)
    }

    /// Flip the paid flag of a stored period.
    ///
    /// # Errors
    /// Returns `FortnightNotFound` if the period was never computed.
    pub async fn mark_paid(
        &self,
        employee_id: EmployeeId,
        period: FortnightPeriod,
        paid: bool,
    ) -> Result<FortnightSettlement, SettlementError> {
        let not_found = || SettlementError::FortnightNotFound {
            employee_id,
            month: period.month,
            fortnight: period.fortnight,
        };

        if !self.repo.set_fortnight_paid(employee_id, period, paid).await? {
            return Err(not_found());
        }
        info!(employee_id = %employee_id, month = %period.month, fortnight = period.fortnight, paid, "Updated fortnight paid flag");

        self.repo
            .get_fortnight(employee_id, period)
            .await?
            .ok_or_else(not_found)
    }

    /// Stored fortnights of `month` as CSV with a header row.
    ///
    /// # Errors
    /// Returns an error if the query or CSV encoding fails.
    pub async fn export_csv(&self, month: YearMonth) -> Result<String, SettlementError> {
        let settlements = self.repo.list_fortnights(month).await?;

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(EXPORT_HEADER).map_err(export_error)?;
        for s in &settlements {
            writer
                .write_record([
                    s.employee_id.to_string(),
                    s.period.month.year.to_string(),
                    s.period.month.month.to_string(),
                    s.period.fortnight.to_string(),
                    s.shift_count.to_string(),
                    s.worked_hours.to_money_string(),
                    s.total_sales.to_money_string(),
                    s.total_commissions.to_money_string(),
                    s.total_hourly_pay.to_money_string(),
                    s.total_made.to_money_string(),
                    s.performance_count.to_string(),
                    s.bonus_amount.to_money_string(),
                    s.total_salary.to_money_string(),
                    s.payment_date.format(crate::domain::DATE_FORMAT).to_string(),
                    s.is_paid.to_string(),
                ])
                .map_err(export_error)?;
        }

        let bytes = writer.into_inner().map_err(export_error)?;
        String::from_utf8(bytes).map_err(export_error)
    }
}

fn export_error(err: impl std::fmt::Display) -> SettlementError {
    SettlementError::Export(err.to_string())
}
