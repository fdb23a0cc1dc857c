//! Fortnight payroll totals.

use crate::domain::{EmployeeId, FortnightPeriod, FortnightSettlement, YearMonth};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;

use super::{date_col, decimal_col, format_date, now_string, Repository};

impl Repository {
    /// Replace the stored totals of a period. `is_paid` is never changed here.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_fortnight(
        &self,
        conn: &mut SqliteConnection,
        settlement: &FortnightSettlement,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO employee_fortnights (
                employee_id, year, month, fortnight, shift_count, worked_hours, total_sales,
                total_commissions, total_hourly_pay, total_made, performance_count,
                bonus_amount, total_salary, payment_date, is_paid, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)
            ON CONFLICT(employee_id, year, month, fortnight) DO UPDATE SET
                shift_count = excluded.shift_count,
                worked_hours = excluded.worked_hours,
                total_sales = excluded.total_sales,
                total_commissions = excluded.total_commissions,
                total_hourly_pay = excluded.total_hourly_pay,
                total_made = excluded.total_made,
                performance_count = excluded.performance_count,
                bonus_amount = excluded.bonus_amount,
                total_salary = excluded.total_salary,
                payment_date = excluded.payment_date,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(settlement.employee_id.as_i64())
        .bind(settlement.period.month.year)
        .bind(settlement.period.month.month)
        .bind(settlement.period.fortnight)
        .bind(settlement.shift_count)
        .bind(settlement.worked_hours.to_canonical_string())
        .bind(settlement.total_sales.to_canonical_string())
        .bind(settlement.total_commissions.to_canonical_string())
        .bind(settlement.total_hourly_pay.to_canonical_string())
        .bind(settlement.total_made.to_canonical_string())
        .bind(settlement.performance_count)
        .bind(settlement.bonus_amount.to_canonical_string())
        .bind(settlement.total_salary.to_canonical_string())
        .bind(format_date(settlement.payment_date))
        .bind(now_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn fortnight_is_paid(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        period: FortnightPeriod,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT is_paid FROM employee_fortnights
            WHERE employee_id = ? AND year = ? AND month = ? AND fortnight = ?
            "#,
        )
        .bind(employee_id.as_i64())
        .bind(period.month.year)
        .bind(period.month.month)
        .bind(period.fortnight)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|r| r.get::<bool, _>("is_paid")).unwrap_or(false))
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_fortnight(
        &self,
        employee_id: EmployeeId,
        period: FortnightPeriod,
    ) -> Result<Option<FortnightSettlement>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT * FROM employee_fortnights
            WHERE employee_id = ? AND year = ? AND month = ? AND fortnight = ?
            "#,
        )
        .bind(employee_id.as_i64())
        .bind(period.month.year)
        .bind(period.month.month)
        .bind(period.fortnight)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(fortnight_from_row).transpose()
    }

    /// Every stored fortnight of a month, ordered by employee then fortnight.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_fortnights(
        &self,
        month: YearMonth,
    ) -> Result<Vec<FortnightSettlement>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM employee_fortnights
            WHERE year = ? AND month = ?
            ORDER BY employee_id ASC, fortnight ASC
            "#,
        )
        .bind(month.year)
        .bind(month.month)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(fortnight_from_row).collect()
    }

    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_fortnight_paid(
        &self,
        employee_id: EmployeeId,
        period: FortnightPeriod,
        paid: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE employee_fortnights SET is_paid = ?, updated_at = ?
            WHERE employee_id = ? AND year = ? AND month = ? AND fortnight = ?
            "#,
        )
        .bind(paid)
        .bind(now_string())
        .bind(employee_id.as_i64())
        .bind(period.month.year)
        .bind(period.month.month)
        .bind(period.fortnight)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn fortnight_from_row(row: &SqliteRow) -> Result<FortnightSettlement, sqlx::Error> {
    let month = YearMonth::new(row.get("year"), row.get("month"))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let period = FortnightPeriod::new(month, row.get("fortnight"))
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(FortnightSettlement {
        employee_id: EmployeeId::new(row.get("employee_id")),
        period,
        shift_count: row.get("shift_count"),
        worked_hours: decimal_col(row, "worked_hours"),
        total_sales: decimal_col(row, "total_sales"),
        total_commissions: decimal_col(row, "total_commissions"),
        total_hourly_pay: decimal_col(row, "total_hourly_pay"),
        total_made: decimal_col(row, "total_made"),
        performance_count: row.get("performance_count"),
        bonus_amount: decimal_col(row, "bonus_amount"),
        total_salary: decimal_col(row, "total_salary"),
        payment_date: date_col(row, "payment_date")?,
        is_paid: row.get("is_paid"),
    })
}
