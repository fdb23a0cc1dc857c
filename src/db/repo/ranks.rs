//! Employee rank records and the coin ledger.

use crate::domain::{Decimal, EmployeeId, EmployeeRankRecord, YearMonth};
use sqlx::sqlite::SqliteConnection;
use sqlx::Row;

use super::{decimal_col, now_string, Repository};

impl Repository {
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_rank_record(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        month: YearMonth,
    ) -> Result<Option<EmployeeRankRecord>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT current_rank, previous_rank, total_sales, notified
            FROM employee_ranks
            WHERE employee_id = ? AND year = ? AND month = ?
            "#,
        )
        .bind(employee_id.as_i64())
        .bind(month.year)
        .bind(month.month)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|r| EmployeeRankRecord {
            employee_id,
            month,
            current_rank: r.get("current_rank"),
            previous_rank: r.get("previous_rank"),
            total_sales: decimal_col(&r, "total_sales"),
            notified: r.get("notified"),
        }))
    }

    /// Replace the employee's record for the record's month.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_rank_record(
        &self,
        conn: &mut SqliteConnection,
        record: &EmployeeRankRecord,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO employee_ranks (
                employee_id, year, month, current_rank, previous_rank, total_sales, notified, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(employee_id, year, month) DO UPDATE SET
                current_rank = excluded.current_rank,
                previous_rank = excluded.previous_rank,
                total_sales = excluded.total_sales,
                notified = excluded.notified,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.employee_id.as_i64())
        .bind(record.month.year)
        .bind(record.month.month)
        .bind(record.current_rank.as_str())
        .bind(record.previous_rank.as_deref())
        .bind(record.total_sales.to_canonical_string())
        .bind(record.notified)
        .bind(now_string())
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_rank_notified(
        &self,
        employee_id: EmployeeId,
        month: YearMonth,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE employee_ranks SET notified = 1 WHERE employee_id = ? AND year = ? AND month = ?",
        )
        .bind(employee_id.as_i64())
        .bind(month.year)
        .bind(month.month)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Coin ledger
    // =========================================================================

    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_coin_transaction(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        amount: i64,
        kind: &str,
        description: &str,
        rank: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO coin_transactions (employee_id, amount, kind, description, rank, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(employee_id.as_i64())
        .bind(amount)
        .bind(kind)
        .bind(description)
        .bind(rank)
        .bind(now_string())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn coin_balance(&self, employee_id: EmployeeId) -> Result<i64, sqlx::Error> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0) AS balance FROM coin_transactions WHERE employee_id = ?",
        )
        .bind(employee_id.as_i64())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("balance"))
    }

    /// Sum of the employee's `total_sales` over a calendar month.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn month_sales(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        month: YearMonth,
    ) -> Result<Decimal, sqlx::Error> {
        let sales = self
            .sales_between(conn, employee_id, month.first_day(), month.next().first_day())
            .await?;
        Ok(sales.into_iter().sum())
    }
}
