//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `shifts.rs` - Settled shifts, product lines and history queries
//! - `bonuses.rs` - Active bonus grants and their consumption
//! - `catalog.rs` - Commission tiers, dynamic rates, ranks and reward pools
//! - `ranks.rs` - Employee rank records and the coin ledger
//! - `fortnights.rs` - Fortnight payroll totals
//!
//! Methods taking a `&mut SqliteConnection` run on the caller's transaction.

mod bonuses;
mod catalog;
mod fortnights;
mod ranks;
mod shifts;

use crate::domain::{Decimal, Employee, EmployeeId, YearMonth, CLOCK_FORMAT, DATE_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{Sqlite, Transaction};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
#[derive(Debug)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Start a transaction. Callers should issue a write first so the
    /// transaction takes the write lock before reading.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    // =========================================================================
    // Employee operations
    // =========================================================================

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_employee(&self, id: EmployeeId) -> Result<Option<Employee>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, name, hourly_wage, base_commission_pct, tier_id, tier_month, is_active
            FROM employees
            WHERE id = ?
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(employee_from_row))
    }

    /// Insert or replace an employee's profile. Tier assignment is kept.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_employee(&self, employee: &Employee) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO employees (id, name, hourly_wage, base_commission_pct, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                hourly_wage = excluded.hourly_wage,
                base_commission_pct = excluded.base_commission_pct,
                is_active = excluded.is_active
            "#,
        )
        .bind(employee.id.as_i64())
        .bind(employee.name.as_str())
        .bind(employee.hourly_wage.to_canonical_string())
        .bind(employee.base_commission_pct.to_canonical_string())
        .bind(employee.is_active)
        .bind(now_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load the employee, provisioning defaults on first sight.
    ///
    /// This is a write, so it is safe as the first statement of a settlement
    /// transaction.
    ///
    /// # Errors
    /// Returns an error if the insert or select fails.
    pub async fn ensure_employee(
        &self,
        conn: &mut SqliteConnection,
        id: EmployeeId,
        name: &str,
        default_hourly_wage: Decimal,
        default_base_pct: Decimal,
    ) -> Result<Employee, sqlx::Error> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO employees (id, name, hourly_wage, base_commission_pct, is_active, created_at)
            VALUES (?, ?, ?, ?, 1, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(id.as_i64())
        .bind(name)
        .bind(default_hourly_wage.to_canonical_string())
        .bind(default_base_pct.to_canonical_string())
        .bind(now_string())
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if inserted > 0 {
            tracing::info!(employee_id = %id, name, "Provisioned employee with defaults");
        }

        let row = sqlx::query(
            r#"
            SELECT id, name, hourly_wage, base_commission_pct, tier_id, tier_month, is_active
            FROM employees
            WHERE id = ?
            "#,
        )
        .bind(id.as_i64())
        .fetch_one(&mut *conn)
        .await?;

        Ok(employee_from_row(&row))
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_active_employees(&self) -> Result<Vec<Employee>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, hourly_wage, base_commission_pct, tier_id, tier_month, is_active
            FROM employees
            WHERE is_active = 1
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(employee_from_row).collect())
    }

    /// Record the tier assigned to an employee for `month`.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_employee_tier(
        &self,
        conn: &mut SqliteConnection,
        id: EmployeeId,
        tier_id: i64,
        month: YearMonth,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE employees SET tier_id = ?, tier_month = ? WHERE id = ?")
            .bind(tier_id)
            .bind(month.to_string())
            .bind(id.as_i64())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// No-op write on the employee row. Issued first in a transaction, it
    /// takes SQLite's write lock so later reads cannot go stale.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn lock_employee_row(
        &self,
        conn: &mut SqliteConnection,
        id: EmployeeId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE employees SET is_active = is_active WHERE id = ?")
            .bind(id.as_i64())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

fn employee_from_row(row: &SqliteRow) -> Employee {
    let id: i64 = row.get("id");
    let tier_month: Option<String> = row.get("tier_month");
    let tier_month = tier_month.and_then(|s| match YearMonth::from_str(&s) {
        Ok(month) => Some(month),
        Err(e) => {
            warn!(employee_id = id, value = %s, error = %e, "Failed to parse tier month, ignoring");
            None
        }
    });

    Employee {
        id: EmployeeId::new(id),
        name: row.get("name"),
        hourly_wage: decimal_col(row, "hourly_wage"),
        base_commission_pct: decimal_col(row, "base_commission_pct"),
        tier_id: row.get("tier_id"),
        tier_month,
        is_active: row.get("is_active"),
    }
}

/// Read a decimal TEXT column, defaulting to zero on corrupt data.
pub(crate) fn decimal_col(row: &SqliteRow, column: &str) -> Decimal {
    let raw: String = row.get(column);
    Decimal::from_str(&raw).unwrap_or_else(|e| {
        warn!(
            column,
            value = %raw,
            error = %e,
            "Failed to parse stored decimal, using default"
        );
        Decimal::default()
    })
}

pub(crate) fn date_col(row: &SqliteRow, column: &str) -> Result<NaiveDate, sqlx::Error> {
    let raw: String = row.get(column);
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn datetime_col(row: &SqliteRow, column: &str) -> Result<NaiveDateTime, sqlx::Error> {
    let raw: String = row.get(column);
    parse_datetime(&raw)
}

pub(crate) fn parse_datetime(raw: &str) -> Result<NaiveDateTime, sqlx::Error> {
    NaiveDateTime::parse_from_str(raw, CLOCK_FORMAT).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

pub(crate) fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub(crate) fn format_datetime(at: NaiveDateTime) -> String {
    at.format(CLOCK_FORMAT).to_string()
}

pub(crate) fn now_string() -> String {
    format_datetime(chrono::Utc::now().naive_utc())
}
