//! Active bonus operations for the repository.

use crate::domain::{ActiveBonus, BonusId, BonusKind, BonusState, Decimal, EmployeeId, ShiftId};
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

use super::{datetime_col, decimal_col, format_datetime, parse_datetime, Repository};

impl Repository {
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_bonus(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        kind: BonusKind,
        value: Decimal,
        created_at: NaiveDateTime,
    ) -> Result<BonusId, sqlx::Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO active_bonuses (employee_id, kind, value, applied, created_at)
            VALUES (?, ?, ?, 0, ?)
            "#,
        )
        .bind(employee_id.as_i64())
        .bind(kind.as_str())
        .bind(value.to_canonical_string())
        .bind(format_datetime(created_at))
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        Ok(BonusId::new(id))
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_bonus(&self, id: BonusId) -> Result<Option<ActiveBonus>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT id, employee_id, kind, value, applied, shift_id, applied_at, created_at
            FROM active_bonuses
            WHERE id = ?
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => bonus_from_row(&row),
            None => Ok(None),
        }
    }

    /// All of an employee's bonuses, pending and applied, in creation order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_bonuses(&self, employee_id: EmployeeId) -> Result<Vec<ActiveBonus>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, employee_id, kind, value, applied, shift_id, applied_at, created_at
            FROM active_bonuses
            WHERE employee_id = ?
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(employee_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        collect_bonuses(&rows)
    }

    /// Unapplied bonuses in creation order, read on the caller's connection.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn pending_bonuses(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
    ) -> Result<Vec<ActiveBonus>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, employee_id, kind, value, applied, shift_id, applied_at, created_at
            FROM active_bonuses
            WHERE employee_id = ? AND applied = 0
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(employee_id.as_i64())
        .fetch_all(&mut *conn)
        .await?;

        collect_bonuses(&rows)
    }

    /// Compare-and-set `pending -> applied(shift_id)`.
    ///
    /// Returns `false` when the bonus was already applied (or does not
    /// exist); the row is never touched twice.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_bonus_applied(
        &self,
        conn: &mut SqliteConnection,
        id: BonusId,
        shift_id: ShiftId,
        applied_at: NaiveDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE active_bonuses
            SET applied = 1, shift_id = ?, applied_at = ?
            WHERE id = ? AND applied = 0
            "#,
        )
        .bind(shift_id.as_i64())
        .bind(format_datetime(applied_at))
        .bind(id.as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

fn collect_bonuses(rows: &[SqliteRow]) -> Result<Vec<ActiveBonus>, sqlx::Error> {
    let mut bonuses = Vec::with_capacity(rows.len());
    for row in rows {
        if let Some(bonus) = bonus_from_row(row)? {
            bonuses.push(bonus);
        }
    }
    Ok(bonuses)
}

/// Rows with an unknown kind are logged and skipped.
fn bonus_from_row(row: &SqliteRow) -> Result<Option<ActiveBonus>, sqlx::Error> {
    let id: i64 = row.get("id");
    let kind_str: String = row.get("kind");
    let kind = match BonusKind::from_str(&kind_str) {
        Ok(kind) => kind,
        Err(e) => {
            warn!(bonus_id = id, kind = %kind_str, error = %e, "Skipping bonus with unknown kind");
            return Ok(None);
        }
    };

    let applied: bool = row.get("applied");
    let state = if applied {
        let shift_id: Option<i64> = row.get("shift_id");
        let applied_at: Option<String> = row.get("applied_at");
        match (shift_id, applied_at) {
            (Some(shift_id), Some(applied_at)) => BonusState::Applied {
                shift_id: ShiftId::new(shift_id),
                applied_at: parse_datetime(&applied_at)?,
            },
            _ => {
                warn!(bonus_id = id, "Applied bonus without shift link; treating as consumed");
                BonusState::Applied {
                    shift_id: ShiftId::new(shift_id.unwrap_or_default()),
                    applied_at: datetime_col(row, "created_at")?,
                }
            }
        }
    } else {
        BonusState::Pending
    };

    Ok(Some(ActiveBonus {
        id: BonusId::new(id),
        employee_id: EmployeeId::new(row.get("employee_id")),
        kind,
        value: decimal_col(row, "value"),
        state,
        created_at: datetime_col(row, "created_at")?,
    }))
}
