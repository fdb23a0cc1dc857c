//! Bonus grants and their one-shot consumption.

use crate::db::Repository;
use crate::domain::{
    ActiveBonus, BonusId, BonusKind, BonusState, Decimal, EmployeeId, ShiftId, MAX_BONUS_VALUE,
};
use chrono::NaiveDateTime;
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;
use tracing::{info, warn};

use super::SettlementError;

#[derive(Debug)]
pub struct BonusLedger {
    repo: Arc<Repository>,
}

impl BonusLedger {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// Record a pending bonus for the employee's next settled shift.
    ///
    /// # Errors
    /// Rejects negative or oversized values; returns an error if the insert
    /// fails.
    pub async fn grant(
        &self,
        employee_id: EmployeeId,
        kind: BonusKind,
        value: Decimal,
    ) -> Result<BonusId, SettlementError> {
        let mut conn = self.repo.pool().acquire().await?;
        self.grant_in(&mut conn, employee_id, kind, value).await
    }

    /// [`grant`](Self::grant) on the caller's connection, so the bonus
    /// commits or rolls back with the caller's transaction.
    ///
    /// # Errors
    /// Rejects negative or oversized values; returns an error if the insert
    /// fails.
    pub async fn grant_in(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        kind: BonusKind,
        value: Decimal,
    ) -> Result<BonusId, SettlementError> {
        if value.is_negative() {
            return Err(SettlementError::InvalidRequest(format!(
                "bonus value must not be negative: {}",
                value
            )));
        }
        if value > MAX_BONUS_VALUE {
            return Err(SettlementError::InvalidRequest(format!(
                "bonus value {} exceeds the maximum of {}",
                value, MAX_BONUS_VALUE
            )));
        }

        let id = self
            .repo
            .insert_bonus(conn, employee_id, kind, value, chrono::Utc::now().naive_utc())
            .await?;
        info!(employee_id = %employee_id, bonus_id = %id, kind = %kind, value = %value, "Granted bonus");
        Ok(id)
    }

    /// Grant from a compact code such as `flat_10`. Codes without a
    /// settlement effect are logged and skipped.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn grant_code(
        &self,
        employee_id: EmployeeId,
        code: &str,
    ) -> Result<Option<BonusId>, SettlementError> {
        match BonusKind::parse_code(code) {
            Some((kind, value)) => self.grant(employee_id, kind, value).await.map(Some),
            None => {
                warn!(employee_id = %employee_id, code, "Unknown bonus code, skipping");
                Ok(None)
            }
        }
    }

    /// Pending bonuses in the order they will be consumed.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn pending(&self, employee_id: EmployeeId) -> Result<Vec<ActiveBonus>, sqlx::Error> {
        let mut conn = self.repo.pool().acquire().await?;
        self.repo.pending_bonuses(&mut conn, employee_id).await
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list(&self, employee_id: EmployeeId) -> Result<Vec<ActiveBonus>, sqlx::Error> {
        self.repo.list_bonuses(employee_id).await
    }

    /// Link a bonus to a shift of the same employee. Applying an already
    /// applied bonus is a no-op returning `false`.
    ///
    /// # Errors
    /// Returns `BonusNotFound`/`ShiftNotFound` for unknown ids and
    /// `InvalidRequest` when the shift belongs to another employee.
    pub async fn apply(&self, bonus_id: BonusId, shift_id: ShiftId) -> Result<bool, SettlementError> {
        let bonus = self
            .repo
            .get_bonus(bonus_id)
            .await?
            .ok_or(SettlementError::BonusNotFound(bonus_id))?;

        if let BonusState::Applied { shift_id: applied_to, .. } = bonus.state {
            if applied_to != shift_id {
                warn!(
                    bonus_id = %bonus_id,
                    applied_to = %applied_to,
                    requested = %shift_id,
                    "Bonus already applied to another shift"
                );
            }
            return Ok(false);
        }

        let shift = self
            .repo
            .get_shift(shift_id)
            .await?
            .ok_or(SettlementError::ShiftNotFound(shift_id))?;
        if shift.employee_id != bonus.employee_id {
            return Err(SettlementError::InvalidRequest(format!(
                "bonus {} belongs to employee {}, shift {} to employee {}",
                bonus_id, bonus.employee_id, shift_id, shift.employee_id
            )));
        }

        let mut conn = self.repo.pool().acquire().await?;
        let applied = self
            .repo
            .mark_bonus_applied(&mut conn, bonus_id, shift_id, chrono::Utc::now().naive_utc())
            .await?;
        if applied {
            info!(bonus_id = %bonus_id, shift_id = %shift_id, "Applied bonus");
        }
        Ok(applied)
    }

    /// Mark `bonus_ids` applied to `shift_id` on the settlement transaction.
    /// A bonus that is no longer pending aborts the settlement.
    ///
    /// # Errors
    /// Returns `BonusConflict` if any bonus was consumed elsewhere.
    pub async fn consume(
        &self,
        conn: &mut SqliteConnection,
        bonus_ids: &[BonusId],
        shift_id: ShiftId,
        applied_at: NaiveDateTime,
    ) -> Result<(), SettlementError> {
        for id in bonus_ids {
            if !self
                .repo
                .mark_bonus_applied(&mut *conn, *id, shift_id, applied_at)
                .await?
            {
                return Err(SettlementError::BonusConflict(*id));
            }
        }
        if !bonus_ids.is_empty() {
            info!(shift_id = %shift_id, count = bonus_ids.len(), "Consumed pending bonuses");
        }
        Ok(())
    }
}
