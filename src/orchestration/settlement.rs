//! Shift settlement: the per-shift pipeline from raw sales to a paycheck line.
//!
//! Every write path (settle, close, correct) runs under the employee's lock
//! and inside one SQLite transaction whose first statement is a write, so
//! the shift row, bonus consumption and fortnight totals commit together.

use crate::catalog::{CatalogCache, CatalogSnapshot};
use crate::config::{CommissionMode, Config};
use crate::db::Repository;
use crate::domain::{
    ActiveBonus, BonusId, BonusKind, Decimal, Employee, EmployeeId, FortnightPeriod,
    FortnightSettlement, Product, SettledShift, ShiftId, ShiftInput, ShiftInputError, YearMonth,
    MAX_SHIFT_SALES,
};
use crate::engine::{
    fold_bonuses, resolve_percent_all, resolve_percent_prev, worked_hours, AmountOverflow,
    BonusFold, Earnings, PeerShift, DEFAULT_BASE_COMMISSION_PCT,
};
use chrono::NaiveDateTime;
use sqlx::sqlite::SqliteConnection;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::info;

use super::{
    BonusLedger, EmployeeLocks, FortnightAggregator, RollingPerformanceTracker, SettlementError,
    SharedRng, TierResolver,
};

/// Tier label recorded on shifts settled in dynamic-rate mode.
pub const DYNAMIC_TIER_NAME: &str = "Dynamic";

/// A persisted shift together with its refreshed fortnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub shift: SettledShift,
    pub fortnight: FortnightSettlement,
    /// `true` when a known `request_id` returned the stored shift.
    pub replayed: bool,
}

pub struct ShiftSettlementEngine {
    repo: Arc<Repository>,
    catalog: Arc<CatalogCache>,
    tiers: Arc<TierResolver>,
    rolling: Arc<RollingPerformanceTracker>,
    ledger: Arc<BonusLedger>,
    fortnights: Arc<FortnightAggregator>,
    locks: EmployeeLocks,
    rng: SharedRng,
    config: Config,
}

impl ShiftSettlementEngine {
    pub fn new(
        repo: Arc<Repository>,
        catalog: Arc<CatalogCache>,
        rng: SharedRng,
        config: Config,
    ) -> Self {
        Self {
            tiers: Arc::new(TierResolver::new(repo.clone(), catalog.clone())),
            rolling: Arc::new(RollingPerformanceTracker::new(repo.clone())),
            ledger: Arc::new(BonusLedger::new(repo.clone())),
            fortnights: Arc::new(FortnightAggregator::new(
                repo.clone(),
                config.fortnight_bonus_rate,
            )),
            locks: EmployeeLocks::new(),
            repo,
            catalog,
            rng,
            config,
        }
    }

    pub fn tiers(&self) -> &Arc<TierResolver> {
        &self.tiers
    }

    pub fn ledger(&self) -> &Arc<BonusLedger> {
        &self.ledger
    }

    pub fn fortnights(&self) -> &Arc<FortnightAggregator> {
        &self.fortnights
    }

    /// Settle and persist a shift.
    ///
    /// Closed shifts consume every pending bonus of the employee; open
    /// shifts settle at the base percentage with no hourly pay and leave
    /// bonuses pending until [`close_shift`](Self::close_shift).
    ///
    /// # Errors
    /// Returns `InvalidInput` for malformed input; any other failure rolls
    /// the whole settlement back.
    pub async fn settle(&self, input: ShiftInput) -> Result<Settlement, SettlementError> {
        input.validate()?;
        let _guard = self.locks.acquire(input.employee_id).await;
        let snapshot = self.catalog.snapshot().await?;

        let mut tx = self.repo.begin().await?;
        let employee = self
            .repo
            .ensure_employee(
                &mut tx,
                input.employee_id,
                &input.employee_name,
                self.config.default_hourly_wage,
                Decimal::from_int(DEFAULT_BASE_COMMISSION_PCT),
            )
            .await?;

        if let Some(request_id) = input.request_id {
            if let Some(existing) = self.repo.shift_id_by_request(&mut tx, request_id).await? {
                let shift = self
                    .repo
                    .get_shift_in(&mut tx, existing)
                    .await?
                    .ok_or(SettlementError::ShiftNotFound(existing))?;
                let fortnight = self
                    .fortnights
                    .recompute_in(&mut tx, shift.employee_id, FortnightPeriod::containing(shift.date))
                    .await?;
                tx.commit().await?;
                info!(shift_id = %shift.id, request_id = %request_id, "Replayed settlement");
                return Ok(Settlement {
                    shift,
                    fortnight,
                    replayed: true,
                });
            }
        }

        let date = input.shift_date();
        let total_sales = input.total_sales();
        let (tier_name, base_pct) = self
            .base_commission(&mut tx, &employee, YearMonth::of(date), total_sales, &snapshot)
            .await?;

        let fold = if input.clock_out.is_some() {
            self.fold_pending(&mut tx, employee.id, input.clock_in, &input.models(), base_pct)
                .await?
        } else {
            BonusFold::base(base_pct)
        };

        let window = self.rolling.rolling_window(&mut tx, employee.id, date).await?;
        let hours = worked_hours(input.clock_in, input.clock_out);
        let earnings = Earnings::compute(
            total_sales,
            fold.commission_pct,
            hours,
            employee.hourly_wage,
            fold.flat_bonus_total,
        )?;

        let mut shift = SettledShift {
            id: ShiftId::new(0),
            employee_id: employee.id,
            employee_name: input.employee_name.clone(),
            date,
            clock_in: input.clock_in,
            clock_out: input.clock_out,
            product_sales: input.product_sales.clone(),
            worked_hours: earnings.worked_hours,
            total_sales: earnings.total_sales,
            net_sales: earnings.net_sales,
            tier_name,
            base_commission_pct: fold.base_pct,
            bonus_pct: fold.bonus_pct(),
            commission_pct: fold.commission_pct,
            flat_bonus_total: fold.flat_bonus_total.round_money(),
            commissions: earnings.commissions,
            hourly_pay: earnings.hourly_pay,
            total_made: earnings.total_made,
            rolling_average: window.average,
            performance_flag: self.rolling.performance_flag(earnings.total_sales, &window),
            applied_bonus_ids: fold.applied.clone(),
        };

        shift.id = self
            .repo
            .insert_shift(&mut tx, &shift, input.request_id)
            .await?;
        self.ledger
            .consume(&mut tx, &fold.applied, shift.id, now())
            .await?;
        let fortnight = self
            .fortnights
            .recompute_in(&mut tx, employee.id, FortnightPeriod::containing(date))
            .await?;
        tx.commit().await?;

        info!(
            shift_id = %shift.id,
            employee_id = %shift.employee_id,
            open = shift.is_open(),
            total_sales = %shift.total_sales,
            commission = %shift.breakdown(),
            total_made = %shift.total_made,
            bonuses = shift.applied_bonus_ids.len(),
            "Settled shift"
        );

        Ok(Settlement {
            shift,
            fortnight,
            replayed: false,
        })
    }

    /// Complete an open shift: hours and hourly pay are computed, pending
    /// bonuses are consumed over the stored base percentage, and derived
    /// fields are refreshed.
    ///
    /// # Errors
    /// Returns `AlreadyClosed` if the shift already has a clock-out.
    pub async fn close_shift(
        &self,
        shift_id: ShiftId,
        clock_out: NaiveDateTime,
    ) -> Result<Settlement, SettlementError> {
        let existing = self
            .repo
            .get_shift(shift_id)
            .await?
            .ok_or(SettlementError::ShiftNotFound(shift_id))?;
        if clock_out < existing.clock_in {
            return Err(ShiftInputError::ClockOutBeforeClockIn {
                clock_in: existing.clock_in,
                clock_out,
            }
            .into());
        }

        let _guard = self.locks.acquire(existing.employee_id).await;
        let mut tx = self.repo.begin().await?;
        if !self.repo.close_shift_clock(&mut tx, shift_id, clock_out).await? {
            return Err(SettlementError::AlreadyClosed(shift_id));
        }
        let mut shift = self
            .repo
            .get_shift_in(&mut tx, shift_id)
            .await?
            .ok_or(SettlementError::ShiftNotFound(shift_id))?;
        let employee = self.employee_of(&mut tx, &shift).await?;

        let fold = self
            .fold_pending(
                &mut tx,
                shift.employee_id,
                shift.clock_in,
                &crate::domain::models_of(&shift.product_sales),
                shift.base_commission_pct,
            )
            .await?;
        let window = self
            .rolling
            .rolling_window(&mut tx, shift.employee_id, shift.date)
            .await?;
        let earnings = Earnings::compute(
            shift.total_sales,
            fold.commission_pct,
            worked_hours(shift.clock_in, Some(clock_out)),
            employee.hourly_wage,
            fold.flat_bonus_total,
        )?;

        shift.clock_out = Some(clock_out);
        shift.worked_hours = earnings.worked_hours;
        shift.net_sales = earnings.net_sales;
        shift.bonus_pct = fold.bonus_pct();
        shift.commission_pct = fold.commission_pct;
        shift.flat_bonus_total = fold.flat_bonus_total.round_money();
        shift.commissions = earnings.commissions;
        shift.hourly_pay = earnings.hourly_pay;
        shift.total_made = earnings.total_made;
        shift.rolling_average = window.average;
        shift.performance_flag = self.rolling.performance_flag(shift.total_sales, &window);
        shift.applied_bonus_ids = fold.applied.clone();

        self.repo.update_shift_settlement(&mut tx, &shift).await?;
        self.ledger
            .consume(&mut tx, &fold.applied, shift.id, now())
            .await?;
        let fortnight = self
            .fortnights
            .recompute_in(&mut tx, shift.employee_id, FortnightPeriod::containing(shift.date))
            .await?;
        tx.commit().await?;

        info!(
            shift_id = %shift.id,
            employee_id = %shift.employee_id,
            worked_hours = %shift.worked_hours,
            commission = %shift.breakdown(),
            total_made = %shift.total_made,
            "Closed shift"
        );

        Ok(Settlement {
            shift,
            fortnight,
            replayed: false,
        })
    }

    /// Replace a shift's total sales after the fact.
    ///
    /// The stored commission percentage and flat bonuses stand; consumed
    /// bonuses are not re-applied. Hours and hourly pay are untouched.
    ///
    /// # Errors
    /// Rejects negative, sub-cent or oversized totals with `InvalidRequest`.
    pub async fn correct_sales(
        &self,
        shift_id: ShiftId,
        total_sales: Decimal,
    ) -> Result<Settlement, SettlementError> {
        if total_sales.is_negative() || total_sales.round_money() != total_sales {
            return Err(SettlementError::InvalidRequest(format!(
                "total sales must be a non-negative amount in cents: {}",
                total_sales
            )));
        }
        if total_sales > MAX_SHIFT_SALES {
            return Err(SettlementError::InvalidRequest(format!(
                "total sales {} exceed the maximum of {}",
                total_sales, MAX_SHIFT_SALES
            )));
        }

        let existing = self
            .repo
            .get_shift(shift_id)
            .await?
            .ok_or(SettlementError::ShiftNotFound(shift_id))?;

        let _guard = self.locks.acquire(existing.employee_id).await;
        let mut tx = self.repo.begin().await?;
        self.repo
            .lock_employee_row(&mut tx, existing.employee_id)
            .await?;
        let mut shift = self
            .repo
            .get_shift_in(&mut tx, shift_id)
            .await?
            .ok_or(SettlementError::ShiftNotFound(shift_id))?;

        let previous_total = shift.total_sales;
        let earnings = Earnings::with_hourly_pay(
            total_sales,
            shift.commission_pct,
            shift.worked_hours,
            shift.hourly_pay,
            shift.flat_bonus_total,
        )?;
        let window = self
            .rolling
            .rolling_window(&mut tx, shift.employee_id, shift.date)
            .await?;

        shift.total_sales = earnings.total_sales;
        shift.net_sales = earnings.net_sales;
        shift.commissions = earnings.commissions;
        shift.total_made = earnings.total_made;
        shift.rolling_average = window.average;
        shift.performance_flag = self.rolling.performance_flag(total_sales, &window);

        self.repo.update_shift_settlement(&mut tx, &shift).await?;
        let fortnight = self
            .fortnights
            .recompute_in(&mut tx, shift.employee_id, FortnightPeriod::containing(shift.date))
            .await?;
        tx.commit().await?;

        info!(
            shift_id = %shift.id,
            employee_id = %shift.employee_id,
            from = %previous_total,
            to = %shift.total_sales,
            total_made = %shift.total_made,
            "Corrected shift sales"
        );

        Ok(Settlement {
            shift,
            fortnight,
            replayed: false,
        })
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_shift(&self, shift_id: ShiftId) -> Result<SettledShift, SettlementError> {
        self.repo
            .get_shift(shift_id)
            .await?
            .ok_or(SettlementError::ShiftNotFound(shift_id))
    }

    /// Tier label and base percentage for a new shift.
    async fn base_commission(
        &self,
        conn: &mut SqliteConnection,
        employee: &Employee,
        month: YearMonth,
        total_sales: Decimal,
        snapshot: &CatalogSnapshot,
    ) -> Result<(String, Decimal), SettlementError> {
        match self.config.commission_mode {
            CommissionMode::Tiered => {
                let tier = self
                    .tiers
                    .tier_for_shift(conn, employee, month, snapshot)
                    .await?;
                Ok((tier.name, tier.percentage))
            }
            CommissionMode::Dynamic => {
                let month_to_date = self
                    .repo
                    .month_sales(conn, employee.id, month)
                    .await?
                    .checked_add(total_sales)
                    .ok_or(AmountOverflow("month-to-date sales"))?;
                let pct = snapshot
                    .dynamic_rates
                    .commission_pct(employee.base_commission_pct, month_to_date);
                Ok((DYNAMIC_TIER_NAME.to_string(), pct))
            }
        }
    }

    async fn employee_of(
        &self,
        conn: &mut SqliteConnection,
        shift: &SettledShift,
    ) -> Result<Employee, SettlementError> {
        Ok(self
            .repo
            .ensure_employee(
                conn,
                shift.employee_id,
                &shift.employee_name,
                self.config.default_hourly_wage,
                Decimal::from_int(DEFAULT_BASE_COMMISSION_PCT),
            )
            .await?)
    }

    /// Fold the employee's pending bonuses over `base_pct`. Pending bonuses
    /// and peer shifts are read on the settlement transaction; peer bonuses
    /// are resolved up front so the shared RNG is only held for the pure
    /// picks.
    async fn fold_pending(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        clock_in: NaiveDateTime,
        models: &BTreeSet<Product>,
        base_pct: Decimal,
    ) -> Result<BonusFold, SettlementError> {
        let pending = self.repo.pending_bonuses(&mut *conn, employee_id).await?;
        if pending.is_empty() {
            return Ok(BonusFold::base(base_pct));
        }

        let prev_candidates: Vec<PeerShift> = if has_kind(&pending, BonusKind::PercentPrev) {
            self.repo
                .latest_peer_shift_sharing(&mut *conn, employee_id, clock_in, models)
                .await?
                .into_iter()
                .collect()
        } else {
            Vec::new()
        };
        let same_day_candidates = if has_kind(&pending, BonusKind::PercentAll) {
            self.repo
                .peer_shifts_on_date(&mut *conn, employee_id, clock_in.date(), clock_in)
                .await?
        } else {
            Vec::new()
        };

        let peer_amounts = self.resolve_peer_bonuses(
            employee_id,
            clock_in,
            models,
            &pending,
            &prev_candidates,
            &same_day_candidates,
        );

        Ok(fold_bonuses(base_pct, &pending, |bonus| {
            peer_amounts.get(&bonus.id).copied().unwrap_or_default()
        })?)
    }

    fn resolve_peer_bonuses(
        &self,
        employee_id: EmployeeId,
        clock_in: NaiveDateTime,
        models: &BTreeSet<Product>,
        pending: &[ActiveBonus],
        prev_candidates: &[PeerShift],
        same_day_candidates: &[PeerShift],
    ) -> HashMap<BonusId, Decimal> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let mut amounts = HashMap::new();

        for bonus in pending {
            let resolved = match bonus.kind {
                BonusKind::PercentPrev => resolve_percent_prev(
                    employee_id,
                    clock_in,
                    models,
                    prev_candidates,
                    bonus.value,
                    &mut *rng,
                ),
                BonusKind::PercentAll => resolve_percent_all(
                    employee_id,
                    clock_in,
                    models,
                    same_day_candidates,
                    bonus.value,
                    &mut *rng,
                ),
                _ => continue,
            };
            info!(
                bonus_id = %bonus.id,
                kind = %bonus.kind,
                model = ?resolved.model.as_ref().map(Product::as_str),
                source_shift = ?resolved.source_shift.map(|id| id.as_i64()),
                amount = %resolved.amount,
                "Resolved peer bonus"
            );
            amounts.insert(bonus.id, resolved.amount);
        }

        amounts
    }
}

fn has_kind(bonuses: &[ActiveBonus], kind: BonusKind) -> bool {
    bonuses.iter().any(|b| b.kind == kind)
}

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BonusState;
    use crate::orchestration::shared_rng;
    use crate::orchestration::test_support::{d, dt, sales, seed_shift, setup_repo};
    use std::time::Duration;
    use uuid::Uuid;

    async fn engine_with(
        config: Config,
    ) -> (ShiftSettlementEngine, Arc<Repository>, tempfile::TempDir) {
        let (repo, dir) = setup_repo().await;
        let catalog = Arc::new(CatalogCache::new(repo.clone(), Duration::from_secs(60)));
        let engine = ShiftSettlementEngine::new(repo.clone(), catalog, shared_rng(Some(42)), config);
        (engine, repo, dir)
    }

    async fn engine() -> (ShiftSettlementEngine, Arc<Repository>, tempfile::TempDir) {
        let mut config = Config::with_database_path("unused");
        config.default_hourly_wage = Decimal::from_int(10);
        engine_with(config).await
    }

    fn input(employee: i64, clock_in: &str, clock_out: Option<&str>, lines: &[(&str, &str)]) -> ShiftInput {
        ShiftInput {
            employee_id: EmployeeId::new(employee),
            employee_name: format!("Employee {}", employee),
            clock_in: dt(clock_in),
            clock_out: clock_out.map(dt),
            product_sales: sales(lines),
            request_id: None,
        }
    }

    #[tokio::test]
    async fn test_reference_scenario() {
        let (engine, _repo, _dir) = engine().await;
        let settlement = engine
            .settle(input(
                1,
                "2025-03-10 10:00:00",
                Some("2025-03-10 15:00:00"),
                &[("A", "250"), ("B", "150"), ("C", "100")],
            ))
            .await
            .unwrap();

        let shift = &settlement.shift;
        assert_eq!(shift.total_sales, d("500"));
        assert_eq!(shift.net_sales, d("400"));
        assert_eq!(shift.tier_name, "Tier C");
        assert_eq!(shift.commission_pct, d("6"));
        assert_eq!(shift.commissions, d("24"));
        assert_eq!(shift.worked_hours, d("5"));
        assert_eq!(shift.hourly_pay, d("50"));
        assert_eq!(shift.total_made, d("74"));
        assert_eq!(shift.rolling_average, Decimal::zero());
        assert!(!shift.performance_flag);
        assert!(!settlement.replayed);

        assert_eq!(settlement.fortnight.shift_count, 1);
        assert_eq!(settlement.fortnight.total_salary, d("74"));

        let stored = engine.get_shift(shift.id).await.unwrap();
        assert_eq!(&stored, shift);
    }

    #[tokio::test]
    async fn test_bonuses_fold_in_creation_order() {
        let (engine, _repo, _dir) = engine().await;
        let employee = EmployeeId::new(1);
        let ledger = engine.ledger().clone();
        ledger.grant(employee, BonusKind::PercentNext, d("1")).await.unwrap();
        ledger.grant(employee, BonusKind::DoubleCommission, Decimal::zero()).await.unwrap();
        ledger.grant(employee, BonusKind::Flat, d("10")).await.unwrap();

        let settlement = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "500")]))
            .await
            .unwrap();
        let shift = settlement.shift;

        // (6 + 1) * 2 = 14% of 400 = 56; + 50 hourly + 10 flat.
        assert_eq!(shift.base_commission_pct, d("6"));
        assert_eq!(shift.commission_pct, d("14"));
        assert_eq!(shift.bonus_pct, d("8"));
        assert_eq!(shift.flat_bonus_total, d("10"));
        assert_eq!(shift.commissions, d("56"));
        assert_eq!(shift.total_made, d("116"));
        assert_eq!(shift.applied_bonus_ids.len(), 3);
        assert_eq!(shift.breakdown(), "14.00% (Tier C: 6.0% +8.0% bonus +$10.00 flat)");

        assert!(ledger.pending(employee).await.unwrap().is_empty());

        // Consumed once: the next shift settles at the base rate.
        let next = engine
            .settle(input(1, "2025-03-11 10:00:00", Some("2025-03-11 15:00:00"), &[("A", "500")]))
            .await
            .unwrap();
        assert_eq!(next.shift.commission_pct, d("6"));
        assert!(next.shift.applied_bonus_ids.is_empty());
    }

    #[tokio::test]
    async fn test_percent_prev_uses_latest_peer_shift() {
        let (engine, repo, _dir) = engine().await;
        seed_shift(&repo, 2, "2025-03-09 10:00:00", &[("A", "1000")]).await;
        seed_shift(&repo, 3, "2025-03-10 08:00:00", &[("A", "200"), ("Z", "900")]).await;
        engine
            .ledger()
            .grant(EmployeeId::new(1), BonusKind::PercentPrev, d("10"))
            .await
            .unwrap();

        let settlement = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "500")]))
            .await
            .unwrap();
        // 10% of (200 * 0.8).
        assert_eq!(settlement.shift.flat_bonus_total, d("16"));
        assert_eq!(settlement.shift.total_made, d("24") + d("50") + d("16"));
    }

    #[tokio::test]
    async fn test_percent_all_pools_same_day_peers() {
        let (engine, repo, _dir) = engine().await;
        seed_shift(&repo, 2, "2025-03-10 08:00:00", &[("A", "100")]).await;
        seed_shift(&repo, 3, "2025-03-10 09:00:00", &[("A", "400")]).await;
        // Previous day and later clock-in: not pooled.
        seed_shift(&repo, 4, "2025-03-09 09:00:00", &[("A", "1000")]).await;
        seed_shift(&repo, 5, "2025-03-10 11:00:00", &[("A", "1000")]).await;
        engine
            .ledger()
            .grant(EmployeeId::new(1), BonusKind::PercentAll, d("5"))
            .await
            .unwrap();

        let settlement = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "500")]))
            .await
            .unwrap();
        // 5% of (500 * 0.8).
        assert_eq!(settlement.shift.flat_bonus_total, d("20"));
    }

    #[tokio::test]
    async fn test_peer_bonus_without_peers_is_consumed_at_zero() {
        let (engine, _repo, _dir) = engine().await;
        let bonus = engine
            .ledger()
            .grant(EmployeeId::new(1), BonusKind::PercentPrev, d("10"))
            .await
            .unwrap();

        let settlement = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "500")]))
            .await
            .unwrap();
        assert_eq!(settlement.shift.flat_bonus_total, Decimal::zero());
        assert_eq!(settlement.shift.applied_bonus_ids, vec![bonus]);
    }

    #[tokio::test]
    async fn test_open_shift_then_close() {
        let (engine, _repo, _dir) = engine().await;
        let employee = EmployeeId::new(1);
        engine.ledger().grant(employee, BonusKind::Flat, d("10")).await.unwrap();

        let open = engine
            .settle(input(1, "2025-03-10 10:00:00", None, &[("A", "500")]))
            .await
            .unwrap();
        assert!(open.shift.is_open());
        assert_eq!(open.shift.worked_hours, Decimal::zero());
        assert_eq!(open.shift.hourly_pay, Decimal::zero());
        assert_eq!(open.shift.commissions, d("24"));
        assert!(open.shift.applied_bonus_ids.is_empty());
        assert_eq!(engine.ledger().pending(employee).await.unwrap().len(), 1);

        let closed = engine
            .close_shift(open.shift.id, dt("2025-03-10 15:00:00"))
            .await
            .unwrap();
        assert!(!closed.shift.is_open());
        assert_eq!(closed.shift.worked_hours, d("5"));
        assert_eq!(closed.shift.hourly_pay, d("50"));
        assert_eq!(closed.shift.flat_bonus_total, d("10"));
        assert_eq!(closed.shift.total_made, d("84"));
        assert!(engine.ledger().pending(employee).await.unwrap().is_empty());
        assert_eq!(closed.fortnight.total_made, d("84"));

        let again = engine
            .close_shift(open.shift.id, dt("2025-03-10 16:00:00"))
            .await;
        assert!(matches!(again, Err(SettlementError::AlreadyClosed(_))));
    }

    #[tokio::test]
    async fn test_close_rejects_clock_out_before_clock_in() {
        let (engine, _repo, _dir) = engine().await;
        let open = engine
            .settle(input(1, "2025-03-10 10:00:00", None, &[("A", "500")]))
            .await
            .unwrap();
        let result = engine
            .close_shift(open.shift.id, dt("2025-03-10 09:00:00"))
            .await;
        assert!(matches!(result, Err(SettlementError::InvalidInput(_))));
        assert!(matches!(
            engine.close_shift(ShiftId::new(999), dt("2025-03-10 09:00:00")).await,
            Err(SettlementError::ShiftNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_correct_sales_keeps_consumed_bonuses() {
        let (engine, _repo, _dir) = engine().await;
        engine
            .ledger()
            .grant(EmployeeId::new(1), BonusKind::PercentNext, d("2"))
            .await
            .unwrap();
        let settled = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "500")]))
            .await
            .unwrap();
        assert_eq!(settled.shift.commission_pct, d("8"));

        let corrected = engine.correct_sales(settled.shift.id, d("1000")).await.unwrap();
        let shift = corrected.shift;
        assert_eq!(shift.total_sales, d("1000"));
        assert_eq!(shift.net_sales, d("800"));
        assert_eq!(shift.commission_pct, d("8"));
        assert_eq!(shift.commissions, d("64"));
        assert_eq!(shift.worked_hours, d("5"));
        assert_eq!(shift.total_made, d("114"));
        assert_eq!(shift.applied_bonus_ids, settled.shift.applied_bonus_ids);
        assert_eq!(corrected.fortnight.total_sales, d("1000"));

        assert!(matches!(
            engine.correct_sales(shift.id, d("-1")).await,
            Err(SettlementError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_rolling_average_and_flag() {
        let (engine, _repo, _dir) = engine().await;
        for (day, amount) in [("07", "1000"), ("08", "1500"), ("09", "2000")] {
            let clock_in = format!("2025-03-{} 10:00:00", day);
            let clock_out = format!("2025-03-{} 15:00:00", day);
            engine
                .settle(input(1, &clock_in, Some(&clock_out), &[("A", amount)]))
                .await
                .unwrap();
        }

        let settlement = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "2000")]))
            .await
            .unwrap();
        assert_eq!(settlement.shift.rolling_average, d("1666.67"));
        assert!(settlement.shift.performance_flag);
    }

    #[tokio::test]
    async fn test_request_id_replays() {
        let (engine, repo, _dir) = engine().await;
        let mut shift_input = input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "500")]);
        shift_input.request_id = Some(Uuid::new_v4());

        let first = engine.settle(shift_input.clone()).await.unwrap();
        let second = engine.settle(shift_input).await.unwrap();
        assert!(second.replayed);
        assert_eq!(first.shift, second.shift);
        assert_eq!(second.fortnight.shift_count, 1);

        let dates = repo.shift_dates().await.unwrap();
        assert_eq!(dates.len(), 1);
    }

    #[tokio::test]
    async fn test_tier_from_previous_month() {
        let (engine, repo, _dir) = engine().await;
        seed_shift(&repo, 1, "2025-02-10 10:00:00", &[("A", "60000")]).await;
        let settlement = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "500")]))
            .await
            .unwrap();
        assert_eq!(settlement.shift.tier_name, "Tier B");
        assert_eq!(settlement.shift.commissions, d("20"));
    }

    #[tokio::test]
    async fn test_dynamic_mode() {
        let mut config = Config::with_database_path("unused");
        config.default_hourly_wage = Decimal::from_int(10);
        config.commission_mode = CommissionMode::Dynamic;
        let (engine, _repo, _dir) = engine_with(config).await;

        let settlement = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "500")]))
            .await
            .unwrap();
        assert_eq!(settlement.shift.tier_name, DYNAMIC_TIER_NAME);
        assert_eq!(settlement.shift.base_commission_pct, d("8"));
    }

    #[tokio::test]
    async fn test_invalid_input_leaves_no_state() {
        let (engine, repo, _dir) = engine().await;
        let result = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "-5")]))
            .await;
        assert!(matches!(result, Err(SettlementError::InvalidInput(_))));
        assert!(repo.shift_dates().await.unwrap().is_empty());
        assert!(repo.get_employee(EmployeeId::new(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_settlements_apply_bonus_once() {
        let (engine, _repo, _dir) = engine().await;
        let engine = Arc::new(engine);
        let bonus = engine
            .ledger()
            .grant(EmployeeId::new(1), BonusKind::Flat, d("25"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for day in 10..16 {
            let engine = Arc::clone(&engine);
            let clock_in = format!("2025-03-{} 10:00:00", day);
            let clock_out = format!("2025-03-{} 15:00:00", day);
            handles.push(tokio::spawn(async move {
                engine
                    .settle(input(1, &clock_in, Some(&clock_out), &[("A", "100")]))
                    .await
                    .unwrap()
            }));
        }

        let mut holders = 0;
        for handle in handles {
            let settlement = handle.await.unwrap();
            if settlement.shift.applied_bonus_ids.contains(&bonus) {
                holders += 1;
                assert_eq!(settlement.shift.flat_bonus_total, d("25"));
            } else {
                assert_eq!(settlement.shift.flat_bonus_total, Decimal::zero());
            }
        }
        assert_eq!(holders, 1);

        let bonuses = engine.ledger().list(EmployeeId::new(1)).await.unwrap();
        assert!(matches!(bonuses[0].state, BonusState::Applied { .. }));
    }

    #[tokio::test]
    async fn test_sales_at_ceiling_settle() {
        let (engine, _repo, _dir) = engine().await;
        let settlement = engine
            .settle(input(
                1,
                "2025-03-10 10:00:00",
                Some("2025-03-10 15:00:00"),
                &[("A", "600000000"), ("B", "400000000")],
            ))
            .await
            .unwrap();
        assert_eq!(settlement.shift.total_sales, MAX_SHIFT_SALES);
        assert_eq!(settlement.shift.commissions, d("48000000"));
        assert_eq!(settlement.shift.total_made, d("48000050"));
    }

    #[tokio::test]
    async fn test_decimal_max_amount_is_rejected() {
        let (engine, repo, _dir) = engine().await;
        let result = engine
            .settle(input(
                1,
                "2025-03-10 10:00:00",
                Some("2025-03-10 15:00:00"),
                &[("A", "79228162514264337593543950335"), ("B", "1")],
            ))
            .await;
        assert!(matches!(
            result,
            Err(SettlementError::InvalidInput(ShiftInputError::AmountTooLarge(_)))
        ));
        assert!(repo.shift_dates().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commission_overflow_rolls_back() {
        let (engine, repo, _dir) = engine().await;
        let employee = EmployeeId::new(1);
        for _ in 0..100 {
            engine
                .ledger()
                .grant(employee, BonusKind::DoubleCommission, Decimal::zero())
                .await
                .unwrap();
        }

        let result = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "500")]))
            .await;
        assert!(matches!(result, Err(SettlementError::AmountOverflow(_))));
        assert!(repo.shift_dates().await.unwrap().is_empty());
        assert_eq!(engine.ledger().pending(employee).await.unwrap().len(), 100);
    }

    #[tokio::test]
    async fn test_correct_sales_above_ceiling_rejected() {
        let (engine, _repo, _dir) = engine().await;
        let settled = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "500")]))
            .await
            .unwrap();

        let result = engine
            .correct_sales(settled.shift.id, MAX_SHIFT_SALES + d("0.01"))
            .await;
        assert!(matches!(result, Err(SettlementError::InvalidRequest(_))));
        assert_eq!(engine.get_shift(settled.shift.id).await.unwrap(), settled.shift);
    }

    #[tokio::test]
    async fn test_zero_sales_history_flags_next_shift() {
        let (engine, _repo, _dir) = engine().await;
        let quiet = engine
            .settle(input(1, "2025-03-09 10:00:00", Some("2025-03-09 15:00:00"), &[("A", "0")]))
            .await
            .unwrap();
        assert!(!quiet.shift.performance_flag);

        let settlement = engine
            .settle(input(1, "2025-03-10 10:00:00", Some("2025-03-10 15:00:00"), &[("A", "100")]))
            .await
            .unwrap();
        assert_eq!(settlement.shift.rolling_average, Decimal::zero());
        assert!(settlement.shift.performance_flag);
    }

    #[tokio::test]
    async fn test_latest_peer_shift_sharing_skips_unshared_lines() {
        let (_engine, repo, _dir) = engine().await;
        let older = seed_shift(&repo, 2, "2025-03-08 10:00:00", &[("A", "300")]).await;
        // Newer peer shifts: only a zero-amount A line, or no A at all.
        seed_shift(&repo, 3, "2025-03-09 10:00:00", &[("A", "0"), ("Z", "900")]).await;
        seed_shift(&repo, 4, "2025-03-09 11:00:00", &[("Z", "50")]).await;
        // The employee's own shift never counts.
        seed_shift(&repo, 1, "2025-03-09 12:00:00", &[("A", "700")]).await;

        let models: BTreeSet<Product> = [Product::new("A")].into_iter().collect();
        let mut conn = repo.pool().acquire().await.unwrap();
        let found = repo
            .latest_peer_shift_sharing(&mut conn, EmployeeId::new(1), dt("2025-03-10 10:00:00"), &models)
            .await
            .unwrap()
            .expect("peer shift");
        assert_eq!(found.id, older);
        assert_eq!(found.product_sales, sales(&[("A", "300")]));

        let none = repo
            .latest_peer_shift_sharing(&mut conn, EmployeeId::new(1), dt("2025-03-08 10:00:00"), &models)
            .await
            .unwrap();
        assert!(none.is_none());
    }
}
