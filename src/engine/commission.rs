//! Commission percentage folding and per-shift earnings.

use crate::domain::{ActiveBonus, BonusId, BonusKind, Decimal};
use crate::engine::AmountOverflow;
use chrono::NaiveDateTime;
use rust_decimal::Decimal as RustDecimal;
use tracing::debug;

/// Share of gross sales that counts as net sales (0.8).
pub const NET_SALES_RATIO: Decimal = Decimal::new(RustDecimal::from_parts(8, 0, 0, false, 1));

const SECONDS_PER_HOUR: i64 = 3600;

/// Result of folding pending bonuses over a base percentage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BonusFold {
    pub base_pct: Decimal,
    pub commission_pct: Decimal,
    pub flat_bonus_total: Decimal,
    /// Bonuses consumed by the fold, in the order they were applied.
    pub applied: Vec<BonusId>,
}

impl BonusFold {
    /// A fold with no bonuses applied.
    pub fn base(base_pct: Decimal) -> Self {
        Self {
            base_pct,
            commission_pct: base_pct,
            flat_bonus_total: Decimal::zero(),
            applied: Vec::new(),
        }
    }

    /// Percentage points contributed by bonuses on top of the base.
    pub fn bonus_pct(&self) -> Decimal {
        self.commission_pct - self.base_pct
    }
}

/// Fold `bonuses` (creation order) into a commission percentage and a flat
/// dollar total.
///
/// `resolve_peer` returns the dollar amount of a `percent_prev` or
/// `percent_all` bonus; it is only called for those kinds. Every bonus passed
/// in is consumed, including peer bonuses that resolve to zero.
///
/// # Errors
/// Returns `AmountOverflow` if the percentage or the flat total leaves the
/// decimal range.
pub fn fold_bonuses<F>(
    base_pct: Decimal,
    bonuses: &[ActiveBonus],
    mut resolve_peer: F,
) -> Result<BonusFold, AmountOverflow>
where
    F: FnMut(&ActiveBonus) -> Decimal,
{
    let mut fold = BonusFold::base(base_pct);
    let pct_overflow = AmountOverflow("commission percentage");
    let flat_overflow = AmountOverflow("flat bonus total");

    for bonus in bonuses {
        match bonus.kind {
            BonusKind::PercentNext => {
                fold.commission_pct = fold
                    .commission_pct
                    .checked_add(bonus.value)
                    .ok_or(pct_overflow)?;
            }
            BonusKind::DoubleCommission => {
                fold.commission_pct = fold
                    .commission_pct
                    .checked_mul(Decimal::from_int(2))
                    .ok_or(pct_overflow)?;
            }
            BonusKind::Flat | BonusKind::FlatImmediate => {
                fold.flat_bonus_total = fold
                    .flat_bonus_total
                    .checked_add(bonus.value)
                    .ok_or(flat_overflow)?;
            }
            BonusKind::PercentPrev | BonusKind::PercentAll => {
                fold.flat_bonus_total = fold
                    .flat_bonus_total
                    .checked_add(resolve_peer(bonus))
                    .ok_or(flat_overflow)?;
            }
        }
        debug!(
            bonus_id = %bonus.id,
            kind = %bonus.kind,
            value = %bonus.value,
            commission_pct = %fold.commission_pct,
            flat_bonus_total = %fold.flat_bonus_total,
            "folded bonus"
        );
        fold.applied.push(bonus.id);
    }

    Ok(fold)
}

/// Hours between clock-in and clock-out; zero for an open shift.
pub fn worked_hours(clock_in: NaiveDateTime, clock_out: Option<NaiveDateTime>) -> Decimal {
    match clock_out {
        Some(out) => {
            let seconds = (out - clock_in).num_seconds().max(0);
            Decimal::from_int(seconds) / Decimal::from_int(SECONDS_PER_HOUR)
        }
        None => Decimal::zero(),
    }
}

/// Monetary outcome of one shift, quantized to cents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Earnings {
    pub worked_hours: Decimal,
    pub total_sales: Decimal,
    pub net_sales: Decimal,
    pub commissions: Decimal,
    pub hourly_pay: Decimal,
    pub total_made: Decimal,
}

impl Earnings {
    /// Intermediate products keep full precision; each persisted field is
    /// quantized once, and `total_made` is the sum of the quantized parts.
    ///
    /// # Errors
    /// Returns `AmountOverflow` if any product or sum leaves the decimal range.
    pub fn compute(
        total_sales: Decimal,
        commission_pct: Decimal,
        worked_hours: Decimal,
        hourly_wage: Decimal,
        flat_bonus_total: Decimal,
    ) -> Result<Self, AmountOverflow> {
        let hourly_pay = worked_hours
            .checked_mul(hourly_wage)
            .ok_or(AmountOverflow("hourly pay"))?
            .round_money();
        Self::with_hourly_pay(total_sales, commission_pct, worked_hours, hourly_pay, flat_bonus_total)
    }

    /// [`compute`](Self::compute) with an already settled hourly pay, for
    /// re-settling the sales side of a stored shift.
    ///
    /// # Errors
    /// Returns `AmountOverflow` if any product or sum leaves the decimal range.
    pub fn with_hourly_pay(
        total_sales: Decimal,
        commission_pct: Decimal,
        worked_hours: Decimal,
        hourly_pay: Decimal,
        flat_bonus_total: Decimal,
    ) -> Result<Self, AmountOverflow> {
        let net_sales = total_sales
            .checked_mul(NET_SALES_RATIO)
            .ok_or(AmountOverflow("net sales"))?;
        let commissions = commission_pct
            .checked_percent_of(net_sales)
            .ok_or(AmountOverflow("commissions"))?
            .round_money();
        let hourly_pay = hourly_pay.round_money();
        let total_made = commissions
            .checked_add(hourly_pay)
            .and_then(|sum| sum.checked_add(flat_bonus_total.round_money()))
            .ok_or(AmountOverflow("total made"))?;

        Ok(Self {
            worked_hours: worked_hours.round_money(),
            total_sales: total_sales.round_money(),
            net_sales: net_sales.round_money(),
            commissions,
            hourly_pay,
            total_made,
        })
    }
}
