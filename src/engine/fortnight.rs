use crate::domain::{Decimal, EmployeeId, FortnightPeriod, FortnightSettlement};
use crate::engine::AmountOverflow;

/// The settled-shift fields a fortnight total is folded from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeriodShift {
    pub worked_hours: Decimal,
    pub total_sales: Decimal,
    pub commissions: Decimal,
    pub hourly_pay: Decimal,
    pub total_made: Decimal,
    pub performance_flag: bool,
}

/// Fold a period's shifts into its payroll total.
///
/// `bonus_amount = flagged_count * total_commissions * bonus_rate` and
/// `total_salary = total_made + bonus_amount`. The result depends only on
/// the inputs, so recomputing an unchanged period is a no-op.
///
/// # Errors
/// Returns `AmountOverflow` if a total leaves the decimal range.
pub fn fold_period(
    employee_id: EmployeeId,
    period: FortnightPeriod,
    shifts: &[PeriodShift],
    bonus_rate: Decimal,
    is_paid: bool,
) -> Result<FortnightSettlement, AmountOverflow> {
    let sum = |field: fn(&PeriodShift) -> Decimal, name: &'static str| {
        shifts
            .iter()
            .try_fold(Decimal::zero(), |acc, shift| acc.checked_add(field(shift)))
            .ok_or(AmountOverflow(name))
    };
    let worked_hours = sum(|s| s.worked_hours, "worked hours")?;
    let total_sales = sum(|s| s.total_sales, "total sales")?;
    let total_commissions = sum(|s| s.commissions, "total commissions")?;
    let total_hourly_pay = sum(|s| s.hourly_pay, "total hourly pay")?;
    let total_made = sum(|s| s.total_made, "total made")?;
    let performance_count = shifts.iter().filter(|s| s.performance_flag).count() as i64;

    let bonus_amount = Decimal::from_int(performance_count)
        .checked_mul(total_commissions)
        .and_then(|v| v.checked_mul(bonus_rate))
        .ok_or(AmountOverflow("performance bonus"))?
        .round_money();
    let total_salary = total_made
        .round_money()
        .checked_add(bonus_amount)
        .ok_or(AmountOverflow("total salary"))?;

    Ok(FortnightSettlement {
        employee_id,
        period,
        shift_count: shifts.len() as i64,
        worked_hours: worked_hours.round_money(),
        total_sales: total_sales.round_money(),
        total_commissions: total_commissions.round_money(),
        total_hourly_pay: total_hourly_pay.round_money(),
        total_made: total_made.round_money(),
        performance_count,
        bonus_amount,
        total_salary,
        payment_date: period.payment_date(),
        is_paid,
    })
}
