use crate::domain::Decimal;

/// Trailing window, in calendar days, of the rolling average.
pub const ROLLING_WINDOW_DAYS: i64 = 7;

/// Weighted average of prior sales, ordered oldest to newest.
///
/// The i-th oldest shift (1-indexed) carries weight `i`; the result is
/// `sum(i * sales_i) / sum(1..=n)` quantized to cents. No history yields zero.
pub fn weighted_average(sales_oldest_first: &[Decimal]) -> Decimal {
    let n = sales_oldest_first.len() as i64;
    if n == 0 {
        return Decimal::zero();
    }

    let weighted: Decimal = sales_oldest_first
        .iter()
        .enumerate()
        .map(|(i, sales)| Decimal::from_int(i as i64 + 1) * *sales)
        .sum();
    let weight_total = Decimal::from_int(n * (n + 1) / 2);

    (weighted / weight_total).round_money()
}

/// The trailing window of prior shifts a new shift is rated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RollingWindow {
    pub average: Decimal,
    pub shift_count: usize,
}

impl RollingWindow {
    pub fn of(sales_oldest_first: &[Decimal]) -> Self {
        Self {
            average: weighted_average(sales_oldest_first),
            shift_count: sales_oldest_first.len(),
        }
    }
}

/// Whether a shift met its rolling average. With no prior shift in the
/// window there is nothing to meet; zero-sales history still counts.
pub fn performance_flag(total_sales: Decimal, window: &RollingWindow) -> bool {
    window.shift_count > 0 && total_sales >= window.average
}
