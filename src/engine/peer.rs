//! Random peer-shift resolution for `percent_prev` and `percent_all` bonuses.
//!
//! Both functions take the candidate shifts and a caller-owned RNG so tests
//! can seed the choice.

use super::commission::NET_SALES_RATIO;
use crate::domain::{models_of, Decimal, EmployeeId, Product, ShiftId};
use chrono::NaiveDateTime;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};

/// A settled shift by some employee, as seen by peer bonus resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerShift {
    pub id: ShiftId,
    pub employee_id: EmployeeId,
    pub clock_in: NaiveDateTime,
    pub product_sales: BTreeMap<Product, Decimal>,
}

/// Resolved dollar amount and the model/shift it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PeerBonus {
    pub amount: Decimal,
    pub model: Option<Product>,
    pub source_shift: Option<ShiftId>,
}

impl PeerBonus {
    fn none() -> Self {
        Self::default()
    }
}

/// `value`% of the net sale of one shared model in the most recent earlier
/// shift by another employee that shares at least one model.
///
/// `candidates` may be in any order and may include the current employee's
/// own shifts; both are filtered here.
pub fn resolve_percent_prev<R: Rng + ?Sized>(
    employee_id: EmployeeId,
    clock_in: NaiveDateTime,
    current_models: &BTreeSet<Product>,
    candidates: &[PeerShift],
    value: Decimal,
    rng: &mut R,
) -> PeerBonus {
    if current_models.is_empty() {
        return PeerBonus::none();
    }

    let mut earlier: Vec<&PeerShift> = candidates
        .iter()
        .filter(|s| s.employee_id != employee_id && s.clock_in < clock_in)
        .collect();
    earlier.sort_by(|a, b| b.clock_in.cmp(&a.clock_in).then(b.id.cmp(&a.id)));

    for shift in earlier {
        // BTreeSet intersection is sorted, so a seed maps to one model.
        let shared: Vec<Product> = models_of(&shift.product_sales)
            .intersection(current_models)
            .cloned()
            .collect();
        let Some(model) = shared.choose(rng) else {
            continue;
        };
        let sale = shift.product_sales.get(model).copied().unwrap_or_default();

        return PeerBonus {
            amount: value.percent_of(sale * NET_SALES_RATIO),
            model: Some(model.clone()),
            source_shift: Some(shift.id),
        };
    }

    PeerBonus::none()
}

/// `value`% of the summed net sales of one randomly chosen current model
/// across other employees' shifts on the same calendar date that clocked in
/// strictly earlier.
pub fn resolve_percent_all<R: Rng + ?Sized>(
    employee_id: EmployeeId,
    clock_in: NaiveDateTime,
    current_models: &BTreeSet<Product>,
    candidates: &[PeerShift],
    value: Decimal,
    rng: &mut R,
) -> PeerBonus {
    let models: Vec<&Product> = current_models.iter().collect();
    let Some(model) = models.choose(rng) else {
        return PeerBonus::none();
    };

    let date = clock_in.date();
    let pooled: Decimal = candidates
        .iter()
        .filter(|s| {
            s.employee_id != employee_id && s.clock_in.date() == date && s.clock_in < clock_in
        })
        .filter_map(|s| s.product_sales.get(*model))
        .map(|sale| *sale * NET_SALES_RATIO)
        .sum();

    PeerBonus {
        amount: value.percent_of(pooled),
        model: Some((*model).clone()),
        source_shift: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn peer(id: i64, employee: i64, clock_in: &str, sales: &[(&str, &str)]) -> PeerShift {
        PeerShift {
            id: ShiftId::new(id),
            employee_id: EmployeeId::new(employee),
            clock_in: dt(clock_in),
            product_sales: sales
                .iter()
                .map(|(p, a)| (Product::new(*p), d(a)))
                .collect(),
        }
    }

    fn models(names: &[&str]) -> BTreeSet<Product> {
        names.iter().map(|n| Product::new(*n)).collect()
    }

    #[test]
    fn test_percent_prev_uses_most_recent_sharing_shift() {
        let candidates = vec![
            peer(1, 2, "2025-03-09 10:00:00", &[("A", "1000")]),
            peer(2, 3, "2025-03-10 08:00:00", &[("A", "200"), ("Z", "50")]),
            peer(3, 4, "2025-03-10 09:00:00", &[("Z", "900")]),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let bonus = resolve_percent_prev(
            EmployeeId::new(1),
            dt("2025-03-10 10:00:00"),
            &models(&["A"]),
            &candidates,
            d("2"),
            &mut rng,
        );
        assert_eq!(bonus.source_shift, Some(ShiftId::new(2)));
        assert_eq!(bonus.model, Some(Product::new("A")));
        // 200 * 0.8 * 2%
        assert_eq!(bonus.amount, d("3.2"));
    }

    #[test]
    fn test_percent_prev_ignores_own_and_later_shifts() {
        let candidates = vec![
            peer(1, 1, "2025-03-10 09:00:00", &[("A", "500")]),
            peer(2, 2, "2025-03-10 11:00:00", &[("A", "500")]),
        ];
        let mut rng = StdRng::seed_from_u64(1);
        let bonus = resolve_percent_prev(
            EmployeeId::new(1),
            dt("2025-03-10 10:00:00"),
            &models(&["A"]),
            &candidates,
            d("2"),
            &mut rng,
        );
        assert_eq!(bonus, PeerBonus::none());
    }

    #[test]
    fn test_percent_prev_zero_sales_model_not_shared() {
        let candidates = vec![peer(1, 2, "2025-03-10 09:00:00", &[("A", "0"), ("B", "10")])];
        let mut rng = StdRng::seed_from_u64(1);
        let bonus = resolve_percent_prev(
            EmployeeId::new(1),
            dt("2025-03-10 10:00:00"),
            &models(&["A"]),
            &candidates,
            d("2"),
            &mut rng,
        );
        assert!(bonus.amount.is_zero());
        assert_eq!(bonus.model, None);
    }

    #[test]
    fn test_percent_prev_pick_is_from_intersection() {
        let candidates = vec![peer(
            1,
            2,
            "2025-03-10 09:00:00",
            &[("A", "100"), ("B", "300"), ("C", "700")],
        )];
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let bonus = resolve_percent_prev(
                EmployeeId::new(1),
                dt("2025-03-10 10:00:00"),
                &models(&["A", "B"]),
                &candidates,
                d("10"),
                &mut rng,
            );
            let model = bonus.model.unwrap();
            assert!(model == Product::new("A") || model == Product::new("B"));
        }
    }

    #[test]
    fn test_percent_prev_is_deterministic_for_a_seed() {
        let candidates = vec![peer(1, 2, "2025-03-10 09:00:00", &[("A", "100"), ("B", "300")])];
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            resolve_percent_prev(
                EmployeeId::new(1),
                dt("2025-03-10 10:00:00"),
                &models(&["A", "B"]),
                &candidates,
                d("10"),
                &mut rng,
            )
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_percent_all_sums_same_day_earlier_peers() {
        let candidates = vec![
            peer(1, 2, "2025-03-10 08:00:00", &[("A", "100")]),
            peer(2, 3, "2025-03-10 09:00:00", &[("A", "150")]),
            peer(3, 4, "2025-03-10 12:00:00", &[("A", "999")]),
            peer(4, 5, "2025-03-09 09:00:00", &[("A", "999")]),
            peer(5, 1, "2025-03-10 07:00:00", &[("A", "999")]),
        ];
        let mut rng = StdRng::seed_from_u64(3);
        let bonus = resolve_percent_all(
            EmployeeId::new(1),
            dt("2025-03-10 10:00:00"),
            &models(&["A"]),
            &candidates,
            d("1"),
            &mut rng,
        );
        // (100 + 150) * 0.8 * 1%
        assert_eq!(bonus.amount, d("2"));
        assert_eq!(bonus.model, Some(Product::new("A")));
    }

    #[test]
    fn test_percent_all_without_peers_is_zero() {
        let mut rng = StdRng::seed_from_u64(3);
        let bonus = resolve_percent_all(
            EmployeeId::new(1),
            dt("2025-03-10 10:00:00"),
            &models(&["A"]),
            &[],
            d("1"),
            &mut rng,
        );
        assert!(bonus.amount.is_zero());
    }

    #[test]
    fn test_percent_all_without_models_is_zero() {
        let candidates = vec![peer(1, 2, "2025-03-10 08:00:00", &[("A", "100")])];
        let mut rng = StdRng::seed_from_u64(3);
        let bonus = resolve_percent_all(
            EmployeeId::new(1),
            dt("2025-03-10 10:00:00"),
            &BTreeSet::new(),
            &candidates,
            d("1"),
            &mut rng,
        );
        assert_eq!(bonus, PeerBonus::none());
    }
}
