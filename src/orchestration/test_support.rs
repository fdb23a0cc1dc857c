//! Fixtures shared by the orchestration unit tests.

use crate::db::{init_db, Repository};
use crate::domain::{
    Decimal, EmployeeId, Product, SettledShift, ShiftId, CLOCK_FORMAT,
};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) async fn setup_repo() -> (Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Arc::new(Repository::new(pool)), temp_dir)
}

pub(crate) fn dt(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, CLOCK_FORMAT).unwrap()
}

pub(crate) fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub(crate) fn sales(lines: &[(&str, &str)]) -> BTreeMap<Product, Decimal> {
    lines
        .iter()
        .map(|(product, amount)| (Product::new(*product), d(amount)))
        .collect()
}

/// Store a closed five-hour shift carrying only sales figures.
pub(crate) async fn seed_shift(
    repo: &Repository,
    employee: i64,
    clock_in: &str,
    lines: &[(&str, &str)],
) -> ShiftId {
    let clock_in = dt(clock_in);
    let product_sales = sales(lines);
    let total_sales: Decimal = product_sales.values().copied().sum();

    let mut conn = repo.pool().acquire().await.unwrap();
    repo.ensure_employee(
        &mut conn,
        EmployeeId::new(employee),
        "Seeded",
        Decimal::from_int(10),
        Decimal::from_int(8),
    )
    .await
    .unwrap();

    let shift = SettledShift {
        id: ShiftId::new(0),
        employee_id: EmployeeId::new(employee),
        employee_name: "Seeded".to_string(),
        date: clock_in.date(),
        clock_in,
        clock_out: Some(clock_in + Duration::hours(5)),
        product_sales,
        worked_hours: Decimal::from_int(5),
        total_sales,
        net_sales: Decimal::zero(),
        tier_name: "Tier C".to_string(),
        base_commission_pct: Decimal::from_int(6),
        bonus_pct: Decimal::zero(),
        commission_pct: Decimal::from_int(6),
        flat_bonus_total: Decimal::zero(),
        commissions: Decimal::zero(),
        hourly_pay: Decimal::zero(),
        total_made: Decimal::zero(),
        rolling_average: Decimal::zero(),
        performance_flag: false,
        applied_bonus_ids: Vec::new(),
    };
    repo.insert_shift(&mut conn, &shift, None).await.unwrap()
}
