//! Trailing seven-day performance indicator.

use crate::db::Repository;
use crate::domain::{Decimal, EmployeeId};
use crate::engine::{performance_flag, RollingWindow, ROLLING_WINDOW_DAYS};
use chrono::{Duration, NaiveDate};
use sqlx::sqlite::SqliteConnection;
use std::sync::Arc;

pub struct RollingPerformanceTracker {
    repo: Arc<Repository>,
}

impl RollingPerformanceTracker {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    /// The employee's shifts dated in `[shift_date - 7 days, shift_date)`,
    /// read on the caller's connection. Shifts on `shift_date` itself never
    /// count.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn rolling_window(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        shift_date: NaiveDate,
    ) -> Result<RollingWindow, sqlx::Error> {
        let from = shift_date - Duration::days(ROLLING_WINDOW_DAYS);
        let sales = self
            .repo
            .sales_between(conn, employee_id, from, shift_date)
            .await?;
        Ok(RollingWindow::of(&sales))
    }

    pub fn performance_flag(&self, total_sales: Decimal, window: &RollingWindow) -> bool {
        performance_flag(total_sales, window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::test_support::{d, seed_shift, setup_repo};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_weighted_over_three_prior_shifts() {
        let (repo, _dir) = setup_repo().await;
        seed_shift(&repo, 1, "2025-03-07 10:00:00", &[("A", "1000")]).await;
        seed_shift(&repo, 1, "2025-03-08 10:00:00", &[("A", "1500")]).await;
        seed_shift(&repo, 1, "2025-03-09 10:00:00", &[("A", "2000")]).await;

        let tracker = RollingPerformanceTracker::new(repo.clone());
        let mut conn = repo.pool().acquire().await.unwrap();
        let window = tracker
            .rolling_window(&mut conn, EmployeeId::new(1), date("2025-03-10"))
            .await
            .unwrap();
        assert_eq!(window.average, d("1666.67"));
        assert_eq!(window.shift_count, 3);
        assert!(tracker.performance_flag(d("2000"), &window));
        assert!(!tracker.performance_flag(d("1000"), &window));
    }

    #[tokio::test]
    async fn test_window_bounds() {
        let (repo, _dir) = setup_repo().await;
        // Eight days back: outside the window.
        seed_shift(&repo, 1, "2025-03-02 10:00:00", &[("A", "9000")]).await;
        // Exactly seven days back: inside.
        seed_shift(&repo, 1, "2025-03-03 10:00:00", &[("A", "2500")]).await;
        // Same day as the shift being rated: excluded.
        seed_shift(&repo, 1, "2025-03-10 08:00:00", &[("A", "7000")]).await;
        // Another employee: excluded.
        seed_shift(&repo, 2, "2025-03-09 10:00:00", &[("A", "4000")]).await;

        let tracker = RollingPerformanceTracker::new(repo.clone());
        let mut conn = repo.pool().acquire().await.unwrap();
        let window = tracker
            .rolling_window(&mut conn, EmployeeId::new(1), date("2025-03-10"))
            .await
            .unwrap();
        assert_eq!(window.average, Decimal::from_int(2500));
        assert_eq!(window.shift_count, 1);
    }

    #[tokio::test]
    async fn test_no_history_is_zero_and_unflagged() {
        let (repo, _dir) = setup_repo().await;
        let tracker = RollingPerformanceTracker::new(repo.clone());
        let mut conn = repo.pool().acquire().await.unwrap();
        let window = tracker
            .rolling_window(&mut conn, EmployeeId::new(1), date("2025-03-10"))
            .await
            .unwrap();
        assert_eq!(window.average, Decimal::zero());
        assert!(!tracker.performance_flag(d("500"), &window));
    }

    #[tokio::test]
    async fn test_zero_sales_history_still_rates() {
        let (repo, _dir) = setup_repo().await;
        seed_shift(&repo, 1, "2025-03-08 10:00:00", &[("A", "0")]).await;
        seed_shift(&repo, 1, "2025-03-09 10:00:00", &[("A", "0")]).await;

        let tracker = RollingPerformanceTracker::new(repo.clone());
        let mut conn = repo.pool().acquire().await.unwrap();
        let window = tracker
            .rolling_window(&mut conn, EmployeeId::new(1), date("2025-03-10"))
            .await
            .unwrap();
        assert_eq!(window.average, Decimal::zero());
        assert_eq!(window.shift_count, 2);
        assert!(tracker.performance_flag(d("500"), &window));
    }
}
