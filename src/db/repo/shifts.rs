//! Settled shift operations for the repository.

use crate::domain::{BonusId, Decimal, EmployeeId, Product, SettledShift, ShiftId};
use crate::engine::{PeerShift, PeriodShift};
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::Row;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::{
    date_col, datetime_col, decimal_col, format_date, format_datetime, now_string,
    parse_datetime, Repository,
};

const SHIFT_COLUMNS: &str = r#"
    id, employee_id, employee_name, date, clock_in, clock_out, worked_hours,
    total_sales, net_sales, tier_name, base_commission_pct, bonus_pct,
    commission_pct, flat_bonus_total, commissions, hourly_pay, total_made,
    rolling_average, performance_flag
"#;

impl Repository {
    /// Insert a settled shift and its product lines. `shift.id` is ignored;
    /// the assigned id is returned.
    ///
    /// # Errors
    /// Returns an error if either insert fails, including a duplicate
    /// `request_id`.
    pub async fn insert_shift(
        &self,
        conn: &mut SqliteConnection,
        shift: &SettledShift,
        request_id: Option<Uuid>,
    ) -> Result<ShiftId, sqlx::Error> {
        let id = sqlx::query(
            r#"
            INSERT INTO shifts (
                employee_id, employee_name, date, clock_in, clock_out, worked_hours,
                total_sales, net_sales, tier_name, base_commission_pct, bonus_pct,
                commission_pct, flat_bonus_total, commissions, hourly_pay, total_made,
                rolling_average, performance_flag, request_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(shift.employee_id.as_i64())
        .bind(shift.employee_name.as_str())
        .bind(format_date(shift.date))
        .bind(format_datetime(shift.clock_in))
        .bind(shift.clock_out.map(format_datetime))
        .bind(shift.worked_hours.to_canonical_string())
        .bind(shift.total_sales.to_canonical_string())
        .bind(shift.net_sales.to_canonical_string())
        .bind(shift.tier_name.as_str())
        .bind(shift.base_commission_pct.to_canonical_string())
        .bind(shift.bonus_pct.to_canonical_string())
        .bind(shift.commission_pct.to_canonical_string())
        .bind(shift.flat_bonus_total.to_canonical_string())
        .bind(shift.commissions.to_canonical_string())
        .bind(shift.hourly_pay.to_canonical_string())
        .bind(shift.total_made.to_canonical_string())
        .bind(shift.rolling_average.to_canonical_string())
        .bind(shift.performance_flag)
        .bind(request_id.map(|id| id.to_string()))
        .bind(now_string())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        for (product, amount) in &shift.product_sales {
            sqlx::query("INSERT INTO shift_products (shift_id, product, amount) VALUES (?, ?, ?)")
                .bind(id)
                .bind(product.as_str())
                .bind(amount.to_canonical_string())
                .execute(&mut *conn)
                .await?;
        }

        Ok(ShiftId::new(id))
    }

    /// Overwrite the settlement fields of an existing shift. Identity, date,
    /// clock-in and product lines are immutable.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn update_shift_settlement(
        &self,
        conn: &mut SqliteConnection,
        shift: &SettledShift,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE shifts SET
                clock_out = ?, worked_hours = ?, total_sales = ?, net_sales = ?,
                tier_name = ?, base_commission_pct = ?, bonus_pct = ?, commission_pct = ?,
                flat_bonus_total = ?, commissions = ?, hourly_pay = ?, total_made = ?,
                rolling_average = ?, performance_flag = ?
            WHERE id = ?
            "#,
        )
        .bind(shift.clock_out.map(format_datetime))
        .bind(shift.worked_hours.to_canonical_string())
        .bind(shift.total_sales.to_canonical_string())
        .bind(shift.net_sales.to_canonical_string())
        .bind(shift.tier_name.as_str())
        .bind(shift.base_commission_pct.to_canonical_string())
        .bind(shift.bonus_pct.to_canonical_string())
        .bind(shift.commission_pct.to_canonical_string())
        .bind(shift.flat_bonus_total.to_canonical_string())
        .bind(shift.commissions.to_canonical_string())
        .bind(shift.hourly_pay.to_canonical_string())
        .bind(shift.total_made.to_canonical_string())
        .bind(shift.rolling_average.to_canonical_string())
        .bind(shift.performance_flag)
        .bind(shift.id.as_i64())
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the clock-out of a shift that is still open.
    ///
    /// Returns `false` if the shift does not exist or is already closed.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn close_shift_clock(
        &self,
        conn: &mut SqliteConnection,
        id: ShiftId,
        clock_out: chrono::NaiveDateTime,
    ) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("UPDATE shifts SET clock_out = ? WHERE id = ? AND clock_out IS NULL")
                .bind(format_datetime(clock_out))
                .bind(id.as_i64())
                .execute(&mut *conn)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    /// # Errors
    /// Returns an error if the query fails or a stored timestamp is corrupt.
    pub async fn get_shift(&self, id: ShiftId) -> Result<Option<SettledShift>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        self.get_shift_in(&mut conn, id).await
    }

    /// Load a shift on the caller's connection, e.g. inside a transaction.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored timestamp is corrupt.
    pub async fn get_shift_in(
        &self,
        conn: &mut SqliteConnection,
        id: ShiftId,
    ) -> Result<Option<SettledShift>, sqlx::Error> {
        let row = sqlx::query(&format!("SELECT {} FROM shifts WHERE id = ?", SHIFT_COLUMNS))
            .bind(id.as_i64())
            .fetch_optional(&mut *conn)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let product_rows =
            sqlx::query("SELECT product, amount FROM shift_products WHERE shift_id = ? ORDER BY product")
                .bind(id.as_i64())
                .fetch_all(&mut *conn)
                .await?;
        let product_sales = product_rows
            .iter()
            .map(|r| (Product::new(r.get::<String, _>("product")), decimal_col(r, "amount")))
            .collect();

        let bonus_rows =
            sqlx::query("SELECT id FROM active_bonuses WHERE shift_id = ? ORDER BY created_at, id")
                .bind(id.as_i64())
                .fetch_all(&mut *conn)
                .await?;
        let applied_bonus_ids = bonus_rows
            .iter()
            .map(|r| BonusId::new(r.get("id")))
            .collect();

        shift_from_row(&row, product_sales, applied_bonus_ids).map(Some)
    }

    /// # Errors
    /// Returns an error if the query fails.
    pub async fn shift_id_by_request(
        &self,
        conn: &mut SqliteConnection,
        request_id: Uuid,
    ) -> Result<Option<ShiftId>, sqlx::Error> {
        let row = sqlx::query("SELECT id FROM shifts WHERE request_id = ?")
            .bind(request_id.to_string())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(|r| ShiftId::new(r.get("id"))))
    }

    /// `total_sales` of the employee's shifts dated in `[from, to)`, oldest
    /// first, read on the caller's connection.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn sales_between(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        from: NaiveDate,
        to_exclusive: NaiveDate,
    ) -> Result<Vec<Decimal>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT total_sales
            FROM shifts
            WHERE employee_id = ? AND date >= ? AND date < ?
            ORDER BY date ASC, clock_in ASC, id ASC
            "#,
        )
        .bind(employee_id.as_i64())
        .bind(format_date(from))
        .bind(format_date(to_exclusive))
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.iter().map(|r| decimal_col(r, "total_sales")).collect())
    }

    /// The most recent shift of another employee that clocked in strictly
    /// before `before` and sold a positive amount of at least one of
    /// `models`. Only that shift's product lines are loaded.
    ///
    /// # Errors
    /// Returns an error if a query fails or a stored timestamp is corrupt.
    pub async fn latest_peer_shift_sharing(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        before: chrono::NaiveDateTime,
        models: &BTreeSet<Product>,
    ) -> Result<Option<PeerShift>, sqlx::Error> {
        if models.is_empty() {
            return Ok(None);
        }

        let placeholders = vec!["?"; models.len()].join(", ");
        let sql = format!(
            r#"
            SELECT s.id
            FROM shifts s
            JOIN shift_products p ON p.shift_id = s.id
            WHERE s.employee_id != ? AND s.clock_in < ?
              AND p.product IN ({}) AND CAST(p.amount AS REAL) > 0
            ORDER BY s.clock_in DESC, s.id DESC
            LIMIT 1
            "#,
            placeholders
        );
        let mut query = sqlx::query(&sql)
            .bind(employee_id.as_i64())
            .bind(format_datetime(before));
        for model in models {
            query = query.bind(model.as_str());
        }
        let Some(row) = query.fetch_optional(&mut *conn).await? else {
            return Ok(None);
        };
        let shift_id: i64 = row.get("id");

        let rows = sqlx::query(
            r#"
            SELECT s.id, s.employee_id, s.clock_in, p.product, p.amount
            FROM shifts s
            JOIN shift_products p ON p.shift_id = s.id
            WHERE s.id = ?
            "#,
        )
        .bind(shift_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(group_peer_rows(&rows)?.into_iter().next())
    }

    /// Other employees' shifts dated `date` that clocked in strictly before
    /// `before`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn peer_shifts_on_date(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        date: NaiveDate,
        before: chrono::NaiveDateTime,
    ) -> Result<Vec<PeerShift>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.employee_id, s.clock_in, p.product, p.amount
            FROM shifts s
            JOIN shift_products p ON p.shift_id = s.id
            WHERE s.employee_id != ? AND s.date = ? AND s.clock_in < ?
            ORDER BY s.clock_in DESC, s.id DESC
            "#,
        )
        .bind(employee_id.as_i64())
        .bind(format_date(date))
        .bind(format_datetime(before))
        .fetch_all(&mut *conn)
        .await?;

        group_peer_rows(&rows)
    }

    /// The employee's shifts dated within `[start, end]`, read on the
    /// caller's connection so uncommitted writes are visible.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn period_shifts(
        &self,
        conn: &mut SqliteConnection,
        employee_id: EmployeeId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PeriodShift>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT worked_hours, total_sales, commissions, hourly_pay, total_made, performance_flag
            FROM shifts
            WHERE employee_id = ? AND date >= ? AND date <= ?
            ORDER BY date ASC, clock_in ASC, id ASC
            "#,
        )
        .bind(employee_id.as_i64())
        .bind(format_date(start))
        .bind(format_date(end))
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .iter()
            .map(|r| PeriodShift {
                worked_hours: decimal_col(r, "worked_hours"),
                total_sales: decimal_col(r, "total_sales"),
                commissions: decimal_col(r, "commissions"),
                hourly_pay: decimal_col(r, "hourly_pay"),
                total_made: decimal_col(r, "total_made"),
                performance_flag: r.get("performance_flag"),
            })
            .collect())
    }

    /// Every distinct (employee, shift date) pair on record.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored date is corrupt.
    pub async fn shift_dates(&self) -> Result<Vec<(EmployeeId, NaiveDate)>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT DISTINCT employee_id, date FROM shifts ORDER BY employee_id ASC, date ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|r| Ok((EmployeeId::new(r.get("employee_id")), date_col(r, "date")?)))
            .collect()
    }
}

fn shift_from_row(
    row: &SqliteRow,
    product_sales: BTreeMap<Product, Decimal>,
    applied_bonus_ids: Vec<BonusId>,
) -> Result<SettledShift, sqlx::Error> {
    let clock_out: Option<String> = row.get("clock_out");
    let clock_out = clock_out.as_deref().map(parse_datetime).transpose()?;

    Ok(SettledShift {
        id: ShiftId::new(row.get("id")),
        employee_id: EmployeeId::new(row.get("employee_id")),
        employee_name: row.get("employee_name"),
        date: date_col(row, "date")?,
        clock_in: datetime_col(row, "clock_in")?,
        clock_out,
        product_sales,
        worked_hours: decimal_col(row, "worked_hours"),
        total_sales: decimal_col(row, "total_sales"),
        net_sales: decimal_col(row, "net_sales"),
        tier_name: row.get("tier_name"),
        base_commission_pct: decimal_col(row, "base_commission_pct"),
        bonus_pct: decimal_col(row, "bonus_pct"),
        commission_pct: decimal_col(row, "commission_pct"),
        flat_bonus_total: decimal_col(row, "flat_bonus_total"),
        commissions: decimal_col(row, "commissions"),
        hourly_pay: decimal_col(row, "hourly_pay"),
        total_made: decimal_col(row, "total_made"),
        rolling_average: decimal_col(row, "rolling_average"),
        performance_flag: row.get("performance_flag"),
        applied_bonus_ids,
    })
}

/// Collapse joined (shift, product) rows into shifts, keeping row order.
fn group_peer_rows(rows: &[SqliteRow]) -> Result<Vec<PeerShift>, sqlx::Error> {
    let mut shifts: Vec<PeerShift> = Vec::new();

    for row in rows {
        let id = ShiftId::new(row.get("id"));
        let product = Product::new(row.get::<String, _>("product"));
        let amount = decimal_col(row, "amount");

        match shifts.last_mut() {
            Some(last) if last.id == id => {
                last.product_sales.insert(product, amount);
            }
            _ => {
                let mut product_sales = BTreeMap::new();
                product_sales.insert(product, amount);
                shifts.push(PeerShift {
                    id,
                    employee_id: EmployeeId::new(row.get("employee_id")),
                    clock_in: datetime_col(row, "clock_in")?,
                    product_sales,
                });
            }
        }
    }

    Ok(shifts)
}
