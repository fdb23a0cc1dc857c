use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{parse_month, AppState};
use crate::domain::{EmployeeId, FortnightPeriod, FortnightSettlement, DATE_FORMAT};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FortnightQuery {
    pub employee_id: i64,
    pub year: i32,
    pub month: u32,
    pub fortnight: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaidRequest {
    pub employee_id: i64,
    pub year: i32,
    pub month: u32,
    pub fortnight: u8,
    #[serde(default = "default_paid")]
    pub paid: bool,
}

fn default_paid() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FortnightDto {
    pub employee_id: i64,
    pub year: i32,
    pub month: u32,
    pub fortnight: u8,
    pub shift_count: i64,
    pub worked_hours: String,
    pub total_sales: String,
    pub total_commissions: String,
    pub total_hourly_pay: String,
    pub total_made: String,
    pub performance_count: i64,
    pub bonus_amount: String,
    pub total_salary: String,
    pub payment_date: String,
    pub is_paid: bool,
}

impl From<&FortnightSettlement> for FortnightDto {
    fn from(s: &FortnightSettlement) -> Self {
        FortnightDto {
            employee_id: s.employee_id.as_i64(),
            year: s.period.month.year,
            month: s.period.month.month,
            fortnight: s.period.fortnight,
            shift_count: s.shift_count,
            worked_hours: s.worked_hours.to_money_string(),
            total_sales: s.total_sales.to_money_string(),
            total_commissions: s.total_commissions.to_money_string(),
            total_hourly_pay: s.total_hourly_pay.to_money_string(),
            total_made: s.total_made.to_money_string(),
            performance_count: s.performance_count,
            bonus_amount: s.bonus_amount.to_money_string(),
            total_salary: s.total_salary.to_money_string(),
            payment_date: s.payment_date.format(DATE_FORMAT).to_string(),
            is_paid: s.is_paid,
        }
    }
}

fn parse_period(year: i32, month: u32, fortnight: u8) -> Result<FortnightPeriod, AppError> {
    FortnightPeriod::new(parse_month(year, month)?, fortnight)
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Recompute and return one period.
pub async fn get_fortnight(
    Query(params): Query<FortnightQuery>,
    State(state): State<AppState>,
) -> Result<Json<FortnightDto>, AppError> {
    let period = parse_period(params.year, params.month, params.fortnight)?;
    let settlement = state
        .settlement
        .fortnights()
        .recompute(EmployeeId::new(params.employee_id), period)
        .await?;
    Ok(Json(FortnightDto::from(&settlement)))
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Json(body): Json<MarkPaidRequest>,
) -> Result<Json<FortnightDto>, AppError> {
    let period = parse_period(body.year, body.month, body.fortnight)?;
    let settlement = state
        .settlement
        .fortnights()
        .mark_paid(EmployeeId::new(body.employee_id), period, body.paid)
        .await?;
    Ok(Json(FortnightDto::from(&settlement)))
}

pub async fn export_csv(
    Query(params): Query<ExportQuery>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let month = parse_month(params.year, params.month)?;
    let csv = state.settlement.fortnights().export_csv(month).await?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv))
}

pub async fn backfill(State(state): State<AppState>) -> Result<Json<Vec<FortnightDto>>, AppError> {
    let settlements = state.settlement.fortnights().backfill().await?;
    Ok(Json(settlements.iter().map(FortnightDto::from).collect()))
}
