use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use uuid::Uuid;

use super::fortnights::FortnightDto;
use super::ranks::RankChangeDto;
use super::{parse_clock, AppState};
use crate::domain::{
    Decimal, EmployeeId, Product, SettledShift, ShiftId, ShiftInput, YearMonth, CLOCK_FORMAT,
    DATE_FORMAT,
};
use crate::error::AppError;
use crate::orchestration::Settlement;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleShiftRequest {
    pub employee_id: i64,
    pub employee_name: String,
    pub clock_in: String,
    pub clock_out: Option<String>,
    pub product_sales: BTreeMap<String, Decimal>,
    pub request_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseShiftRequest {
    pub clock_out: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectSalesRequest {
    pub total_sales: Decimal,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftDto {
    pub id: i64,
    pub employee_id: i64,
    pub employee_name: String,
    pub date: String,
    pub clock_in: String,
    pub clock_out: Option<String>,
    pub product_sales: BTreeMap<String, String>,
    pub worked_hours: String,
    pub total_sales: String,
    pub net_sales: String,
    pub tier_name: String,
    pub base_commission_pct: String,
    pub bonus_pct: String,
    pub commission_pct: String,
    pub flat_bonus_total: String,
    pub commissions: String,
    pub hourly_pay: String,
    pub total_made: String,
    pub rolling_average: String,
    pub performance_flag: bool,
    pub applied_bonus_ids: Vec<i64>,
    pub breakdown: String,
}

impl From<&SettledShift> for ShiftDto {
    fn from(shift: &SettledShift) -> Self {
        ShiftDto {
            id: shift.id.as_i64(),
            employee_id: shift.employee_id.as_i64(),
            employee_name: shift.employee_name.clone(),
            date: shift.date.format(DATE_FORMAT).to_string(),
            clock_in: shift.clock_in.format(CLOCK_FORMAT).to_string(),
            clock_out: shift
                .clock_out
                .map(|t| t.format(CLOCK_FORMAT).to_string()),
            product_sales: shift
                .product_sales
                .iter()
                .map(|(product, amount)| (product.as_str().to_string(), amount.to_money_string()))
                .collect(),
            worked_hours: shift.worked_hours.to_money_string(),
            total_sales: shift.total_sales.to_money_string(),
            net_sales: shift.net_sales.to_money_string(),
            tier_name: shift.tier_name.clone(),
            base_commission_pct: shift.base_commission_pct.to_money_string(),
            bonus_pct: shift.bonus_pct.to_money_string(),
            commission_pct: shift.commission_pct.to_money_string(),
            flat_bonus_total: shift.flat_bonus_total.to_money_string(),
            commissions: shift.commissions.to_money_string(),
            hourly_pay: shift.hourly_pay.to_money_string(),
            total_made: shift.total_made.to_money_string(),
            rolling_average: shift.rolling_average.to_money_string(),
            performance_flag: shift.performance_flag,
            applied_bonus_ids: shift.applied_bonus_ids.iter().map(|id| id.as_i64()).collect(),
            breakdown: shift.breakdown(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub shift: ShiftDto,
    pub fortnight: FortnightDto,
    pub replayed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_change: Option<RankChangeDto>,
}

impl SettlementResponse {
    fn new(settlement: &Settlement, rank_change: Option<RankChangeDto>) -> Self {
        SettlementResponse {
            shift: ShiftDto::from(&settlement.shift),
            fortnight: FortnightDto::from(&settlement.fortnight),
            replayed: settlement.replayed,
            rank_change,
        }
    }
}

pub async fn settle_shift(
    State(state): State<AppState>,
    Json(body): Json<SettleShiftRequest>,
) -> Result<Json<SettlementResponse>, AppError> {
    let input = ShiftInput {
        employee_id: EmployeeId::new(body.employee_id),
        employee_name: body.employee_name,
        clock_in: parse_clock("clockIn", &body.clock_in)?,
        clock_out: body
            .clock_out
            .as_deref()
            .map(|s| parse_clock("clockOut", s))
            .transpose()?,
        product_sales: body
            .product_sales
            .into_iter()
            .map(|(product, amount)| (Product::new(product), amount))
            .collect(),
        request_id: body.request_id,
    };

    let settlement = state.settlement.settle(input).await?;
    let rank_change = evaluate_rank(&state, &settlement.shift).await;
    Ok(Json(SettlementResponse::new(&settlement, rank_change)))
}

pub async fn get_shift(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<ShiftDto>, AppError> {
    let shift = state.settlement.get_shift(ShiftId::new(id)).await?;
    Ok(Json(ShiftDto::from(&shift)))
}

pub async fn close_shift(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<CloseShiftRequest>,
) -> Result<Json<SettlementResponse>, AppError> {
    let clock_out = parse_clock("clockOut", &body.clock_out)?;
    let settlement = state
        .settlement
        .close_shift(ShiftId::new(id), clock_out)
        .await?;
    Ok(Json(SettlementResponse::new(&settlement, None)))
}

pub async fn correct_sales(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(body): Json<CorrectSalesRequest>,
) -> Result<Json<SettlementResponse>, AppError> {
    let settlement = state
        .settlement
        .correct_sales(ShiftId::new(id), body.total_sales)
        .await?;
    let rank_change = evaluate_rank(&state, &settlement.shift).await;
    Ok(Json(SettlementResponse::new(&settlement, rank_change)))
}

/// Rank evaluation follows a committed settlement; its failure is logged
/// and never undoes the settlement.
async fn evaluate_rank(state: &AppState, shift: &SettledShift) -> Option<RankChangeDto> {
    match state
        .ranks
        .evaluate(shift.employee_id, YearMonth::of(shift.date))
        .await
    {
        Ok(change) => change.as_ref().map(RankChangeDto::from),
        Err(e) => {
            warn!(
                employee_id = %shift.employee_id,
                shift_id = %shift.id,
                error = %e,
                "Rank evaluation failed"
            );
            None
        }
    }
}
