use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{parse_month, AppState};
use crate::domain::{Decimal, EmployeeId, RankChange, RewardCurrency};
use crate::error::AppError;

/// Coins per dollar when displaying a coin balance.
const COINS_PER_DOLLAR: i64 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankRequest {
    pub employee_id: i64,
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinQuery {
    pub employee_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardDto {
    pub amount: String,
    pub currency: RewardCurrency,
    pub reference: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankChangeDto {
    pub employee_id: i64,
    pub month: String,
    pub old_rank: String,
    pub new_rank: String,
    pub rank_up: bool,
    pub emoji: String,
    pub reward: Option<RewardDto>,
}

impl From<&RankChange> for RankChangeDto {
    fn from(change: &RankChange) -> Self {
        RankChangeDto {
            employee_id: change.employee_id.as_i64(),
            month: change.month.to_string(),
            old_rank: change.old_rank.clone(),
            new_rank: change.new_rank.clone(),
            rank_up: change.rank_up,
            emoji: change.emoji.clone(),
            reward: change.reward.as_ref().map(|r| RewardDto {
                amount: r.amount.to_money_string(),
                currency: r.currency,
                reference: r.reference,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateResponse {
    pub rank_change: Option<RankChangeDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifiedResponse {
    pub updated: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinBalanceResponse {
    pub employee_id: i64,
    pub balance: i64,
    pub dollars: String,
}

pub async fn evaluate(
    State(state): State<AppState>,
    Json(body): Json<RankRequest>,
) -> Result<Json<EvaluateResponse>, AppError> {
    let month = parse_month(body.year, body.month)?;
    let change = state
        .ranks
        .evaluate(EmployeeId::new(body.employee_id), month)
        .await?;
    Ok(Json(EvaluateResponse {
        rank_change: change.as_ref().map(RankChangeDto::from),
    }))
}

pub async fn mark_notified(
    State(state): State<AppState>,
    Json(body): Json<RankRequest>,
) -> Result<Json<NotifiedResponse>, AppError> {
    let month = parse_month(body.year, body.month)?;
    let updated = state
        .ranks
        .mark_notified(EmployeeId::new(body.employee_id), month)
        .await?;
    Ok(Json(NotifiedResponse { updated }))
}

pub async fn coin_balance(
    Query(params): Query<CoinQuery>,
    State(state): State<AppState>,
) -> Result<Json<CoinBalanceResponse>, AppError> {
    let balance = state
        .ranks
        .coin_balance(EmployeeId::new(params.employee_id))
        .await?;
    let dollars = Decimal::from_int(balance) / Decimal::from_int(COINS_PER_DOLLAR);
    Ok(Json(CoinBalanceResponse {
        employee_id: params.employee_id,
        balance,
        dollars: dollars.to_money_string(),
    }))
}
