use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{parse_month, AppState};
use crate::error::AppError;
use crate::orchestration::TierRefresh;

#[derive(Debug, Deserialize)]
pub struct RefreshTiersRequest {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierRefreshDto {
    pub employee_id: i64,
    pub previous_tier: Option<String>,
    pub tier: String,
    pub percentage: String,
    pub previous_month_sales: String,
    pub changed: bool,
}

impl From<&TierRefresh> for TierRefreshDto {
    fn from(r: &TierRefresh) -> Self {
        TierRefreshDto {
            employee_id: r.employee_id.as_i64(),
            previous_tier: r.previous_tier.clone(),
            tier: r.tier.name.clone(),
            percentage: r.tier.percentage.to_money_string(),
            previous_month_sales: r.previous_month_sales.to_money_string(),
            changed: r.changed(),
        }
    }
}

pub async fn refresh_tiers(
    State(state): State<AppState>,
    Json(body): Json<RefreshTiersRequest>,
) -> Result<Json<Vec<TierRefreshDto>>, AppError> {
    let month = parse_month(body.year, body.month)?;
    let refreshed = state.settlement.tiers().refresh_all(month).await?;
    Ok(Json(refreshed.iter().map(TierRefreshDto::from).collect()))
}

pub async fn invalidate(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.catalog.invalidate().await;
    Json(serde_json::json!({"status": "invalidated"}))
}
