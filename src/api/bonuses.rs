use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{ActiveBonus, BonusKind, BonusState, Decimal, EmployeeId, CLOCK_FORMAT};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantBonusRequest {
    pub employee_id: i64,
    pub kind: Option<BonusKind>,
    pub value: Option<Decimal>,
    /// Compact grant code such as `flat_10`; takes precedence over `kind`.
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantBonusResponse {
    pub bonus_id: Option<i64>,
    pub skipped: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusesQuery {
    pub employee_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BonusDto {
    pub id: i64,
    pub employee_id: i64,
    pub kind: String,
    pub value: String,
    pub applied: bool,
    pub shift_id: Option<i64>,
    pub applied_at: Option<String>,
    pub created_at: String,
}

impl From<&ActiveBonus> for BonusDto {
    fn from(bonus: &ActiveBonus) -> Self {
        let (shift_id, applied_at) = match bonus.state {
            BonusState::Pending => (None, None),
            BonusState::Applied {
                shift_id,
                applied_at,
            } => (
                Some(shift_id.as_i64()),
                Some(applied_at.format(CLOCK_FORMAT).to_string()),
            ),
        };
        BonusDto {
            id: bonus.id.as_i64(),
            employee_id: bonus.employee_id.as_i64(),
            kind: bonus.kind.as_str().to_string(),
            value: bonus.value.to_canonical_string(),
            applied: !bonus.state.is_pending(),
            shift_id,
            applied_at,
            created_at: bonus.created_at.format(CLOCK_FORMAT).to_string(),
        }
    }
}

pub async fn grant_bonus(
    State(state): State<AppState>,
    Json(body): Json<GrantBonusRequest>,
) -> Result<Json<GrantBonusResponse>, AppError> {
    let employee_id = EmployeeId::new(body.employee_id);
    let ledger = state.settlement.ledger();

    let bonus_id = match (body.code.as_deref(), body.kind) {
        (Some(code), _) => ledger.grant_code(employee_id, code).await?,
        (None, Some(kind)) => Some(
            ledger
                .grant(employee_id, kind, body.value.unwrap_or_default())
                .await?,
        ),
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either code or kind is required".to_string(),
            ))
        }
    };

    Ok(Json(GrantBonusResponse {
        bonus_id: bonus_id.map(|id| id.as_i64()),
        skipped: bonus_id.is_none(),
    }))
}

pub async fn list_bonuses(
    Query(params): Query<BonusesQuery>,
    State(state): State<AppState>,
) -> Result<Json<Vec<BonusDto>>, AppError> {
    let bonuses = state
        .settlement
        .ledger()
        .list(EmployeeId::new(params.employee_id))
        .await?;
    Ok(Json(bonuses.iter().map(BonusDto::from).collect()))
}
