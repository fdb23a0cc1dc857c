pub mod bonuses;
pub mod catalog;
pub mod fortnights;
pub mod health;
pub mod ranks;
pub mod shifts;

use crate::catalog::CatalogCache;
use crate::config::{Config, RankRewardMode};
use crate::db::Repository;
use crate::domain::{YearMonth, CLOCK_FORMAT};
use crate::error::AppError;
use crate::orchestration::{
    shared_rng, BonusReward, CoinReward, RankEngine, RewardStrategy, ShiftSettlementEngine,
};
use axum::{
    routing::{get, patch, post},
    Router,
};
use chrono::NaiveDateTime;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub catalog: Arc<CatalogCache>,
    pub settlement: Arc<ShiftSettlementEngine>,
    pub ranks: Arc<RankEngine>,
}

impl AppState {
    /// Wire the services over `repo` as `config` describes.
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let catalog = Arc::new(CatalogCache::new(repo.clone(), config.catalog_cache_ttl));
        let rng = shared_rng(config.random_seed);
        let settlement = Arc::new(ShiftSettlementEngine::new(
            repo.clone(),
            catalog.clone(),
            rng.clone(),
            config.clone(),
        ));
        let strategy: Arc<dyn RewardStrategy> = match config.rank_reward_mode {
            RankRewardMode::Bonus => Arc::new(BonusReward::new(settlement.ledger().clone())),
            RankRewardMode::Coins => Arc::new(CoinReward::new(repo.clone())),
        };
        let ranks = Arc::new(RankEngine::new(repo.clone(), catalog.clone(), strategy, rng));

        Self {
            repo,
            config,
            catalog,
            settlement,
            ranks,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/shifts", post(shifts::settle_shift))
        .route("/v1/shifts/:id", get(shifts::get_shift))
        .route("/v1/shifts/:id/close", post(shifts::close_shift))
        .route("/v1/shifts/:id/sales", patch(shifts::correct_sales))
        .route(
            "/v1/bonuses",
            get(bonuses::list_bonuses).post(bonuses::grant_bonus),
        )
        .route("/v1/fortnights", get(fortnights::get_fortnight))
        .route("/v1/fortnights/paid", post(fortnights::mark_paid))
        .route("/v1/fortnights/export", get(fortnights::export_csv))
        .route("/v1/fortnights/backfill", post(fortnights::backfill))
        .route("/v1/ranks/evaluate", post(ranks::evaluate))
        .route("/v1/ranks/notified", post(ranks::mark_notified))
        .route("/v1/ranks/coins", get(ranks::coin_balance))
        .route("/v1/tiers/refresh", post(catalog::refresh_tiers))
        .route("/v1/catalog/invalidate", post(catalog::invalidate))
        .layer(cors)
        .with_state(state)
}

/// Accepts `YYYY-MM-DD HH:MM:SS` or the ISO `T` separator.
pub(crate) fn parse_clock(field: &str, value: &str) -> Result<NaiveDateTime, AppError> {
    NaiveDateTime::parse_from_str(value.trim(), CLOCK_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%S"))
        .map_err(|_| AppError::BadRequest(format!("Invalid {}: {}", field, value)))
}

pub(crate) fn parse_month(year: i32, month: u32) -> Result<YearMonth, AppError> {
    YearMonth::new(year, month).map_err(|e| AppError::BadRequest(e.to_string()))
}
