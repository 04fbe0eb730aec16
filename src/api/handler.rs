use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use tracing::debug;

use super::models::{
    parse_action_filter, BotActionResponse, BotActionsResponse, BotConfigResponse, BotStatsResponse,
    ConfigSnapshot, HealthResponse,
};
use crate::actions::models::ActionType;
use crate::actions::ActionStore;
use crate::error::{AppError, AppResult};

/// Read-only state for the query surface; never touches the submission pipeline
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ActionStore>,
    pub config: Arc<ConfigSnapshot>,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
    })
}

/// GET /api/bot-actions?limit&offset&type
pub async fn list_bot_actions(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<BotActionsResponse>> {
    let filter = parse_action_filter(&params);
    debug!("Listing bot actions: {:?}", filter);

    let actions = state.store.list(&filter).await?;
    Ok(Json(BotActionsResponse {
        success: true,
        count: actions.len(),
        data: actions,
    }))
}

/// GET /api/bot-actions/:tx_hash
pub async fn get_bot_action(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> AppResult<Json<BotActionResponse>> {
    let action = state
        .store
        .get_by_tx_hash(&tx_hash.to_lowercase())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("action for transaction {}", tx_hash)))?;

    Ok(Json(BotActionResponse {
        success: true,
        data: action,
    }))
}

/// GET /api/bot-stats
pub async fn get_bot_stats(State(state): State<AppState>) -> AppResult<Json<BotStatsResponse>> {
    let compound_count = state.store.count_by_type(ActionType::Compound).await?;
    let rebalance_count = state.store.count_by_type(ActionType::Rebalance).await?;
    let latest_action = state.store.latest().await?;

    Ok(Json(BotStatsResponse {
        success: true,
        compound_count,
        rebalance_count,
        latest_action,
    }))
}

/// GET /api/bot-config
pub async fn get_bot_config(State(state): State<AppState>) -> Json<BotConfigResponse> {
    Json(BotConfigResponse {
        success: true,
        config: state.config.as_ref().clone(),
    })
}
