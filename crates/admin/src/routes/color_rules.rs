//! Color rule handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};

use ivy_core::{ColorRuleId, ShopId};

use crate::error::AppError;
use crate::models::{ColorRule, ColorRuleInput};
use crate::services::ColorRuleService;
use crate::state::AppState;

/// Build the color rule router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/shops/{shop_id}/color-rules",
            get(list_rules).post(create_rule),
        )
        .route(
            "/api/color-rules/{rule_id}",
            put(update_rule).delete(delete_rule),
        )
}

async fn list_rules(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
) -> Result<Json<Vec<ColorRule>>, AppError> {
    let rules = ColorRuleService::new(state.services()).list(shop_id).await?;
    Ok(Json(rules))
}

async fn create_rule(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
    Json(input): Json<ColorRuleInput>,
) -> Result<(StatusCode, Json<ColorRule>), AppError> {
    let rule = ColorRuleService::new(state.services())
        .create(shop_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<ColorRuleId>,
    Json(input): Json<ColorRuleInput>,
) -> Result<Json<ColorRule>, AppError> {
    let rule = ColorRuleService::new(state.services())
        .update(rule_id, input)
        .await?;
    Ok(Json(rule))
}

async fn delete_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<ColorRuleId>,
) -> Result<StatusCode, AppError> {
    ColorRuleService::new(state.services())
        .delete(rule_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
