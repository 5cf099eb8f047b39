//! Price rule handlers. Application runs are streamed as server-sent events.

use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Sse, sse::Event},
    routing::{get, post},
};
use futures::Stream;
use serde::Deserialize;

use ivy_core::{PriceRuleId, ShopId};

use super::sse::progress_sse;
use crate::error::AppError;
use crate::models::{ApplyTarget, PricePreview, PriceRule, PriceRuleInput};
use crate::services::{PriceRuleService, spawn_with_progress};
use crate::state::AppState;

/// Build the price rule router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/shops/{shop_id}/price-rules",
            get(list_rules).post(create_rule),
        )
        .route("/api/shops/{shop_id}/price-rules/apply", post(apply_all))
        .route(
            "/api/price-rules/{rule_id}",
            get(get_rule).put(update_rule).delete(delete_rule),
        )
        .route("/api/price-rules/{rule_id}/preview", get(preview))
        .route("/api/price-rules/{rule_id}/apply", post(apply_rule))
}

#[derive(Debug, Deserialize)]
pub struct ApplyQuery {
    #[serde(default)]
    pub target: ApplyTarget,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub limit: Option<u32>,
}

/// GET /api/shops/{shop_id}/price-rules
async fn list_rules(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
) -> Result<Json<Vec<PriceRule>>, AppError> {
    let rules = PriceRuleService::new(state.services()).list(shop_id).await?;
    Ok(Json(rules))
}

/// POST /api/shops/{shop_id}/price-rules
async fn create_rule(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
    Json(input): Json<PriceRuleInput>,
) -> Result<(StatusCode, Json<PriceRule>), AppError> {
    let rule = PriceRuleService::new(state.services())
        .create(shop_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// GET /api/price-rules/{rule_id}
async fn get_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<PriceRuleId>,
) -> Result<Json<PriceRule>, AppError> {
    let rule = PriceRuleService::new(state.services()).get(rule_id).await?;
    Ok(Json(rule))
}

/// PUT /api/price-rules/{rule_id}
async fn update_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<PriceRuleId>,
    Json(input): Json<PriceRuleInput>,
) -> Result<Json<PriceRule>, AppError> {
    let rule = PriceRuleService::new(state.services())
        .update(rule_id, input)
        .await?;
    Ok(Json(rule))
}

/// DELETE /api/price-rules/{rule_id}
async fn delete_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<PriceRuleId>,
) -> Result<StatusCode, AppError> {
    PriceRuleService::new(state.services())
        .delete(rule_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/price-rules/{rule_id}/preview
async fn preview(
    State(state): State<AppState>,
    Path(rule_id): Path<PriceRuleId>,
    Query(query): Query<PreviewQuery>,
) -> Result<Json<Vec<PricePreview>>, AppError> {
    let rows = PriceRuleService::new(state.services())
        .preview(rule_id, query.limit)
        .await?;
    Ok(Json(rows))
}

/// POST /api/price-rules/{rule_id}/apply
async fn apply_rule(
    State(state): State<AppState>,
    Path(rule_id): Path<PriceRuleId>,
    Query(query): Query<ApplyQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ctx = state.services().clone();

    let events = spawn_with_progress(move |progress| async move {
        PriceRuleService::new(&ctx)
            .apply_rule(rule_id, query.target, &progress)
            .await
            .map(|_| ())
    });

    progress_sse(events)
}

/// POST /api/shops/{shop_id}/price-rules/apply
async fn apply_all(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
    Query(query): Query<ApplyQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ctx = state.services().clone();

    let events = spawn_with_progress(move |progress| async move {
        PriceRuleService::new(&ctx)
            .apply_all(shop_id, query.target, &progress)
            .await
            .map(|_| ())
    });

    progress_sse(events)
}
