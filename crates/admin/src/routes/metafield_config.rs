//! Metafield configuration handlers.
//!
//! Entries name the variant metafields copied onto supplier order items and
//! the label each is stored under.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};

use ivy_core::{MetafieldConfigId, ShopId};

use crate::db::MetafieldConfigRepository;
use crate::error::AppError;
use crate::models::{CreateMetafieldConfigInput, MetafieldConfig};
use crate::state::AppState;

/// Build the metafield configuration router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/shops/{shop_id}/metafield-config",
            get(list_config).post(create_config),
        )
        .route("/api/metafield-config/{id}", delete(delete_config))
}

async fn list_config(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
) -> Result<Json<Vec<MetafieldConfig>>, AppError> {
    let config = MetafieldConfigRepository::new(state.pool())
        .list(shop_id)
        .await?;
    Ok(Json(config))
}

async fn create_config(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
    Json(input): Json<CreateMetafieldConfigInput>,
) -> Result<(StatusCode, Json<MetafieldConfig>), AppError> {
    if input.namespace.trim().is_empty() || input.key.trim().is_empty() {
        return Err(AppError::BadRequest(
            "namespace and key are required".to_string(),
        ));
    }
    state.services().load_shop(shop_id).await?;

    let entry = MetafieldConfigRepository::new(state.pool())
        .create(shop_id, &input)
        .await?;
    tracing::info!(shop_id = %shop_id, metafield = %entry.metafield_key(), "Metafield configured");
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete_config(
    State(state): State<AppState>,
    Path(id): Path<MetafieldConfigId>,
) -> Result<StatusCode, AppError> {
    MetafieldConfigRepository::new(state.pool())
        .delete(id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
