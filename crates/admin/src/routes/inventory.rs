//! Inventory statistics.

use std::collections::HashMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};

use ivy_core::stats::{InventoryStats, compute_stats};
use ivy_core::{LocationId, ShopId};

use crate::db::CatalogRepository;
use crate::error::AppError;
use crate::services::{ColorPalette, ColorSwatch};
use crate::state::AppState;

/// Build the inventory router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/shops/{shop_id}/inventory/stats", get(stats))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub location_id: Option<LocationId>,
}

/// Stock statistics plus a swatch for every mapped color group.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: InventoryStats,
    pub color_swatches: HashMap<String, ColorSwatch>,
}

/// GET /api/shops/{shop_id}/inventory/stats
async fn stats(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let services = state.services();
    services.load_shop(shop_id).await?;

    let rows = CatalogRepository::new(state.pool())
        .stock_rows(shop_id, query.location_id)
        .await?;
    let stats = compute_stats(&rows);

    let palette = ColorPalette::load(services, shop_id).await?;
    let color_swatches = palette.swatches_for(stats.by_color.iter().map(|g| g.key.as_str()));

    Ok(Json(StatsResponse {
        stats,
        color_swatches,
    }))
}
