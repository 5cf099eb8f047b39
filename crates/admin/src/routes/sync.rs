//! Inventory sync, streamed as server-sent events.

use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, Query, State},
    response::{Sse, sse::Event},
    routing::post,
};
use futures::Stream;
use serde::Deserialize;

use ivy_core::ShopId;

use super::sse::progress_sse;
use crate::services::{spawn_with_progress, sync_inventory};
use crate::state::AppState;

/// Build the sync router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/shops/{shop_id}/sync/inventory", post(sync))
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    pub product_type: Option<String>,
}

/// POST /api/shops/{shop_id}/sync/inventory
///
/// The sync keeps running if the client disconnects.
async fn sync(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
    Query(query): Query<SyncQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ctx = state.services().clone();

    let events = spawn_with_progress(move |progress| async move {
        sync_inventory(&ctx, shop_id, query.product_type.as_deref(), &progress)
            .await
            .map(|_| ())
    });

    progress_sse(events)
}
