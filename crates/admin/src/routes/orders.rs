//! Supplier order and order item handlers.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
};
use serde::Deserialize;

use ivy_core::{ShopId, SupplierOrderId, SupplierOrderItemId};

use crate::error::AppError;
use crate::models::{
    AddItemEntry, CreateOrderInput, OrderItemsAction, SupplierOrder, SupplierOrderItem,
    SupplierOrderWithItems, UpdateItemInput, UpdateOrderInput,
};
use crate::services::{SupplierOrderService, UpdatedItem};
use crate::state::AppState;

/// Build the supplier order router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/shops/{shop_id}/orders",
            get(list_orders).post(create_order),
        )
        .route("/api/orders/{order_id}", get(get_order).put(update_order))
        .route("/api/orders/{order_id}/items", get(list_items).post(add_items))
        .route(
            "/api/orders/{order_id}/items/{item_id}",
            put(update_item).delete(delete_item),
        )
        .route("/api/orders/{order_id}/items/actions", post(items_action))
}

#[derive(Debug, Deserialize)]
pub struct AddItemsRequest {
    pub items: Vec<AddItemEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ItemsActionRequest {
    pub action: OrderItemsAction,
}

/// GET /api/shops/{shop_id}/orders
async fn list_orders(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
) -> Result<Json<Vec<SupplierOrder>>, AppError> {
    let orders = SupplierOrderService::new(state.services())
        .list_orders(shop_id)
        .await?;
    Ok(Json(orders))
}

/// POST /api/shops/{shop_id}/orders
async fn create_order(
    State(state): State<AppState>,
    Path(shop_id): Path<ShopId>,
    Json(input): Json<CreateOrderInput>,
) -> Result<(StatusCode, Json<SupplierOrder>), AppError> {
    let order = SupplierOrderService::new(state.services())
        .create_order(shop_id, &input)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/{order_id}
async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<SupplierOrderId>,
) -> Result<Json<SupplierOrderWithItems>, AppError> {
    let order = SupplierOrderService::new(state.services())
        .get_order(order_id)
        .await?;
    Ok(Json(order))
}

/// PUT /api/orders/{order_id}
async fn update_order(
    State(state): State<AppState>,
    Path(order_id): Path<SupplierOrderId>,
    Json(input): Json<UpdateOrderInput>,
) -> Result<Json<SupplierOrder>, AppError> {
    let order = SupplierOrderService::new(state.services())
        .update_order(order_id, input)
        .await?;
    Ok(Json(order))
}

/// GET /api/orders/{order_id}/items
async fn list_items(
    State(state): State<AppState>,
    Path(order_id): Path<SupplierOrderId>,
) -> Result<Json<Vec<SupplierOrderItem>>, AppError> {
    let order = SupplierOrderService::new(state.services())
        .get_order(order_id)
        .await?;
    Ok(Json(order.items))
}

/// POST /api/orders/{order_id}/items
async fn add_items(
    State(state): State<AppState>,
    Path(order_id): Path<SupplierOrderId>,
    Json(request): Json<AddItemsRequest>,
) -> Result<(StatusCode, Json<SupplierOrderWithItems>), AppError> {
    let order = SupplierOrderService::new(state.services())
        .add_items(order_id, &request.items)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT /api/orders/{order_id}/items/{item_id}
async fn update_item(
    State(state): State<AppState>,
    Path((order_id, item_id)): Path<(SupplierOrderId, SupplierOrderItemId)>,
    Json(update): Json<UpdateItemInput>,
) -> Result<Json<UpdatedItem>, AppError> {
    let updated = SupplierOrderService::new(state.services())
        .update_item(order_id, item_id, &update)
        .await?;
    Ok(Json(updated))
}

/// DELETE /api/orders/{order_id}/items/{item_id}
async fn delete_item(
    State(state): State<AppState>,
    Path((order_id, item_id)): Path<(SupplierOrderId, SupplierOrderItemId)>,
) -> Result<Json<SupplierOrder>, AppError> {
    let order = SupplierOrderService::new(state.services())
        .delete_item(order_id, item_id)
        .await?;
    Ok(Json(order))
}

/// POST /api/orders/{order_id}/items/actions
async fn items_action(
    State(state): State<AppState>,
    Path(order_id): Path<SupplierOrderId>,
    Json(request): Json<ItemsActionRequest>,
) -> Result<Json<SupplierOrderWithItems>, AppError> {
    let service = SupplierOrderService::new(state.services());
    let order = match request.action {
        OrderItemsAction::RecalculatePrices => service.recalculate_prices(order_id).await?,
        OrderItemsAction::RefreshMetafields => service.refresh_metafields(order_id).await?,
    };
    Ok(Json(order))
}
