//! Order placement and management endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, OrderStatus, ProductId};
use domain::OrderService;
use serde::Deserialize;
use store::{Order, OrderLine, OrderUpdate, Store};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub store: S,
    pub orders: OrderService<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderLineRequest>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub status: Option<OrderStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

// -- Handlers --

/// GET /orders — the caller's orders, every order for admins, newest first.
#[tracing::instrument(skip(state, user))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state.orders.list_orders(&user.0).await?;
    Ok(Json(orders))
}

/// POST /orders — place an order from the submitted cart lines.
#[tracing::instrument(skip(state, user, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let lines: Vec<OrderLine> = req
        .items
        .iter()
        .map(|item| OrderLine {
            product_id: ProductId::from_uuid(item.product_id),
            quantity: item.quantity,
        })
        .collect();

    let order = state
        .orders
        .place_order(user.0.id, lines, req.notes)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT /orders/:id — partial update of status and/or notes.
///
/// Status changes require the admin role; the order's owner may update the
/// notes of their own order.
#[tracing::instrument(skip(state, user, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<Order>, ApiError> {
    let update = OrderUpdate {
        status: req.status,
        notes: req.notes,
    };

    let order = state
        .orders
        .update_order(&user.0, OrderId::from_uuid(id), update)
        .await?;

    Ok(Json(order))
}

/// DELETE /orders/:id — admin only; cascades to the order's lines.
#[tracing::instrument(skip(state, user))]
pub async fn remove<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .orders
        .delete_order(&user.0, OrderId::from_uuid(id))
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
