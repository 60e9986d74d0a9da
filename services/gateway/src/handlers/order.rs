use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::models::{
    CreateOrderRequest, OrderResponse, OrderbookQuery, OrderbookResponse, OrdersQuery,
    OrdersResponse,
};
use crate::rate_limit::Endpoint;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use types::prelude::*;
use uuid::Uuid;

pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    state
        .rate_limiter
        .check(user.user_id, Endpoint::OrderPlacement)?;

    let symbol = Symbol::parse(&payload.symbol).ok_or_else(|| {
        AppError::UnprocessableEntity(format!("unsupported symbol: {}", payload.symbol))
    })?;
    let side = Side::parse(&payload.side).ok_or_else(|| {
        AppError::UnprocessableEntity(format!("unsupported side: {}", payload.side))
    })?;
    let price = Amount::parse(&payload.price)
        .map_err(|err| AppError::UnprocessableEntity(format!("invalid price: {err}")))?;
    let amount = Amount::parse(&payload.amount)
        .map_err(|err| AppError::UnprocessableEntity(format!("invalid amount: {err}")))?;

    let order = state
        .orders
        .create_order(user.user_id, symbol, side, price, amount)
        .await
        .map_err(AppError::from)?;

    Ok((StatusCode::CREATED, Json(OrderResponse { order })))
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<OrdersResponse>, AppError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(OrderStatus::parse(raw).ok_or_else(|| {
            AppError::UnprocessableEntity(format!("unsupported status filter: {raw}"))
        })?),
    };

    let orders = state.orders.orders_for(user.user_id, status);
    Ok(Json(OrdersResponse { orders }))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    state.rate_limiter.check(user.user_id, Endpoint::OrderCancel)?;

    let order_id = Uuid::parse_str(&id)
        .map(OrderId::from_uuid)
        .map_err(|_| AppError::NotFound(format!("order not found: {id}")))?;

    let order = state
        .orders
        .cancel_order(order_id, user.user_id)
        .await
        .map_err(AppError::from)?;

    Ok(Json(OrderResponse { order }))
}

pub async fn orderbook(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(query): Query<OrderbookQuery>,
) -> Result<Json<OrderbookResponse>, AppError> {
    let symbol = Symbol::parse(&query.symbol).ok_or_else(|| {
        AppError::UnprocessableEntity(format!("unsupported symbol: {}", query.symbol))
    })?;

    Ok(Json(OrderbookResponse {
        book: state.orders.orderbook(symbol),
    }))
}
