//--------------------------------------------------------------------------------------------------
// FUNCTIONS
//--------------------------------------------------------------------------------------------------
// | Name                  | Description                            | Return Type         |
// |-----------------------|----------------------------------------|---------------------|
// | health                | Health check endpoint                  | Json                |
// | create_order          | Validate and publish a new order       | ApiResult<Response> |
// | get_order             | Get details of a persisted order       | ApiResult<Response> |
// | get_all_orders        | List persisted orders, newest first    | ApiResult<Response> |
// | update_order_status   | Move an order to another status        | ApiResult<Response> |
// | delete_order          | Delete an order and its items          | ApiResult<Response> |
//--------------------------------------------------------------------------------------------------

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Extension, Path,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use super::{ApiError, ApiResult, AppState, HealthResponse, UpdateOrderStatusRequest};
use crate::domain::models::CreateOrderRequest;

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}

/// Validate, price and publish a new order
pub async fn create_order(
    Extension(state): Extension<Arc<AppState>>,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body?;

    let order = state.order_service.create_order(request).await?;

    let location = format!("/api/orders/{}", order.id);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(order)).into_response())
}

/// Get details of a persisted order
pub async fn get_order(
    Extension(state): Extension<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Response> {
    let Path(order_id) = path?;

    let order = state
        .order_service
        .get_order_by_id(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {} not found", order_id)))?;

    Ok((StatusCode::OK, Json(order)).into_response())
}

/// List persisted orders, newest first
pub async fn get_all_orders(Extension(state): Extension<Arc<AppState>>) -> ApiResult<Response> {
    let orders = state.order_service.get_all_orders().await?;
    Ok((StatusCode::OK, Json(orders)).into_response())
}

/// Move an order to another status
pub async fn update_order_status(
    Extension(state): Extension<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<UpdateOrderStatusRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Path(order_id) = path?;
    let Json(request) = body?;

    if !state
        .order_service
        .update_order_status(order_id, &request.status)
        .await?
    {
        return Err(ApiError::NotFound(format!("Order {} not found", order_id)));
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Delete an order and its items
pub async fn delete_order(
    Extension(state): Extension<Arc<AppState>>,
    path: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Response> {
    let Path(order_id) = path?;

    if !state.order_service.delete_order(order_id).await? {
        return Err(ApiError::NotFound(format!("Order {} not found", order_id)));
    }

    Ok(StatusCode::NO_CONTENT.into_response())
}
