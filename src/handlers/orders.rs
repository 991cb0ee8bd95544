use crate::handlers::common::{created_response, map_service_error, success_response};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::{ApiError, ErrorResponse},
    services::order_service::OrderWithItems,
    AppState,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use uuid::Uuid;

/// Creates the router for the caller's orders. Every route requires a bearer token.
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/order", get(list_orders).post(create_order))
        .route("/order/:id", get(get_order))
        .with_auth()
}

#[utoipa::path(
    post,
    path = "/api/v1/order",
    summary = "Place order",
    description = "Turns the caller's cart into an order and empties the cart",
    responses(
        (status = 201, description = "Order created", body = OrderWithItems,
            headers(("X-Request-Id" = String, description = "Unique request id"))
        ),
        (status = 400, description = "Cart is empty", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 409, description = "Cart changed during checkout", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .create_from_cart(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}

#[utoipa::path(
    get,
    path = "/api/v1/order",
    summary = "List orders",
    description = "The caller's orders, newest first",
    responses(
        (status = 200, description = "Orders retrieved", body = Vec<OrderWithItems>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_for_user(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/v1/order/{id}",
    summary = "Get order",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved", body = OrderWithItems),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Order not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get(user.user_id, id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}
