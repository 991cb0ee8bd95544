use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::{ApiError, ErrorResponse},
    services::cart_service::{AddToCartInput, CartWithItems, ReplaceCartItem, SetQuantityInput},
    AppState,
};
use axum::{
    extract::{Json, Query, State},
    response::IntoResponse,
    routing::{delete, get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;

/// Creates the router for the caller's cart. Every route requires a bearer token.
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/cart",
            get(get_cart)
                .post(add_to_cart)
                .put(replace_cart)
                .delete(clear_cart),
        )
        .route("/cart/update_item", put(update_cart_item))
        .route("/cart/remove_item", delete(remove_cart_item))
        .with_auth()
}

#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RemoveItemParams {
    pub product_id: Uuid,
}

#[utoipa::path(
    get,
    path = "/api/v1/cart",
    summary = "Get cart",
    description = "The caller's cart; created on first access",
    responses(
        (status = 200, description = "Cart retrieved", body = CartWithItems),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .get_cart(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    post,
    path = "/api/v1/cart",
    summary = "Add to cart",
    description = "Adds the product or increments the quantity of its existing line",
    request_body = AddToCartInput,
    responses(
        (status = 200, description = "Item added", body = CartWithItems),
        (status = 400, description = "Invalid quantity", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .carts
        .add_item(user.user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart",
    summary = "Replace cart contents",
    description = "Applies every entry, then removes lines that no entry mentioned. All or nothing.",
    request_body = Vec<ReplaceCartItem>,
    responses(
        (status = 200, description = "Cart replaced", body = CartWithItems),
        (status = 400, description = "Invalid entry", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Line or product not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn replace_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<Vec<ReplaceCartItem>>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .replace_items(user.user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    put,
    path = "/api/v1/cart/update_item",
    summary = "Set line quantity",
    request_body = SetQuantityInput,
    responses(
        (status = 200, description = "Quantity updated", body = CartWithItems),
        (status = 400, description = "Invalid quantity", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Product not in cart", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SetQuantityInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .carts
        .set_item_quantity(user.user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/remove_item",
    summary = "Remove line",
    params(RemoveItemParams),
    responses(
        (status = 200, description = "Line removed", body = CartWithItems),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Product not in cart", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<RemoveItemParams>,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .remove_item(user.user_id, params.product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    summary = "Clear cart",
    responses(
        (status = 200, description = "Cart emptied", body = CartWithItems),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .clear(user.user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}
