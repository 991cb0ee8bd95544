use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
    PaginationParams,
};
use crate::{
    auth::AuthRouterExt,
    entities::product,
    errors::{ApiError, ErrorResponse},
    services::product_catalog_service::{
        CreateProductInput, ProductPage, ProductWithCategories, UpdateProductInput,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Creates the router for product endpoints. Mutations require a bearer token.
pub fn products_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/products", get(list_products))
        .route("/products/by_category", post(products_by_category))
        .route(
            "/products/filter_by_price_category",
            get(filter_by_price_category),
        )
        .route("/products/:id", get(get_product));

    let protected = Router::new()
        .route("/products", post(create_product))
        .route(
            "/products/:id",
            put(update_product).delete(delete_product),
        )
        .with_auth();

    public.merge(protected)
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct ByCategoryRequest {
    pub category_id: Uuid,
}

/// Inclusive price bounds, optionally restricted to a category subtree
#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PriceCategoryFilter {
    #[param(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[param(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    pub category_id: Option<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    description = "Paginated catalog ordered by name",
    params(PaginationParams),
    responses(
        (status = 200, description = "Products retrieved", body = ProductPage),
        (status = 400, description = "Invalid pagination", body = ErrorResponse),
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = params.page()?;
    let per_page = state.config.page_size(params.per_page);

    let products = state
        .services
        .products
        .list(page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(products))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create product",
    request_body = CreateProductInput,
    responses(
        (status = 201, description = "Product created", body = ProductWithCategories),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .products
        .create(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get product",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product retrieved", body = ProductWithCategories),
        (status = 404, description = "Product not found", body = ErrorResponse),
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .products
        .get(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    summary = "Update product",
    description = "Absent fields are left unchanged; `category_ids` replaces the whole set",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductInput,
    responses(
        (status = 200, description = "Product updated", body = ProductWithCategories),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .products
        .update(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/{id}",
    summary = "Delete product",
    description = "Removes the product from every cart and category; past orders keep their snapshot",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Product not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .products
        .delete(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

#[utoipa::path(
    post,
    path = "/api/v1/products/by_category",
    summary = "Products in a category subtree",
    request_body = ByCategoryRequest,
    responses(
        (status = 200, description = "Matching products", body = Vec<product::Model>),
        (status = 404, description = "Category not found", body = ErrorResponse),
    ),
    tag = "products"
)]
pub async fn products_by_category(
    State(state): State<AppState>,
    Json(payload): Json<ByCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .products
        .filter_by_category(payload.category_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(products))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/filter_by_price_category",
    summary = "Filter by price and category",
    params(PriceCategoryFilter),
    responses(
        (status = 200, description = "Matching products", body = Vec<product::Model>),
        (status = 400, description = "Invalid price bounds", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
    ),
    tag = "products"
)]
pub async fn filter_by_price_category(
    State(state): State<AppState>,
    Query(filter): Query<PriceCategoryFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let products = state
        .services
        .products
        .filter_by_price_range(filter.min_price, filter.max_price, filter.category_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(products))
}
