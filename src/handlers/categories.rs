use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    auth::AuthRouterExt,
    entities::category,
    errors::{ApiError, ErrorResponse},
    services::category_service::CreateCategoryInput,
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Creates the router for category endpoints. Mutations require a bearer token.
pub fn categories_routes() -> Router<AppState> {
    let public = Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/roots", get(list_root_categories))
        .route("/categories/:id", get(get_category))
        .route("/categories/:id/children", get(list_children))
        .route("/categories/:id/ancestors", get(get_ancestors))
        .route("/categories/:id/descendants", get(get_descendants));

    let protected = Router::new()
        .route("/categories", axum::routing::post(create_category))
        .route("/categories/:id", axum::routing::delete(delete_category))
        .route("/categories/:id/parent", put(move_category))
        .with_auth();

    public.merge(protected)
}

/// New parent for a category; `null` makes it a root
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct MoveCategoryRequest {
    pub parent_id: Option<Uuid>,
}

/// A category together with every category below it
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct DescendantsResponse {
    pub category_id: Uuid,
    pub descendant_ids: Vec<Uuid>,
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    summary = "List categories",
    description = "All categories ordered by name",
    responses(
        (status = 200, description = "Categories retrieved", body = Vec<category::Model>),
        (status = 500, description = "Internal server error", body = ErrorResponse),
    ),
    tag = "categories"
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let categories = state
        .services
        .categories
        .list_all()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(categories))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    summary = "Create category",
    request_body = CreateCategoryInput,
    responses(
        (status = 201, description = "Category created", body = category::Model),
        (status = 400, description = "Invalid request data", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Parent category not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryInput>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;

    let category = state
        .services
        .categories
        .create(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(category))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/roots",
    summary = "List root categories",
    responses(
        (status = 200, description = "Root categories retrieved", body = Vec<category::Model>),
    ),
    tag = "categories"
)]
pub async fn list_root_categories(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let roots = state
        .services
        .categories
        .list_roots()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(roots))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}",
    summary = "Get category",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category retrieved", body = category::Model),
        (status = 404, description = "Category not found", body = ErrorResponse),
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .services
        .categories
        .get(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(category))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}/children",
    summary = "List direct children",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Children retrieved", body = Vec<category::Model>),
        (status = 404, description = "Category not found", body = ErrorResponse),
    ),
    tag = "categories"
)]
pub async fn list_children(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let children = state
        .services
        .categories
        .list_children(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(children))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}/ancestors",
    summary = "Breadcrumb",
    description = "Ancestor chain from the root down to and including the category",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Ancestor chain retrieved", body = Vec<category::Model>),
        (status = 404, description = "Category not found", body = ErrorResponse),
    ),
    tag = "categories"
)]
pub async fn get_ancestors(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let chain = state
        .services
        .categories
        .get_ancestor_chain(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(chain))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/{id}/descendants",
    summary = "Descendant ids",
    description = "Ids of the category itself and every category below it",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Descendants retrieved", body = DescendantsResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
    ),
    tag = "categories"
)]
pub async fn get_descendants(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let ids = state
        .services
        .categories
        .get_descendant_ids(id)
        .await
        .map_err(map_service_error)?;

    let mut descendant_ids: Vec<Uuid> = ids.into_iter().collect();
    descendant_ids.sort();

    Ok(success_response(DescendantsResponse {
        category_id: id,
        descendant_ids,
    }))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/{id}/parent",
    summary = "Move category",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = MoveCategoryRequest,
    responses(
        (status = 200, description = "Category moved", body = category::Model),
        (status = 400, description = "Move would create a cycle", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn move_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MoveCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state
        .services
        .categories
        .move_category(id, payload.parent_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(category))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    summary = "Delete category",
    description = "Children move up to the deleted category's parent; products stay",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .categories
        .delete(id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
