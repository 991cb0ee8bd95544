use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        version = "1.0.0",
        description = r#"
# Storefront API

Hierarchical product catalog, per-user shopping carts and order placement.

## Authentication

Catalog reads are public. Catalog mutations and every cart and order
endpoint require a bearer token whose `sub` claim is the user's UUID:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Failures share one JSON shape:

```json
{
  "error": "Not Found",
  "message": "Not found: Product 550e8400-e29b-41d4-a716-446655440000 not found",
  "request_id": "a6f2c1b0-1d1e-4b7e-9a57-0f0f0f0f0f0f",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

`GET /products` accepts `page` (1-based) and `per_page` (capped by the server).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "categories", description = "Category tree"),
        (name = "products", description = "Product catalog"),
        (name = "cart", description = "The caller's shopping cart"),
        (name = "orders", description = "Order placement and history"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Categories
        crate::handlers::categories::list_categories,
        crate::handlers::categories::create_category,
        crate::handlers::categories::list_root_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::list_children,
        crate::handlers::categories::get_ancestors,
        crate::handlers::categories::get_descendants,
        crate::handlers::categories::move_category,
        crate::handlers::categories::delete_category,

        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::products::products_by_category,
        crate::handlers::products::filter_by_price_category,

        // Cart
        crate::handlers::carts::get_cart,
        crate::handlers::carts::add_to_cart,
        crate::handlers::carts::replace_cart,
        crate::handlers::carts::update_cart_item,
        crate::handlers::carts::remove_cart_item,
        crate::handlers::carts::clear_cart,

        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,

        // Health
        crate::health::health_check,
        crate::health::liveness_check,
        crate::health::readiness_check,
    ),
    components(
        schemas(
            crate::entities::category::Model,
            crate::entities::product::Model,
            crate::entities::cart::Model,
            crate::entities::cart_item::Model,
            crate::entities::order::Model,
            crate::entities::order_item::Model,
            crate::services::category_service::CreateCategoryInput,
            crate::services::product_catalog_service::CreateProductInput,
            crate::services::product_catalog_service::UpdateProductInput,
            crate::services::product_catalog_service::ProductWithCategories,
            crate::services::product_catalog_service::ProductPage,
            crate::services::cart_service::AddToCartInput,
            crate::services::cart_service::SetQuantityInput,
            crate::services::cart_service::ReplaceCartItem,
            crate::services::cart_service::CartLine,
            crate::services::cart_service::CartWithItems,
            crate::services::order_service::OrderWithItems,
            crate::handlers::categories::MoveCategoryRequest,
            crate::handlers::categories::DescendantsResponse,
            crate::handlers::products::ByCategoryRequest,
            crate::health::HealthInfo,
            crate::health::HealthStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

/// Registers the `Bearer` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "Bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
