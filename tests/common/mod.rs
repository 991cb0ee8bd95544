#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use storefront_api::{
    auth::AuthService,
    config::AppConfig,
    db,
    entities::category,
    events::{self, EventSender},
    services::product_catalog_service::{CreateProductInput, ProductWithCategories},
    services::category_service::CreateCategoryInput,
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Helper harness for spinning up an application state backed by SQLite.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub user_id: Uuid,
    token: String,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Fresh in-memory database with migrations applied.
    pub async fn new() -> Self {
        Self::with_database_url("sqlite::memory:").await
    }

    /// Application over an arbitrary database, e.g. a temp-file SQLite
    /// database when a test needs several pooled connections.
    pub async fn with_database_url(url: &str) -> Self {
        let mut cfg = AppConfig::new(
            url.to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.cors_allow_any_origin = true;
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_sender, event_rx) = EventSender::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState::new(Arc::new(pool), cfg, Arc::new(event_sender));
        let router = storefront_api::build_router(state.clone()).expect("router builds");

        let user_id = Uuid::new_v4();
        let token = state
            .auth_service()
            .issue_token(user_id)
            .expect("issue test token");

        Self {
            router,
            state,
            user_id,
            token,
            _event_task: event_task,
        }
    }

    pub fn auth_service(&self) -> Arc<AuthService> {
        self.state.auth_service()
    }

    /// Bearer token for [`TestApp::user_id`].
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Bearer token for some other user.
    pub fn token_for(&self, user_id: Uuid) -> String {
        self.auth_service()
            .issue_token(user_id)
            .expect("issue test token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    pub async fn seed_category(&self, name: &str, parent_id: Option<Uuid>) -> category::Model {
        self.state
            .services
            .categories
            .create(CreateCategoryInput {
                name: name.to_string(),
                parent_id,
            })
            .await
            .expect("seed category for tests")
    }

    pub async fn seed_product(
        &self,
        name: &str,
        price: Decimal,
        category_ids: Vec<Uuid>,
    ) -> ProductWithCategories {
        self.state
            .services
            .products
            .create(CreateProductInput {
                name: name.to_string(),
                description: format!("{} seeded for integration tests", name),
                price,
                category_ids,
            })
            .await
            .expect("seed product for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Reads a response body as JSON.
pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
