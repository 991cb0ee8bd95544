pub mod carts;
pub mod categories;
pub mod common;
pub mod orders;
pub mod products;

use crate::{
    auth::AuthService,
    db::DbPool,
    events::EventSender,
    services::{CartService, CategoryService, OrderService, ProductCatalogService},
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductCatalogService>,
    pub carts: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub auth: Arc<AuthService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, auth: Arc<AuthService>) -> Self {
        Self {
            categories: Arc::new(CategoryService::new(db.clone(), event_sender.clone())),
            products: Arc::new(ProductCatalogService::new(
                db.clone(),
                event_sender.clone(),
            )),
            carts: Arc::new(CartService::new(db.clone(), event_sender.clone())),
            orders: Arc::new(OrderService::new(db, event_sender)),
            auth,
        }
    }
}
