// Catalog
pub mod category_service;
pub mod product_catalog_service;

// Cart and order lifecycle
pub mod cart_service;
pub mod order_service;

pub use cart_service::CartService;
pub use category_service::CategoryService;
pub use order_service::OrderService;
pub use product_catalog_service::ProductCatalogService;

use crate::errors::ServiceError;
use rust_decimal::Decimal;

/// `price * quantity`, rejecting results outside the decimal range.
pub(crate) fn line_total(price: Decimal, quantity: i32) -> Result<Decimal, ServiceError> {
    price.checked_mul(Decimal::from(quantity)).ok_or_else(|| {
        ServiceError::ValidationError(format!(
            "Line total for {} x {} is out of range",
            price, quantity
        ))
    })
}

/// Sum of line totals, rejecting overflow.
pub(crate) fn sum_totals(
    totals: impl IntoIterator<Item = Decimal>,
) -> Result<Decimal, ServiceError> {
    totals.into_iter().try_fold(Decimal::ZERO, |acc, total| {
        acc.checked_add(total)
            .ok_or_else(|| ServiceError::ValidationError("Total is out of range".to_string()))
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::events::{process_events, EventSender};
    use sea_orm::DatabaseConnection;
    use std::sync::Arc;

    /// Services wired to a fresh in-memory SQLite database.
    pub struct TestContext {
        pub db: Arc<DatabaseConnection>,
        pub categories: CategoryService,
        pub products: ProductCatalogService,
        pub carts: CartService,
        pub orders: OrderService,
    }

    impl TestContext {
        pub async fn new() -> Self {
            let db = crate::db::establish_connection("sqlite::memory:")
                .await
                .expect("in-memory database");
            crate::db::run_migrations(&db).await.expect("migrations");
            let db = Arc::new(db);

            let (sender, rx) = EventSender::channel(64);
            tokio::spawn(process_events(rx));
            let events = Arc::new(sender);

            Self {
                categories: CategoryService::new(db.clone(), events.clone()),
                products: ProductCatalogService::new(db.clone(), events.clone()),
                carts: CartService::new(db.clone(), events.clone()),
                orders: OrderService::new(db.clone(), events),
                db,
            }
        }
    }
}
