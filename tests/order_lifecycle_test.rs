mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};
use storefront_api::{
    entities::{order, order_item},
    errors::ServiceError,
    services::cart_service::AddToCartInput,
};
use uuid::Uuid;

#[tokio::test]
async fn checkout_of_empty_cart_creates_no_order() {
    let app = TestApp::new().await;
    let user = Uuid::new_v4();

    assert_matches!(
        app.state.services.orders.create_from_cart(user).await,
        Err(ServiceError::InvalidState(_))
    );
    assert_eq!(order::Entity::find().count(&*app.state.db).await.unwrap(), 0);
}

#[tokio::test]
async fn order_outlives_deleted_product() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let user = Uuid::new_v4();
    let a = app.seed_product("A", dec!(10), vec![]).await.product;
    let b = app.seed_product("B", dec!(2.5), vec![]).await.product;

    services
        .carts
        .add_item(user, AddToCartInput { product_id: a.id, quantity: 2 })
        .await
        .unwrap();
    services
        .carts
        .add_item(user, AddToCartInput { product_id: b.id, quantity: 1 })
        .await
        .unwrap();

    let placed = services.orders.create_from_cart(user).await.unwrap();
    let mut lines: Vec<(String, i32)> = placed
        .items
        .iter()
        .map(|line| (line.product_name.clone(), line.quantity))
        .collect();
    lines.sort();
    assert_eq!(lines, vec![("A".to_string(), 2), ("B".to_string(), 1)]);
    assert_eq!(placed.total, dec!(22.5));

    assert!(services.carts.get_cart(user).await.unwrap().items.is_empty());

    services.products.delete(a.id).await.unwrap();

    let stored = services.orders.get(user, placed.order.id).await.unwrap();
    assert_eq!(stored.items.len(), 2);
    let line_a = stored
        .items
        .iter()
        .find(|line| line.product_name == "A")
        .unwrap();
    assert_eq!(line_a.product_id, None);
    assert_eq!(line_a.unit_price, dec!(10));
    assert_eq!(line_a.quantity, 2);
    assert_eq!(stored.total, dec!(22.5));

    assert_eq!(
        order_item::Entity::find().count(&*app.state.db).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn order_prices_are_frozen_at_checkout() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let user = Uuid::new_v4();
    let lamp = app.seed_product("Lamp", dec!(40), vec![]).await.product;

    services
        .carts
        .add_item(user, AddToCartInput { product_id: lamp.id, quantity: 1 })
        .await
        .unwrap();
    let placed = services.orders.create_from_cart(user).await.unwrap();

    services
        .products
        .update(
            lamp.id,
            storefront_api::services::product_catalog_service::UpdateProductInput {
                price: Some(dec!(55)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stored = services.orders.get(user, placed.order.id).await.unwrap();
    assert_eq!(stored.items[0].unit_price, dec!(40));
}

#[tokio::test]
async fn order_history_is_newest_first_and_private() {
    let app = TestApp::new().await;
    let services = &app.state.services;
    let user = Uuid::new_v4();
    let item = app.seed_product("Item", dec!(1), vec![]).await.product;

    let mut placed = Vec::new();
    for _ in 0..3 {
        services
            .carts
            .add_item(user, AddToCartInput { product_id: item.id, quantity: 1 })
            .await
            .unwrap();
        placed.push(services.orders.create_from_cart(user).await.unwrap().order.id);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let history: Vec<Uuid> = services
        .orders
        .list_for_user(user)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.order.id)
        .collect();
    placed.reverse();
    assert_eq!(history, placed);

    assert!(services
        .orders
        .list_for_user(Uuid::new_v4())
        .await
        .unwrap()
        .is_empty());
    assert_matches!(
        services.orders.get(Uuid::new_v4(), placed[0]).await,
        Err(ServiceError::NotFound(_))
    );
}
