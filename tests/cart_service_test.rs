mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use storefront_api::{
    entities::{cart, cart_item},
    errors::ServiceError,
    services::cart_service::{AddToCartInput, ReplaceCartItem, SetQuantityInput},
};
use uuid::Uuid;

#[tokio::test]
async fn concurrent_first_access_creates_one_cart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("carts.db").display());
    let app = TestApp::with_database_url(&url).await;
    let user = Uuid::new_v4();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let carts = app.state.services.carts.clone();
            tokio::spawn(async move { carts.get_or_create_for_user(user).await })
        })
        .collect();

    let mut cart_ids = Vec::new();
    for result in futures::future::join_all(handles).await {
        cart_ids.push(result.expect("task panicked").expect("cart").id);
    }
    cart_ids.dedup();
    assert_eq!(cart_ids.len(), 1);

    let rows = cart::Entity::find()
        .filter(cart::Column::UserId.eq(user))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn adding_same_product_twice_sums_quantity() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let user = Uuid::new_v4();
    let mug = app.seed_product("Mug", dec!(7.5), vec![]).await.product;

    carts
        .add_item(user, AddToCartInput { product_id: mug.id, quantity: 2 })
        .await
        .unwrap();
    let cart = carts
        .add_item(user, AddToCartInput { product_id: mug.id, quantity: 3 })
        .await
        .unwrap();

    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 5);
    assert_eq!(cart.total, dec!(37.5));

    let lines = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart.cart.id))
        .count(&*app.state.db)
        .await
        .unwrap();
    assert_eq!(lines, 1);
}

#[tokio::test]
async fn carts_are_isolated_per_user() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let pen = app.seed_product("Pen", dec!(1), vec![]).await.product;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();

    carts
        .add_item(alice, AddToCartInput { product_id: pen.id, quantity: 1 })
        .await
        .unwrap();

    assert!(carts.get_cart(bob).await.unwrap().items.is_empty());
    assert_eq!(carts.get_cart(alice).await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn quantity_updates_and_removal() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let user = Uuid::new_v4();
    let book = app.seed_product("Book", dec!(12), vec![]).await.product;

    assert_matches!(
        carts
            .set_item_quantity(user, SetQuantityInput { product_id: book.id, quantity: 2 })
            .await,
        Err(ServiceError::NotFound(_))
    );

    carts
        .add_item(user, AddToCartInput { product_id: book.id, quantity: 1 })
        .await
        .unwrap();
    let cart = carts
        .set_item_quantity(user, SetQuantityInput { product_id: book.id, quantity: 4 })
        .await
        .unwrap();
    assert_eq!(cart.items[0].quantity, 4);

    assert_matches!(
        carts
            .set_item_quantity(user, SetQuantityInput { product_id: book.id, quantity: 0 })
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let cart = carts.remove_item(user, book.id).await.unwrap();
    assert!(cart.items.is_empty());
    assert_matches!(
        carts.remove_item(user, book.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn replace_with_empty_list_empties_cart() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let user = Uuid::new_v4();
    let a = app.seed_product("A", dec!(1), vec![]).await.product;
    let b = app.seed_product("B", dec!(2), vec![]).await.product;
    for product_id in [a.id, b.id] {
        carts
            .add_item(user, AddToCartInput { product_id, quantity: 1 })
            .await
            .unwrap();
    }

    let cart = carts.replace_items(user, vec![]).await.unwrap();
    assert!(cart.items.is_empty());

    // the cart row itself survives
    let again = carts.get_or_create_for_user(user).await.unwrap();
    assert_eq!(again.id, cart.cart.id);
}

#[tokio::test]
async fn replace_reconciles_existing_and_new_lines() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let user = Uuid::new_v4();
    let keep = app.seed_product("Keep", dec!(3), vec![]).await.product;
    let drop = app.seed_product("Drop", dec!(4), vec![]).await.product;
    let merge = app.seed_product("Merge", dec!(5), vec![]).await.product;
    let fresh = app.seed_product("Fresh", dec!(6), vec![]).await.product;

    let mut cart = carts.get_cart(user).await.unwrap();
    for product_id in [keep.id, drop.id, merge.id] {
        cart = carts
            .add_item(user, AddToCartInput { product_id, quantity: 1 })
            .await
            .unwrap();
    }
    let keep_line = cart
        .items
        .iter()
        .find(|line| line.product_id == keep.id)
        .unwrap()
        .id;

    let cart = carts
        .replace_items(
            user,
            vec![
                ReplaceCartItem { id: Some(keep_line), product_id: None, quantity: Some(7) },
                ReplaceCartItem { id: None, product_id: Some(merge.id), quantity: Some(2) },
                ReplaceCartItem { id: None, product_id: Some(fresh.id), quantity: None },
            ],
        )
        .await
        .unwrap();

    let mut lines: Vec<(String, i32)> = cart
        .items
        .iter()
        .map(|line| (line.product_name.clone(), line.quantity))
        .collect();
    lines.sort();
    assert_eq!(
        lines,
        vec![
            ("Fresh".to_string(), 1),
            ("Keep".to_string(), 7),
            ("Merge".to_string(), 2),
        ]
    );
}

#[tokio::test]
async fn replace_with_bad_entry_changes_nothing() {
    let app = TestApp::new().await;
    let carts = &app.state.services.carts;
    let user = Uuid::new_v4();
    let a = app.seed_product("A", dec!(1), vec![]).await.product;
    carts
        .add_item(user, AddToCartInput { product_id: a.id, quantity: 3 })
        .await
        .unwrap();

    assert_matches!(
        carts
            .replace_items(
                user,
                vec![ReplaceCartItem { id: Some(Uuid::new_v4()), product_id: None, quantity: Some(1) }],
            )
            .await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        carts
            .replace_items(
                user,
                vec![ReplaceCartItem { id: None, product_id: None, quantity: Some(1) }],
            )
            .await,
        Err(ServiceError::ValidationError(_))
    );

    let cart = carts.get_cart(user).await.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 3);
}

#[tokio::test]
async fn adding_unknown_product_is_not_found() {
    let app = TestApp::new().await;
    assert_matches!(
        app.state
            .services
            .carts
            .add_item(
                Uuid::new_v4(),
                AddToCartInput { product_id: Uuid::new_v4(), quantity: 1 }
            )
            .await,
        Err(ServiceError::NotFound(_))
    );
}
