mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use storefront_api::{errors::ServiceError, services::product_catalog_service::UpdateProductInput};
use uuid::Uuid;

fn ids(products: &[storefront_api::entities::product::Model]) -> HashSet<Uuid> {
    products.iter().map(|p| p.id).collect()
}

#[tokio::test]
async fn filtering_by_ancestor_finds_deeply_tagged_product() {
    let app = TestApp::new().await;
    let electronics = app.seed_category("Electronics", None).await;
    let laptops = app.seed_category("Laptops", Some(electronics.id)).await;
    let gaming = app.seed_category("Gaming Laptops", Some(laptops.id)).await;
    let rig = app
        .seed_product("Gaming Rig", dec!(2500), vec![gaming.id])
        .await;

    let found = app
        .state
        .services
        .products
        .filter_by_category(electronics.id)
        .await
        .unwrap();

    assert_eq!(ids(&found), HashSet::from([rig.product.id]));
}

#[tokio::test]
async fn leaf_results_are_subset_of_parent_results() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;
    let parent = app.seed_category("Audio", None).await;
    let leaf = app.seed_category("Headphones", Some(parent.id)).await;
    let sibling = app.seed_category("Speakers", Some(parent.id)).await;

    let both = app
        .seed_product("Combo", dec!(300), vec![leaf.id, sibling.id])
        .await;
    let only_leaf = app.seed_product("Buds", dec!(80), vec![leaf.id]).await;
    let only_parent = app.seed_product("Cable", dec!(10), vec![parent.id]).await;

    let leaf_hits = products.filter_by_category(leaf.id).await.unwrap();
    let parent_hits = products.filter_by_category(parent.id).await.unwrap();

    assert_eq!(
        ids(&leaf_hits),
        HashSet::from([both.product.id, only_leaf.product.id])
    );
    assert!(ids(&leaf_hits).is_subset(&ids(&parent_hits)));
    assert!(ids(&parent_hits).contains(&only_parent.product.id));
    // tagged twice inside the subtree, listed once
    assert_eq!(parent_hits.len(), 3);
}

#[tokio::test]
async fn filter_by_missing_category_is_not_found() {
    let app = TestApp::new().await;
    assert_matches!(
        app.state
            .services
            .products
            .filter_by_category(Uuid::new_v4())
            .await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn price_range_is_inclusive_and_respects_category() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;
    let books = app.seed_category("Books", None).await;
    let cheap = app.seed_product("Pamphlet", dec!(5), vec![books.id]).await;
    let mid = app.seed_product("Novel", dec!(20), vec![books.id]).await;
    let pricey = app.seed_product("Atlas", dec!(80), vec![books.id]).await;
    let untagged = app.seed_product("Lamp", dec!(20), vec![]).await;

    let in_range = products
        .filter_by_price_range(Some(dec!(5)), Some(dec!(20)), None)
        .await
        .unwrap();
    assert_eq!(
        ids(&in_range),
        HashSet::from([cheap.product.id, mid.product.id, untagged.product.id])
    );

    let in_books = products
        .filter_by_price_range(Some(dec!(20)), None, Some(books.id))
        .await
        .unwrap();
    assert_eq!(
        ids(&in_books),
        HashSet::from([mid.product.id, pricey.product.id])
    );
}

#[tokio::test]
async fn invalid_price_bounds_are_rejected() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;

    assert_matches!(
        products
            .filter_by_price_range(Some(dec!(50)), Some(dec!(10)), None)
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        products
            .filter_by_price_range(Some(dec!(-1)), None, None)
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn update_replaces_category_set() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;
    let a = app.seed_category("A", None).await;
    let b = app.seed_category("B", None).await;
    let product = app.seed_product("Widget", dec!(3), vec![a.id]).await;

    let updated = products
        .update(
            product.product.id,
            UpdateProductInput {
                price: Some(dec!(4.5)),
                category_ids: Some(vec![b.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.product.price, dec!(4.5));
    assert_eq!(updated.product.name, "Widget");
    assert_eq!(updated.category_ids, vec![b.id]);
    assert!(products
        .filter_by_category(a.id)
        .await
        .unwrap()
        .is_empty());

    assert_matches!(
        products
            .update(
                product.product.id,
                UpdateProductInput {
                    category_ids: Some(vec![Uuid::new_v4()]),
                    ..Default::default()
                },
            )
            .await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn listing_is_paginated_by_name() {
    let app = TestApp::new().await;
    for name in ["Delta", "Alpha", "Charlie", "Bravo", "Echo"] {
        app.seed_product(name, dec!(1), vec![]).await;
    }

    let page = app.state.services.products.list(2, 2).await.unwrap();
    assert_eq!(page.total, 5);
    let names: Vec<&str> = page.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Charlie", "Delta"]);
}

#[tokio::test]
async fn deleting_product_keeps_categories() {
    let app = TestApp::new().await;
    let products = &app.state.services.products;
    let cat = app.seed_category("Garden", None).await;
    let product = app.seed_product("Hose", dec!(15), vec![cat.id]).await;

    products.delete(product.product.id).await.unwrap();

    assert_matches!(
        products.get(product.product.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert!(app.state.services.categories.get(cat.id).await.is_ok());
    assert!(products.filter_by_category(cat.id).await.unwrap().is_empty());
}
