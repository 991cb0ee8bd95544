mod common;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use storefront_api::errors::ServiceError;
use uuid::Uuid;

#[tokio::test]
async fn ancestor_chain_runs_from_root_to_category() {
    let app = TestApp::new().await;
    let electronics = app.seed_category("Electronics", None).await;
    let laptops = app.seed_category("Laptops", Some(electronics.id)).await;
    let gaming = app.seed_category("Gaming Laptops", Some(laptops.id)).await;

    let chain = app
        .state
        .services
        .categories
        .get_ancestor_chain(gaming.id)
        .await
        .unwrap();

    let names: Vec<&str> = chain.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Electronics", "Laptops", "Gaming Laptops"]);

    let root_chain = app
        .state
        .services
        .categories
        .get_ancestor_chain(electronics.id)
        .await
        .unwrap();
    assert_eq!(root_chain.len(), 1);
}

#[tokio::test]
async fn descendant_set_of_root_is_union_of_children_plus_root() {
    let app = TestApp::new().await;
    let categories = &app.state.services.categories;

    let root = app.seed_category("Root", None).await;
    let a = app.seed_category("A", Some(root.id)).await;
    let b = app.seed_category("B", Some(root.id)).await;
    let a1 = app.seed_category("A1", Some(a.id)).await;
    let a1x = app.seed_category("A1x", Some(a1.id)).await;
    let _other_root = app.seed_category("Other", None).await;

    let from_root = categories.get_descendant_ids(root.id).await.unwrap();
    assert_eq!(
        from_root,
        HashSet::from([root.id, a.id, b.id, a1.id, a1x.id])
    );

    let mut union = HashSet::from([root.id]);
    for child in categories.list_children(root.id).await.unwrap() {
        union.extend(categories.get_descendant_ids(child.id).await.unwrap());
    }
    assert_eq!(from_root, union);

    let leaf = categories.get_descendant_ids(a1x.id).await.unwrap();
    assert_eq!(leaf, HashSet::from([a1x.id]));
}

#[tokio::test]
async fn unknown_category_is_not_found() {
    let app = TestApp::new().await;
    let categories = &app.state.services.categories;
    let missing = Uuid::new_v4();

    assert_matches!(
        categories.get_descendant_ids(missing).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        categories.list_children(missing).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        categories.get_ancestor_chain(missing).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn moving_under_own_descendant_is_rejected() {
    let app = TestApp::new().await;
    let categories = &app.state.services.categories;
    let top = app.seed_category("Top", None).await;
    let mid = app.seed_category("Mid", Some(top.id)).await;
    let low = app.seed_category("Low", Some(mid.id)).await;

    assert_matches!(
        categories.move_category(top.id, Some(low.id)).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        categories.move_category(top.id, Some(top.id)).await,
        Err(ServiceError::ValidationError(_))
    );

    let moved = categories.move_category(low.id, None).await.unwrap();
    assert_eq!(moved.parent_id, None);
    let roots: Vec<Uuid> = categories
        .list_roots()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert!(roots.contains(&low.id));
}

#[tokio::test]
async fn deleting_a_category_lifts_children_and_keeps_products() {
    let app = TestApp::new().await;
    let categories = &app.state.services.categories;
    let electronics = app.seed_category("Electronics", None).await;
    let laptops = app.seed_category("Laptops", Some(electronics.id)).await;
    let gaming = app.seed_category("Gaming Laptops", Some(laptops.id)).await;
    let product = app
        .seed_product("Notebook", dec!(999), vec![laptops.id])
        .await;

    categories.delete(laptops.id).await.unwrap();

    let gaming = categories.get(gaming.id).await.unwrap();
    assert_eq!(gaming.parent_id, Some(electronics.id));

    let product = app
        .state
        .services
        .products
        .get(product.product.id)
        .await
        .unwrap();
    assert!(product.category_ids.is_empty());

    assert_matches!(
        categories.get(laptops.id).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn deleting_a_root_promotes_children_to_roots() {
    let app = TestApp::new().await;
    let categories = &app.state.services.categories;
    let root = app.seed_category("Root", None).await;
    let child = app.seed_category("Child", Some(root.id)).await;

    categories.delete(root.id).await.unwrap();

    assert_eq!(categories.get(child.id).await.unwrap().parent_id, None);
}
