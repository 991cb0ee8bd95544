use crate::{
    entities::{cart_item, category, order_item, prelude::*, product, product_category},
    errors::ServiceError,
    events::{Event, EventSender},
    services::category_service::descendant_ids,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Query},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Input for creating a product
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[schema(value_type = String, example = "1200.00")]
    pub price: Decimal,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
}

/// Partial product update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>, example = "1250.00")]
    pub price: Option<Decimal>,
    /// Replaces the whole category set when present
    pub category_ids: Option<Vec<Uuid>>,
}

/// Product together with the ids of the categories it is tagged with
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductWithCategories {
    #[serde(flatten)]
    pub product: product::Model,
    pub category_ids: Vec<Uuid>,
}

/// One page of the catalog
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductPage {
    pub items: Vec<product::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Largest price a `DECIMAL(16, 4)` column holds.
pub const MAX_PRICE: Decimal = Decimal::from_parts(1_874_919_423, 2_328_306, 0, false, 4);

fn ensure_non_negative(price: Decimal) -> Result<(), ServiceError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ServiceError::ValidationError(format!(
            "Price must not be negative, got {}",
            price
        )));
    }
    Ok(())
}

fn validate_price(price: Decimal) -> Result<(), ServiceError> {
    ensure_non_negative(price)?;
    if price > MAX_PRICE {
        return Err(ServiceError::ValidationError(format!(
            "Price must not exceed {}, got {}",
            MAX_PRICE, price
        )));
    }
    Ok(())
}

/// Deduplicates `ids` and checks that every one names an existing category.
async fn resolve_category_ids<C: ConnectionTrait>(
    conn: &C,
    ids: &[Uuid],
) -> Result<Vec<Uuid>, ServiceError> {
    let wanted: BTreeSet<Uuid> = ids.iter().copied().collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let found: HashSet<Uuid> = Category::find()
        .select_only()
        .column(category::Column::Id)
        .filter(category::Column::Id.is_in(wanted.iter().copied()))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?
        .into_iter()
        .collect();

    let missing: Vec<String> = wanted
        .iter()
        .filter(|id| !found.contains(id))
        .map(Uuid::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(ServiceError::ValidationError(format!(
            "Unknown category ids: {}",
            missing.join(", ")
        )));
    }

    Ok(wanted.into_iter().collect())
}

async fn link_categories<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    category_ids: &[Uuid],
) -> Result<(), ServiceError> {
    if category_ids.is_empty() {
        return Ok(());
    }
    let links = category_ids
        .iter()
        .map(|category_id| product_category::ActiveModel {
            product_id: Set(product_id),
            category_id: Set(*category_id),
        });
    ProductCategory::insert_many(links)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

async fn category_ids_of<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<Vec<Uuid>, ServiceError> {
    Ok(ProductCategory::find()
        .select_only()
        .column(product_category::Column::CategoryId)
        .filter(product_category::Column::ProductId.eq(product_id))
        .order_by_asc(product_category::Column::CategoryId)
        .into_tuple::<Uuid>()
        .all(conn)
        .await?)
}

/// Product catalog: CRUD plus category and price filtering
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Create a new product
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        input: CreateProductInput,
    ) -> Result<ProductWithCategories, ServiceError> {
        input.validate()?;
        validate_price(input.price)?;

        let txn = self.db.begin().await?;
        let category_ids = resolve_category_ids(&txn, &input.category_ids).await?;

        let now = Utc::now();
        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            description: Set(input.description),
            price: Set(input.price),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        link_categories(&txn, product.id, &category_ids).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductCreated(product.id))
            .await;

        info!("Created product {} ({})", product.name, product.id);
        Ok(ProductWithCategories {
            product,
            category_ids,
        })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<ProductWithCategories, ServiceError> {
        let db = &*self.db;
        let product = Product::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;
        let category_ids = category_ids_of(db, id).await?;

        Ok(ProductWithCategories {
            product,
            category_ids,
        })
    }

    /// Lists products by name. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list(&self, page: u64, per_page: u64) -> Result<ProductPage, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let paginator = Product::find()
            .order_by_asc(product::Column::Name)
            .order_by_asc(product::Column::Id)
            .paginate(&*self.db, per_page);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page - 1).await?;

        Ok(ProductPage {
            items,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateProductInput,
    ) -> Result<ProductWithCategories, ServiceError> {
        input.validate()?;
        if let Some(price) = input.price {
            validate_price(price)?;
        }

        let txn = self.db.begin().await?;

        let existing = Product::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        active.updated_at = Set(Utc::now());
        let product = active.update(&txn).await?;

        let category_ids = match input.category_ids {
            Some(ids) => {
                let ids = resolve_category_ids(&txn, &ids).await?;
                ProductCategory::delete_many()
                    .filter(product_category::Column::ProductId.eq(id))
                    .exec(&txn)
                    .await?;
                link_categories(&txn, id, &ids).await?;
                ids
            }
            None => category_ids_of(&txn, id).await?,
        };

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductUpdated(id))
            .await;

        info!("Updated product {}", id);
        Ok(ProductWithCategories {
            product,
            category_ids,
        })
    }

    /// Deletes a product.
    ///
    /// Cart lines and category links go with it; order lines keep their
    /// name/price snapshot and lose only the product reference.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        Product::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))?;

        OrderItem::update_many()
            .col_expr(order_item::Column::ProductId, Expr::value(Option::<Uuid>::None))
            .filter(order_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;

        CartItem::delete_many()
            .filter(cart_item::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;

        ProductCategory::delete_many()
            .filter(product_category::Column::ProductId.eq(id))
            .exec(&txn)
            .await?;

        Product::delete_by_id(id).exec(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ProductDeleted(id))
            .await;

        info!("Deleted product {}", id);
        Ok(())
    }

    /// Products tagged with `category_id` or any of its descendants.
    #[instrument(skip(self))]
    pub async fn filter_by_category(
        &self,
        category_id: Uuid,
    ) -> Result<Vec<product::Model>, ServiceError> {
        self.filter(None, None, Some(category_id)).await
    }

    /// Products priced within `[min, max]`, optionally restricted to a category subtree.
    #[instrument(skip(self))]
    pub async fn filter_by_price_range(
        &self,
        min: Option<Decimal>,
        max: Option<Decimal>,
        category_id: Option<Uuid>,
    ) -> Result<Vec<product::Model>, ServiceError> {
        for bound in [min, max].into_iter().flatten() {
            ensure_non_negative(bound)?;
        }
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(ServiceError::ValidationError(format!(
                    "min_price {} is greater than max_price {}",
                    min, max
                )));
            }
        }

        self.filter(min, max, category_id).await
    }

    async fn filter(
        &self,
        min: Option<Decimal>,
        max: Option<Decimal>,
        category_id: Option<Uuid>,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let db = &*self.db;
        let mut query = Product::find();

        if let Some(category_id) = category_id {
            Category::find_by_id(category_id)
                .one(db)
                .await?
                .ok_or_else(|| ServiceError::not_found("Category", category_id))?;

            let subtree = descendant_ids(db, category_id).await?;
            query = query.filter(
                product::Column::Id.in_subquery(
                    Query::select()
                        .column(product_category::Column::ProductId)
                        .from(product_category::Entity)
                        .and_where(product_category::Column::CategoryId.is_in(subtree))
                        .to_owned(),
                ),
            );
        }
        if let Some(min) = min {
            query = query.filter(product::Column::Price.gte(min));
        }
        if let Some(max) = max {
            query = query.filter(product::Column::Price.lte(max));
        }

        Ok(query
            .order_by_asc(product::Column::Name)
            .order_by_asc(product::Column::Id)
            .all(db)
            .await?)
    }
}
