use crate::{
    entities::{cart, cart_item, prelude::*, product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{line_total, sum_totals},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

fn default_quantity() -> i32 {
    1
}

/// Input for adding a product to the cart
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// Input for overwriting the quantity of an existing line
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SetQuantityInput {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// One entry of a full cart replacement.
///
/// With `id` the existing line's quantity is updated; without `id` a line
/// for `product_id` is created, or updated if the cart already holds it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReplaceCartItem {
    pub id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub quantity: Option<i32>,
}

/// Cart line joined with the product it refers to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    pub quantity: i32,
    #[schema(value_type = String)]
    pub line_total: Decimal,
}

/// Cart with its lines, ordered by insertion time
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartWithItems {
    #[serde(flatten)]
    pub cart: cart::Model,
    pub items: Vec<CartLine>,
    #[schema(value_type = String)]
    pub total: Decimal,
}

fn ensure_positive(quantity: i32) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::ValidationError(format!(
            "Quantity must be a positive integer, got {}",
            quantity
        )));
    }
    Ok(())
}

fn quantity_overflow(product_id: Uuid) -> ServiceError {
    ServiceError::ValidationError(format!(
        "Quantity for product {} would exceed {}",
        product_id,
        i32::MAX
    ))
}

async fn ensure_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Product", product_id))
}

async fn load_cart<C: ConnectionTrait>(
    conn: &C,
    cart: cart::Model,
) -> Result<CartWithItems, ServiceError> {
    let rows = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .order_by_asc(cart_item::Column::Id)
        .find_also_related(Product)
        .all(conn)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for (item, product) in rows {
        let Some(product) = product else { continue };
        items.push(CartLine {
            id: item.id,
            product_id: item.product_id,
            line_total: line_total(product.price, item.quantity)?,
            product_name: product.name,
            unit_price: product.price,
            quantity: item.quantity,
        });
    }
    let total = sum_totals(items.iter().map(|line| line.line_total))?;

    Ok(CartWithItems { cart, items, total })
}

/// Per-user shopping cart.
///
/// Every operation takes the authenticated user's id; the cart row is
/// created lazily and never duplicated (`carts.user_id` is unique).
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the user's cart, creating an empty one on first access.
    ///
    /// Uses `INSERT .. ON CONFLICT (user_id) DO NOTHING` followed by a read,
    /// so concurrent first requests from one user end up with the same row.
    #[instrument(skip(self))]
    pub async fn get_or_create_for_user(&self, user_id: Uuid) -> Result<cart::Model, ServiceError> {
        let db = &*self.db;

        if let Some(existing) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(db)
            .await?
        {
            return Ok(existing);
        }

        let now = Utc::now();
        let candidate = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = Cart::insert(candidate)
            .on_conflict(
                OnConflict::column(cart::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::Conflict(format!("Cart for user {} could not be created", user_id))
            })?;

        if inserted > 0 {
            self.event_sender
                .send_or_log(Event::CartCreated {
                    cart_id: cart.id,
                    user_id,
                })
                .await;
            info!("Created cart {} for user {}", cart.id, user_id);
        }

        Ok(cart)
    }

    /// The user's cart with product details per line.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = self.get_or_create_for_user(user_id).await?;
        load_cart(&*self.db, cart).await
    }

    /// Adds `quantity` of a product, incrementing an existing line for the same product.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartWithItems, ServiceError> {
        ensure_positive(input.quantity)?;
        ensure_product(&*self.db, input.product_id).await?;
        let cart = self.get_or_create_for_user(user_id).await?;

        // Increment in place, refusing sums past i32::MAX.
        if !self.increment_line(cart.id, &input).await? {
            let now = Utc::now();
            let line = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(input.product_id),
                quantity: Set(input.quantity),
                created_at: Set(now),
                updated_at: Set(now),
            };
            let inserted = CartItem::insert(line)
                .on_conflict(
                    OnConflict::columns([cart_item::Column::CartId, cart_item::Column::ProductId])
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&*self.db)
                .await?;

            // a concurrent add created the line first
            if inserted == 0 && !self.increment_line(cart.id, &input).await? {
                return Err(ServiceError::Conflict(format!(
                    "Cart line for product {} changed concurrently",
                    input.product_id
                )));
            }
        }

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                product_id: input.product_id,
                quantity: input.quantity,
            })
            .await;

        info!(
            "Added product {} x{} to cart {}",
            input.product_id, input.quantity, cart.id
        );
        load_cart(&*self.db, cart).await
    }

    /// Adds to an existing line. `Ok(false)` when there is no line yet;
    /// `ValidationError` when the line exists but the sum would overflow.
    async fn increment_line(
        &self,
        cart_id: Uuid,
        input: &AddToCartInput,
    ) -> Result<bool, ServiceError> {
        let updated = CartItem::update_many()
            .col_expr(
                cart_item::Column::Quantity,
                Expr::col(cart_item::Column::Quantity).add(input.quantity),
            )
            .col_expr(cart_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .filter(cart_item::Column::Quantity.lte(i32::MAX - input.quantity))
            .exec(&*self.db)
            .await?
            .rows_affected;
        if updated > 0 {
            return Ok(true);
        }

        let exists = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .one(&*self.db)
            .await?
            .is_some();
        if exists {
            return Err(quantity_overflow(input.product_id));
        }
        Ok(false)
    }

    /// Overwrites the quantity of the line holding `product_id`.
    #[instrument(skip(self))]
    pub async fn set_item_quantity(
        &self,
        user_id: Uuid,
        input: SetQuantityInput,
    ) -> Result<CartWithItems, ServiceError> {
        ensure_positive(input.quantity)?;
        let cart = self.get_or_create_for_user(user_id).await?;

        let updated = CartItem::update_many()
            .col_expr(cart_item::Column::Quantity, Expr::value(input.quantity))
            .col_expr(cart_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .exec(&*self.db)
            .await?
            .rows_affected;

        if updated == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} is not in the cart",
                input.product_id
            )));
        }

        self.event_sender
            .send_or_log(Event::CartUpdated(cart.id))
            .await;

        load_cart(&*self.db, cart).await
    }

    /// Deletes the line holding `product_id`.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        let cart = self.get_or_create_for_user(user_id).await?;

        let removed = CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&*self.db)
            .await?
            .rows_affected;

        if removed == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} is not in the cart",
                product_id
            )));
        }

        self.event_sender
            .send_or_log(Event::CartUpdated(cart.id))
            .await;

        info!("Removed product {} from cart {}", product_id, cart.id);
        load_cart(&*self.db, cart).await
    }

    /// Replaces the cart contents with `items`.
    ///
    /// Entries are applied in order; afterwards every line not touched by an
    /// entry is deleted. An empty list empties the cart. All or nothing.
    #[instrument(skip(self, items), fields(entries = items.len()))]
    pub async fn replace_items(
        &self,
        user_id: Uuid,
        items: Vec<ReplaceCartItem>,
    ) -> Result<CartWithItems, ServiceError> {
        let cart = self.get_or_create_for_user(user_id).await?;
        let txn = self.db.begin().await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&txn)
            .await?;
        let mut by_id: HashMap<Uuid, cart_item::Model> =
            existing.into_iter().map(|item| (item.id, item)).collect();
        let mut by_product: HashMap<Uuid, Uuid> = by_id
            .values()
            .map(|item| (item.product_id, item.id))
            .collect();
        let mut keep: HashSet<Uuid> = HashSet::new();
        let now = Utc::now();

        for entry in items {
            if let Some(quantity) = entry.quantity {
                ensure_positive(quantity)?;
            }

            let line_id = match (entry.id, entry.product_id) {
                (Some(id), product_id) => {
                    let line = by_id.get(&id).ok_or_else(|| {
                        ServiceError::NotFound(format!("Cart item {} not found in cart", id))
                    })?;
                    if product_id.is_some_and(|p| p != line.product_id) {
                        return Err(ServiceError::ValidationError(format!(
                            "Cart item {} holds product {}, not {:?}",
                            id, line.product_id, product_id
                        )));
                    }
                    id
                }
                (None, Some(product_id)) => match by_product.get(&product_id) {
                    Some(id) => *id,
                    None => {
                        ensure_product(&txn, product_id).await?;
                        let created = cart_item::Model {
                            id: Uuid::new_v4(),
                            cart_id: cart.id,
                            product_id,
                            quantity: entry.quantity.unwrap_or_else(default_quantity),
                            created_at: now,
                            updated_at: now,
                        };
                        CartItem::insert(cart_item::ActiveModel::from(created.clone()))
                            .exec_without_returning(&txn)
                            .await?;
                        by_product.insert(product_id, created.id);
                        keep.insert(created.id);
                        by_id.insert(created.id, created);
                        continue;
                    }
                },
                (None, None) => {
                    return Err(ServiceError::ValidationError(
                        "Each cart item needs an id or a product_id".to_string(),
                    ));
                }
            };

            if let Some(quantity) = entry.quantity {
                CartItem::update_many()
                    .col_expr(cart_item::Column::Quantity, Expr::value(quantity))
                    .col_expr(cart_item::Column::UpdatedAt, Expr::value(now))
                    .filter(cart_item::Column::Id.eq(line_id))
                    .exec(&txn)
                    .await?;
            }
            keep.insert(line_id);
        }

        let stale: Vec<Uuid> = by_id
            .keys()
            .filter(|id| !keep.contains(id))
            .copied()
            .collect();
        if !stale.is_empty() {
            CartItem::delete_many()
                .filter(cart_item::Column::Id.is_in(stale))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartUpdated(cart.id))
            .await;

        info!("Replaced contents of cart {} ({} lines)", cart.id, keep.len());
        load_cart(&*self.db, cart).await
    }

    /// Deletes every line; the cart row itself stays.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<CartWithItems, ServiceError> {
        let cart = self.get_or_create_for_user(user_id).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::CartCleared(cart.id))
            .await;

        info!("Cleared cart {}", cart.id);
        load_cart(&*self.db, cart).await
    }
}
