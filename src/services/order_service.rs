use crate::{
    entities::{cart, cart_item, order, order_item, prelude::*, product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{line_total, sum_totals},
};
use chrono::Utc;
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Order with its frozen lines
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
    #[schema(value_type = String)]
    pub total: Decimal,
}

impl OrderWithItems {
    fn new(order: order::Model, items: Vec<order_item::Model>) -> Result<Self, ServiceError> {
        let totals = items
            .iter()
            .map(|item| line_total(item.unit_price, item.quantity))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            order,
            total: sum_totals(totals)?,
            items,
        })
    }
}

/// Cart lines as read at the start of checkout.
struct CartSnapshot {
    cart: cart::Model,
    lines: Vec<(cart_item::Model, Option<product::Model>)>,
}

/// Reads the user's cart lines with their products.
async fn take_snapshot<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<CartSnapshot, ServiceError> {
    let empty = || ServiceError::InvalidState("Cannot create order with an empty cart".to_string());

    let cart = Cart::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(empty)?;

    let lines = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart.id))
        .order_by_asc(cart_item::Column::CreatedAt)
        .find_also_related(Product)
        .all(conn)
        .await?;

    if lines.is_empty() {
        return Err(empty());
    }
    Ok(CartSnapshot { cart, lines })
}

/// Writes the order and its lines, then deletes exactly the snapshot lines
/// by `(id, quantity)`. Any mismatch is a `Conflict`; the caller rolls back.
async fn write_order<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    snapshot: &CartSnapshot,
) -> Result<OrderWithItems, ServiceError> {
    let order = order::Model {
        id: Uuid::new_v4(),
        user_id,
        created_at: Utc::now(),
    };
    Order::insert(order::ActiveModel::from(order.clone()))
        .exec_without_returning(conn)
        .await?;

    let mut lines = Vec::with_capacity(snapshot.lines.len());
    let mut taken = Condition::any();
    for (item, product) in &snapshot.lines {
        let product = product.as_ref().ok_or_else(|| {
            ServiceError::Conflict(format!(
                "Product {} was removed during checkout",
                item.product_id
            ))
        })?;
        lines.push(order_item::Model {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: Some(product.id),
            product_name: product.name.clone(),
            unit_price: product.price,
            quantity: item.quantity,
        });
        taken = taken.add(
            Condition::all()
                .add(cart_item::Column::Id.eq(item.id))
                .add(cart_item::Column::Quantity.eq(item.quantity)),
        );
    }
    let placed = OrderWithItems::new(order, lines)?;

    OrderItem::insert_many(placed.items.iter().cloned().map(order_item::ActiveModel::from))
        .exec_without_returning(conn)
        .await?;

    let removed = CartItem::delete_many()
        .filter(cart_item::Column::CartId.eq(snapshot.cart.id))
        .filter(taken)
        .exec(conn)
        .await?
        .rows_affected;

    if removed != snapshot.lines.len() as u64 {
        warn!(
            cart_id = %snapshot.cart.id,
            expected = snapshot.lines.len(),
            removed,
            "Cart changed during checkout"
        );
        return Err(ServiceError::Conflict(
            "Cart was modified while the order was being placed".to_string(),
        ));
    }

    Ok(placed)
}

async fn items_for_orders<C: ConnectionTrait>(
    conn: &C,
    order_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Vec<order_item::Model>>, ServiceError> {
    let mut grouped: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
    if order_ids.is_empty() {
        return Ok(grouped);
    }

    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.is_in(order_ids))
        .order_by_asc(order_item::Column::ProductName)
        .order_by_asc(order_item::Column::Id)
        .all(conn)
        .await?;
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }
    Ok(grouped)
}

/// Turns carts into orders and serves the order history.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Places an order from the user's cart and empties the cart.
    ///
    /// Runs as one transaction over a snapshot of the cart lines. Each line is
    /// copied into an order line (product id, name, unit price, quantity) and
    /// then deleted by `(id, quantity)`. If any snapshot line changed or
    /// vanished in the meantime the transaction is rolled back with `Conflict`.
    ///
    /// # Returns
    ///
    /// * `Err(ServiceError::InvalidState)` - the user has no cart lines
    /// * `Err(ServiceError::Conflict)` - the cart changed during checkout
    #[instrument(skip(self))]
    pub async fn create_from_cart(&self, user_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let start = std::time::Instant::now();
        let txn = self.db.begin().await?;

        let snapshot = take_snapshot(&txn, user_id).await?;
        let placed = match write_order(&txn, user_id, &snapshot).await {
            Ok(placed) => placed,
            Err(err) => {
                txn.rollback().await?;
                if matches!(err, ServiceError::Conflict(_)) {
                    counter!("storefront.orders.conflicts", 1);
                }
                return Err(err);
            }
        };

        txn.commit().await?;

        histogram!(
            "storefront.orders.checkout_seconds",
            start.elapsed().as_secs_f64()
        );
        counter!("storefront.orders.created", 1);

        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: placed.order.id,
                user_id,
                item_count: placed.items.len(),
                created_at: placed.order.created_at,
            })
            .await;

        info!(
            "Created order {} for user {} with {} lines",
            placed.order.id,
            user_id,
            placed.items.len()
        );
        Ok(placed)
    }

    /// The user's orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<OrderWithItems>, ServiceError> {
        let db = &*self.db;
        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
            .all(db)
            .await?;

        let mut items = items_for_orders(db, orders.iter().map(|o| o.id).collect()).await?;

        orders
            .into_iter()
            .map(|order| {
                let lines = items.remove(&order.id).unwrap_or_default();
                OrderWithItems::new(order, lines)
            })
            .collect()
    }

    /// A single order. Orders of other users are reported as not found.
    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Uuid, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let db = &*self.db;
        let order = Order::find_by_id(order_id)
            .filter(order::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        let lines = items_for_orders(db, vec![order.id])
            .await?
            .remove(&order.id)
            .unwrap_or_default();

        OrderWithItems::new(order, lines)
    }
}
