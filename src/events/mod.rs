use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Domain events published by the services once their transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Category events
    CategoryCreated(Uuid),
    CategoryDeleted(Uuid),

    // Catalog events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    // Cart events
    CartCreated { cart_id: Uuid, user_id: Uuid },
    CartItemAdded {
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartUpdated(Uuid),
    CartCleared(Uuid),

    // Order events
    OrderCreated {
        order_id: Uuid,
        user_id: Uuid,
        item_count: usize,
        created_at: DateTime<Utc>,
    },
}

impl Event {
    /// Stable name used for logging and metric labels
    pub fn name(&self) -> &'static str {
        match self {
            Event::CategoryCreated(_) => "category_created",
            Event::CategoryDeleted(_) => "category_deleted",
            Event::ProductCreated(_) => "product_created",
            Event::ProductUpdated(_) => "product_updated",
            Event::ProductDeleted(_) => "product_deleted",
            Event::CartCreated { .. } => "cart_created",
            Event::CartItemAdded { .. } => "cart_item_added",
            Event::CartUpdated(_) => "cart_updated",
            Event::CartCleared(_) => "cart_cleared",
            Event::OrderCreated { .. } => "order_created",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Creates a sender together with the receiver to hand to [`process_events`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            counter!("storefront.events.dropped", 1, "event" => name);
            warn!(event = name, error = %e, "Dropping domain event");
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        counter!("storefront.events.processed", 1, "event" => event.name());

        match &event {
            Event::OrderCreated {
                order_id,
                user_id,
                item_count,
                ..
            } => {
                info!(%order_id, %user_id, item_count, "Order placed");
            }
            Event::CategoryDeleted(id) => {
                info!(category_id = %id, "Category deleted");
            }
            Event::ProductDeleted(id) => {
                info!(product_id = %id, "Product deleted");
            }
            other => {
                debug!(event = other.name(), payload = ?other, "Domain event");
            }
        }
    }

    info!("Event channel closed; stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (sender, mut rx) = EventSender::channel(4);
        let id = Uuid::new_v4();
        sender.send(Event::ProductCreated(id)).await.unwrap();
        assert_eq!(rx.recv().await, Some(Event::ProductCreated(id)));
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        assert!(sender.send(Event::CartCleared(Uuid::new_v4())).await.is_err());
        // must not panic or error
        sender.send_or_log(Event::CartCleared(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn process_events_exits_when_senders_drop() {
        let (sender, rx) = EventSender::channel(8);
        let handle = tokio::spawn(process_events(rx));
        sender.send(Event::CategoryCreated(Uuid::new_v4())).await.unwrap();
        drop(sender);
        handle.await.unwrap();
    }
}
