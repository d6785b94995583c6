use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a closed channel is logged and otherwise ignored.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

// Domain events emitted after a successful commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // Account events
    UserRegistered(Uuid),
    UserActivated(Uuid),
    ProfileUpdated(Uuid),

    // Catalog events
    ItemCreated(Uuid),
    ItemUpdated(Uuid),
    ItemDeleted(Uuid),
    CommentPosted { item_id: Uuid, comment_id: Uuid },
    CommentDeleted { item_id: Uuid, comment_id: Uuid },

    // Cart events
    CartItemAdded {
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    },
    CartItemUpdated {
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    },
    CartItemRemoved { cart_id: Uuid, item_id: Uuid },

    // Checkout events
    CheckoutCompleted {
        user_id: Uuid,
        cart_id: Uuid,
        lines: usize,
        total: Decimal,
        completed_at: DateTime<Utc>,
    },
    StockDepleted { item_id: Uuid },

    // Purchase administration
    PurchaseRecordDeleted(Uuid),
    PurchaseSnapshotDeleted { user_id: Uuid, snapshot_id: Uuid },
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processing loop started");

    while let Some(event) = receiver.recv().await {
        match event {
            Event::UserRegistered(user_id) => {
                info!(%user_id, "User registered, awaiting activation");
            }
            Event::UserActivated(user_id) => {
                info!(%user_id, "User activated");
            }
            Event::CheckoutCompleted {
                user_id,
                cart_id,
                lines,
                total,
                ..
            } => {
                info!(%user_id, %cart_id, lines, %total, "Checkout completed");
            }
            Event::StockDepleted { item_id } => {
                warn!(%item_id, "Item is out of stock");
            }
            other => {
                info!("Event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}
