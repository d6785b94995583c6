use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{cart_item, item},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{CartRepository, ItemRepository, UserRepository},
};

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct AddToCartInput {
    pub item_id: Uuid,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct UpdateQuantityInput {
    #[validate(range(min = 1, message = "Ensure this value is greater than or equal to 1."))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartLineView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
    /// Units the warehouse currently holds
    pub in_stock: i32,
    pub display: String,
}

impl CartLineView {
    fn new(line: &cart_item::Model, item: &item::Model) -> Self {
        let line_total = item.price * Decimal::from(line.quantity);
        Self {
            id: line.id,
            item_id: item.id,
            item_name: item.name.clone(),
            unit_price: item.price,
            quantity: line.quantity,
            line_total,
            in_stock: item.count,
            display: format!(
                "Sum for {} × {}: ${:.2}",
                line.quantity, item.name, line_total
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartView {
    /// Absent until the first item is added
    pub id: Option<Uuid>,
    pub display: String,
    pub lines: Vec<CartLineView>,
    pub total_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddToCartOutcome {
    pub cart_id: Uuid,
    pub line: CartLineView,
    /// False when the line already held every unit in stock
    pub incremented: bool,
}

/// Message shown when a requested quantity exceeds stock
pub fn over_stock_message(item_name: &str, in_stock: i32) -> String {
    format!(
        "{item_name} on warehouse: {in_stock}\nYou can select maximum {in_stock} of {item_name}"
    )
}

/// Adds one unit to a line while stock allows.
async fn grow_line<C: ConnectionTrait>(
    carts: &CartRepository<'_, C>,
    line: cart_item::Model,
    item: &item::Model,
) -> Result<(cart_item::Model, bool), ServiceError> {
    if item.count > line.quantity {
        let quantity = line.quantity + 1;
        Ok((carts.set_quantity(line, quantity).await?, true))
    } else {
        Ok((line, false))
    }
}

/// Per-user shopping cart
#[derive(Clone)]
pub struct CartService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn get_cart(&self, user: &AuthUser) -> Result<CartView, ServiceError> {
        let db = &*self.db;
        let username = match &user.name {
            Some(name) => name.clone(),
            None => UserRepository::new(db)
                .find_by_id(user.user_id)
                .await?
                .map(|u| u.username)
                .unwrap_or_default(),
        };

        let repo = CartRepository::new(db);
        let Some(cart) = repo.find_for_user(user.user_id).await? else {
            return Ok(CartView {
                id: None,
                display: format!("Cart of {}", username),
                lines: Vec::new(),
                total_price: Decimal::ZERO,
            });
        };

        let lines: Vec<CartLineView> = repo
            .lines_with_items(cart.id)
            .await?
            .iter()
            .map(|(line, item)| CartLineView::new(line, item))
            .collect();
        let total_price = lines.iter().map(|l| l.line_total).sum();

        Ok(CartView {
            id: Some(cart.id),
            display: format!("Cart of {}", username),
            lines,
            total_price,
        })
    }

    /// Adds one unit of an item. An existing line grows by one only while stock allows.
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn add_item(
        &self,
        user: &AuthUser,
        item_id: Uuid,
    ) -> Result<AddToCartOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let item = ItemRepository::new(&txn)
            .find_by_id(item_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", item_id)))?;

        let carts = CartRepository::new(&txn);
        let cart = carts.get_or_create(user.user_id).await?;

        let (line, incremented) = match carts.find_line(cart.id, item.id).await? {
            Some(line) => grow_line(&carts, line, &item).await?,
            None => match carts.insert_line_if_absent(cart.id, item.id, 1).await? {
                Some(line) => (line, true),
                // a concurrent add created the line first
                None => {
                    let line = carts.find_line(cart.id, item.id).await?.ok_or_else(|| {
                        ServiceError::Conflict(format!("Cart line for item {} changed", item.id))
                    })?;
                    grow_line(&carts, line, &item).await?
                }
            },
        };

        txn.commit().await?;

        if incremented {
            self.event_sender
                .send_or_log(Event::CartItemAdded {
                    cart_id: cart.id,
                    item_id: item.id,
                    quantity: line.quantity,
                })
                .await;
        } else {
            debug!(item_id = %item.id, "Stock exhausted, cart line unchanged");
        }

        Ok(AddToCartOutcome {
            cart_id: cart.id,
            line: CartLineView::new(&line, &item),
            incremented,
        })
    }

    /// Sets a line's quantity. Rejected quantities leave the line untouched.
    #[instrument(skip(self, user, input), fields(user_id = %user.user_id))]
    pub async fn update_line_quantity(
        &self,
        user: &AuthUser,
        line_id: Uuid,
        input: UpdateQuantityInput,
    ) -> Result<CartLineView, ServiceError> {
        let txn = self.db.begin().await?;
        let carts = CartRepository::new(&txn);
        let line = self.owned_line(&carts, user, line_id).await?;

        let item = ItemRepository::new(&txn)
            .find_by_id(line.item_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", line.item_id)))?;

        input.validate()?;
        if input.quantity > item.count {
            return Err(ServiceError::field(
                "quantity",
                over_stock_message(&item.name, item.count),
            ));
        }

        let cart_id = line.cart_id;
        let updated = carts.set_quantity(line, input.quantity).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id,
                item_id: item.id,
                quantity: updated.quantity,
            })
            .await;
        info!(line_id = %line_id, quantity = updated.quantity, "Cart line updated");
        Ok(CartLineView::new(&updated, &item))
    }

    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn remove_line(&self, user: &AuthUser, line_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let carts = CartRepository::new(db);
        let line = self.owned_line(&carts, user, line_id).await?;
        carts.delete_line(line.id).await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: line.cart_id,
                item_id: line.item_id,
            })
            .await;
        Ok(())
    }

    async fn owned_line<C: sea_orm::ConnectionTrait>(
        &self,
        carts: &CartRepository<'_, C>,
        user: &AuthUser,
        line_id: Uuid,
    ) -> Result<cart_item::Model, ServiceError> {
        let not_found = || ServiceError::NotFound(format!("Cart line {} not found", line_id));
        let cart = carts.find_for_user(user.user_id).await?.ok_or_else(not_found)?;
        carts
            .find_line_in_cart(cart.id, line_id)
            .await?
            .ok_or_else(not_found)
    }
}
