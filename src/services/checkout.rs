use chrono::Utc;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    auth::AuthUser,
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{CartRepository, ItemRepository, NewPurchaseRecord, PurchaseRepository},
};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+\d{10,15}$").expect("valid regex"));
static CVV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3}$").expect("valid regex"));

fn card_digits(card_number: &str) -> String {
    card_number.chars().filter(|c| !c.is_whitespace()).collect()
}

fn validate_card_number(card_number: &str) -> Result<(), ValidationError> {
    let digits = card_digits(card_number);
    if digits.len() == 16 && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("card_number");
        err.message = Some("Card number must contain exactly 16 digits.".into());
        Err(err)
    }
}

/// Payment details captured at checkout. Nothing is charged.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct PaymentForm {
    #[validate(regex(
        path = "PHONE_RE",
        message = "Phone number must be + followed by 10 to 15 digits."
    ))]
    pub phone_number: String,
    #[validate(custom = "validate_card_number")]
    pub card_number: String,
    #[validate(regex(path = "CVV_RE", message = "CVV must contain exactly 3 digits."))]
    pub cvv: String,
}

impl PaymentForm {
    /// `**** **** **** 1234`
    pub fn masked_card_number(&self) -> String {
        let digits = card_digits(&self.card_number);
        let last4 = &digits[digits.len().saturating_sub(4)..];
        format!("**** **** **** {}", last4)
    }

    pub fn masked_cvv(&self) -> String {
        "***".to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutReceipt {
    pub purchased_lines: usize,
    pub purchased_units: i64,
    pub total: Decimal,
    /// Where the client should go next
    pub redirect_to: String,
}

/// Turns the user's cart into purchase records
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CheckoutService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// For each cart line: snapshot, decrement stock (floored at zero), record
    /// the purchase with masked card data, then drop the line. All lines commit
    /// together or not at all. An empty or missing cart is a no-op.
    #[instrument(skip(self, user, payment), fields(user_id = %user.user_id))]
    pub async fn checkout(
        &self,
        user: &AuthUser,
        payment: PaymentForm,
    ) -> Result<CheckoutReceipt, ServiceError> {
        payment.validate()?;
        let masked_card = payment.masked_card_number();
        let masked_cvv = payment.masked_cvv();
        let phone = payment.phone_number.trim().to_string();

        let txn = self.db.begin().await?;
        let carts = CartRepository::new(&txn);
        let cart = carts.get_or_create(user.user_id).await?;
        let lines = carts.lines_with_items(cart.id).await?;

        let items = ItemRepository::new(&txn);
        let purchases = PurchaseRepository::new(&txn);
        let now = Utc::now();
        let mut total = Decimal::ZERO;
        let mut units: i64 = 0;
        let mut depleted = Vec::new();

        for (line, item) in &lines {
            purchases
                .insert_snapshot(user.user_id, item.id, &item.name, item.price, line.quantity, now)
                .await?;

            let updated = items.decrement_stock(item.clone(), line.quantity).await?;
            if updated.count == 0 {
                depleted.push(updated.id);
            }

            let record = purchases
                .insert_record(
                    NewPurchaseRecord {
                        user_id: user.user_id,
                        cart_id: cart.id,
                        item_id: item.id,
                        item_quantity: line.quantity,
                        item_price: item.price,
                        phone_number: phone.clone(),
                        masked_card_number: masked_card.clone(),
                        masked_cvv: masked_cvv.clone(),
                    },
                    now,
                )
                .await?;
            total += record.total();
            units += i64::from(line.quantity);

            carts.delete_line(line.id).await?;
        }

        txn.commit().await?;

        if lines.is_empty() {
            info!("Checkout with empty cart, nothing purchased");
        } else {
            counter!("storefront_checkouts_completed", 1);
            counter!("storefront_units_purchased", units as u64);
            info!(lines = lines.len(), %total, "Checkout completed");

            self.event_sender
                .send_or_log(Event::CheckoutCompleted {
                    user_id: user.user_id,
                    cart_id: cart.id,
                    lines: lines.len(),
                    total,
                    completed_at: now,
                })
                .await;
            for item_id in depleted {
                warn!(%item_id, "Checkout exhausted item stock");
                self.event_sender
                    .send_or_log(Event::StockDepleted { item_id })
                    .await;
            }
        }

        Ok(CheckoutReceipt {
            purchased_lines: lines.len(),
            purchased_units: units,
            total,
            redirect_to: "/api/v1/index".to_string(),
        })
    }
}
