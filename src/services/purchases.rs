use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::{purchase_record, purchase_snapshot},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{max_page, ItemRepository, PurchaseRepository},
};

pub const UNKNOWN_ITEM: &str = "Unknown item";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseRecordView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cart_id: Uuid,
    pub item_id: Uuid,
    /// Current item name, or "Unknown item" once the item is gone
    pub item_name: String,
    pub item_quantity: i32,
    pub item_price: Decimal,
    pub total: Decimal,
    pub phone_number: String,
    pub card_number: String,
    pub cvv: String,
    pub status: bool,
    pub created_at: DateTime<Utc>,
}

impl PurchaseRecordView {
    fn new(record: purchase_record::Model, item_name: String) -> Self {
        Self {
            total: record.total(),
            id: record.id,
            user_id: record.user_id,
            cart_id: record.cart_id,
            item_id: record.item_id,
            item_name,
            item_quantity: record.item_quantity,
            item_price: record.item_price,
            phone_number: record.phone_number,
            card_number: record.card_number,
            cvv: record.cvv,
            status: record.status,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseRecordPage {
    pub records: Vec<PurchaseRecordView>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SnapshotView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub item_name: Option<String>,
    pub price_was: Decimal,
    pub quantity: i32,
    pub total: Decimal,
    pub bought_at: DateTime<Utc>,
    pub display: String,
}

impl From<purchase_snapshot::Model> for SnapshotView {
    fn from(s: purchase_snapshot::Model) -> Self {
        Self {
            display: s.to_string(),
            total: s.total(),
            id: s.id,
            item_id: s.item_id,
            item_name: s.item_name,
            price_was: s.price_was,
            quantity: s.quantity,
            bought_at: s.bought_at,
        }
    }
}

/// Purchase ledger: admin view of records, owner view of snapshots
#[derive(Clone)]
pub struct PurchaseService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl PurchaseService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_records(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<PurchaseRecordPage, ServiceError> {
        let db = &*self.db;
        let per_page = per_page.max(1);
        let page = page.clamp(1, max_page(per_page));
        let (records, total) = PurchaseRepository::new(db)
            .list_records(page, per_page)
            .await?;

        let ids: Vec<Uuid> = records.iter().map(|r| r.item_id).collect();
        let names = ItemRepository::new(db).names_by_ids(&ids).await?;

        let records = records
            .into_iter()
            .map(|r| {
                let name = names
                    .get(&r.item_id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_ITEM.to_string());
                PurchaseRecordView::new(r, name)
            })
            .collect();

        Ok(PurchaseRecordPage {
            records,
            page,
            per_page,
            total,
            total_pages: total.div_ceil(per_page),
        })
    }

    #[instrument(skip(self))]
    pub async fn delete_record(&self, id: Uuid) -> Result<(), ServiceError> {
        let removed = PurchaseRepository::new(&*self.db).delete_record(id).await?;
        if removed == 0 {
            return Err(ServiceError::NotFound(format!(
                "Purchase record {} not found",
                id
            )));
        }
        self.event_sender
            .send_or_log(Event::PurchaseRecordDeleted(id))
            .await;
        info!(record_id = %id, "Purchase record deleted");
        Ok(())
    }

    pub async fn list_snapshots(&self, user: &AuthUser) -> Result<Vec<SnapshotView>, ServiceError> {
        Ok(PurchaseRepository::new(&*self.db)
            .snapshots_for_user(user.user_id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    /// Only the owner may delete a snapshot; others get 404
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    pub async fn delete_snapshot(&self, user: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let removed = PurchaseRepository::new(&*self.db)
            .delete_snapshot_of(user.user_id, id)
            .await?;
        if removed == 0 {
            return Err(ServiceError::NotFound(format!("Purchase {} not found", id)));
        }
        self.event_sender
            .send_or_log(Event::PurchaseSnapshotDeleted {
                user_id: user.user_id,
                snapshot_id: id,
            })
            .await;
        Ok(())
    }
}
