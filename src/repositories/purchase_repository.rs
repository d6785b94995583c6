use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{purchase_record, purchase_snapshot};

/// Fields of a purchase record; payment fields must already be masked
#[derive(Debug, Clone)]
pub struct NewPurchaseRecord {
    pub user_id: Uuid,
    pub cart_id: Uuid,
    pub item_id: Uuid,
    pub item_quantity: i32,
    pub item_price: Decimal,
    pub phone_number: String,
    pub masked_card_number: String,
    pub masked_cvv: String,
}

/// Purchase records and snapshots
pub struct PurchaseRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> PurchaseRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn insert_record(
        &self,
        record: NewPurchaseRecord,
        at: DateTime<Utc>,
    ) -> Result<purchase_record::Model, DbErr> {
        purchase_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(record.user_id),
            cart_id: Set(record.cart_id),
            item_id: Set(record.item_id),
            item_quantity: Set(record.item_quantity),
            item_price: Set(record.item_price),
            phone_number: Set(record.phone_number),
            card_number: Set(record.masked_card_number),
            cvv: Set(record.masked_cvv),
            status: Set(true),
            created_at: Set(at),
        }
        .insert(self.conn)
        .await
    }

    pub async fn insert_snapshot(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        item_name: &str,
        price: Decimal,
        quantity: i32,
        at: DateTime<Utc>,
    ) -> Result<purchase_snapshot::Model, DbErr> {
        purchase_snapshot::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            item_name: Set(Some(item_name.to_string())),
            price_was: Set(price),
            quantity: Set(quantity),
            item_id: Set(item_id),
            bought_at: Set(at),
        }
        .insert(self.conn)
        .await
    }

    /// All records, newest first
    pub async fn list_records(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<purchase_record::Model>, u64), DbErr> {
        let paginator = purchase_record::Entity::find()
            .order_by_desc(purchase_record::Column::CreatedAt)
            .order_by_asc(purchase_record::Column::Id)
            .paginate(self.conn, per_page.max(1));
        let total = paginator.num_items().await?;
        let records = paginator.fetch_page(super::page_index(page, per_page)).await?;
        Ok((records, total))
    }

    pub async fn delete_record(&self, id: Uuid) -> Result<u64, DbErr> {
        let res = purchase_record::Entity::delete_by_id(id)
            .exec(self.conn)
            .await?;
        Ok(res.rows_affected)
    }

    /// A user's snapshots, newest first
    pub async fn snapshots_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<purchase_snapshot::Model>, DbErr> {
        purchase_snapshot::Entity::find()
            .filter(purchase_snapshot::Column::UserId.eq(user_id))
            .order_by_desc(purchase_snapshot::Column::BoughtAt)
            .order_by_asc(purchase_snapshot::Column::Id)
            .all(self.conn)
            .await
    }

    /// Deletes a snapshot only if `user_id` owns it
    pub async fn delete_snapshot_of(&self, user_id: Uuid, snapshot_id: Uuid) -> Result<u64, DbErr> {
        let res = purchase_snapshot::Entity::delete_many()
            .filter(purchase_snapshot::Column::Id.eq(snapshot_id))
            .filter(purchase_snapshot::Column::UserId.eq(user_id))
            .exec(self.conn)
            .await?;
        Ok(res.rows_affected)
    }
}
