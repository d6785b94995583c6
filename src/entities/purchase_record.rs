use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Completed purchase of one cart line. Never updated after insert.
///
/// `item_id` is not a foreign key so records survive deletion of the item.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub cart_id: Uuid,
    pub item_id: Uuid,
    pub item_quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub item_price: Decimal,
    pub phone_number: String,
    /// Masked as `**** **** **** 1234`
    pub card_number: String,
    /// Always `***`
    pub cvv: String,
    pub status: bool,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn total(&self) -> Decimal {
        self.item_price * Decimal::from(self.item_quantity)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::cart::Entity",
        from = "Column::CartId",
        to = "super::cart::Column::Id",
        on_delete = "Cascade"
    )]
    Cart,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
