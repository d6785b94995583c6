use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// "Last bought" copy of a purchased line, owned and deletable by the buyer
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "purchase_snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(nullable)]
    pub item_name: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price_was: Decimal,
    pub quantity: i32,
    pub item_id: Uuid,
    pub bought_at: DateTime<Utc>,
}

impl Model {
    pub fn total(&self) -> Decimal {
        self.price_was * Decimal::from(self.quantity)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} x{} @ {}",
            self.item_name.as_deref().unwrap_or_default(),
            self.quantity,
            self.bought_at.format("%Y-%m-%d %H:%M")
        )
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
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
