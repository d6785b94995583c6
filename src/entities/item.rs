use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Image shown for items uploaded without one.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x400?text=No+image";

/// Catalog item
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    /// `name` folded with [`search_key`]; the name filter matches against it
    #[serde(skip_serializing, default)]
    pub search_name: String,
    #[sea_orm(column_type = "Decimal(Some((7, 2)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    #[sea_orm(nullable)]
    pub color_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub item_class_id: Option<Uuid>,
    /// Units in stock
    pub count: i32,
    #[sea_orm(nullable)]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Unicode lowercase form used for case-insensitive name search. SQL
/// `LOWER` only folds ASCII on SQLite, so folding happens here.
pub fn search_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl Model {
    pub fn image_url_or_placeholder(&self) -> String {
        self.image_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::color::Entity",
        from = "Column::ColorId",
        to = "super::color::Column::Id",
        on_delete = "SetNull"
    )]
    Color,
    #[sea_orm(
        belongs_to = "super::item_class::Entity",
        from = "Column::ItemClassId",
        to = "super::item_class::Column::Id",
        on_delete = "SetNull"
    )]
    ItemClass,
    #[sea_orm(has_many = "super::item_material::Entity")]
    ItemMaterials,
    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
    #[sea_orm(has_many = "super::cart_item::Entity")]
    CartItems,
}

impl Related<super::color::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Color.def()
    }
}

impl Related<super::item_class::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemClass.def()
    }
}

impl Related<super::item_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemMaterials.def()
    }
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        super::item_material::Relation::Material.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::item_material::Relation::Item.def().rev())
    }
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comments.def()
    }
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
