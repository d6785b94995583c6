use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub material: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::item_material::Entity")]
    ItemMaterials,
}

impl Related<super::item_material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ItemMaterials.def()
    }
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        super::item_material::Relation::Item.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::item_material::Relation::Material.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
