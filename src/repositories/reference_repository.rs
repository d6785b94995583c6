use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{color, item_class, material};

/// Item classes, colors and materials
pub struct ReferenceRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ReferenceRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn classes(&self) -> Result<Vec<item_class::Model>, DbErr> {
        item_class::Entity::find()
            .order_by_asc(item_class::Column::Name)
            .all(self.conn)
            .await
    }

    pub async fn class_count(&self) -> Result<u64, DbErr> {
        item_class::Entity::find().count(self.conn).await
    }

    pub async fn find_class(&self, id: Uuid) -> Result<Option<item_class::Model>, DbErr> {
        item_class::Entity::find_by_id(id).one(self.conn).await
    }

    pub async fn class_name_exists(&self, name: &str) -> Result<bool, DbErr> {
        Ok(item_class::Entity::find()
            .filter(item_class::Column::Name.eq(name))
            .count(self.conn)
            .await?
            > 0)
    }

    pub async fn insert_class(&self, name: &str) -> Result<item_class::Model, DbErr> {
        item_class::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
        }
        .insert(self.conn)
        .await
    }

    pub async fn delete_class(&self, id: Uuid) -> Result<u64, DbErr> {
        Ok(item_class::Entity::delete_by_id(id)
            .exec(self.conn)
            .await?
            .rows_affected)
    }

    pub async fn colors(&self) -> Result<Vec<color::Model>, DbErr> {
        color::Entity::find()
            .order_by_asc(color::Column::Color)
            .all(self.conn)
            .await
    }

    pub async fn find_color(&self, id: Uuid) -> Result<Option<color::Model>, DbErr> {
        color::Entity::find_by_id(id).one(self.conn).await
    }

    pub async fn color_exists(&self, value: &str) -> Result<bool, DbErr> {
        Ok(color::Entity::find()
            .filter(color::Column::Color.eq(value))
            .count(self.conn)
            .await?
            > 0)
    }

    pub async fn insert_color(&self, value: &str) -> Result<color::Model, DbErr> {
        color::ActiveModel {
            id: Set(Uuid::new_v4()),
            color: Set(value.to_string()),
        }
        .insert(self.conn)
        .await
    }

    pub async fn delete_color(&self, id: Uuid) -> Result<u64, DbErr> {
        Ok(color::Entity::delete_by_id(id)
            .exec(self.conn)
            .await?
            .rows_affected)
    }

    pub async fn materials(&self) -> Result<Vec<material::Model>, DbErr> {
        material::Entity::find()
            .order_by_asc(material::Column::Material)
            .all(self.conn)
            .await
    }

    /// Materials among `ids` that exist
    pub async fn find_materials(&self, ids: &[Uuid]) -> Result<Vec<material::Model>, DbErr> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        material::Entity::find()
            .filter(material::Column::Id.is_in(ids.iter().copied()))
            .all(self.conn)
            .await
    }

    pub async fn material_exists(&self, value: &str) -> Result<bool, DbErr> {
        Ok(material::Entity::find()
            .filter(material::Column::Material.eq(value))
            .count(self.conn)
            .await?
            > 0)
    }

    pub async fn insert_material(&self, value: &str) -> Result<material::Model, DbErr> {
        material::ActiveModel {
            id: Set(Uuid::new_v4()),
            material: Set(value.to_string()),
        }
        .insert(self.conn)
        .await
    }

    pub async fn delete_material(&self, id: Uuid) -> Result<u64, DbErr> {
        Ok(material::Entity::delete_by_id(id)
            .exec(self.conn)
            .await?
            .rows_affected)
    }
}
