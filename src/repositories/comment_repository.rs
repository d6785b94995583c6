use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::entities::{comment, user};

pub struct CommentRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> CommentRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Comments on an item with their authors, newest first
    pub async fn for_item(
        &self,
        item_id: Uuid,
    ) -> Result<Vec<(comment::Model, Option<user::Model>)>, DbErr> {
        comment::Entity::find()
            .filter(comment::Column::ItemId.eq(item_id))
            .find_also_related(user::Entity)
            .order_by_desc(comment::Column::CreatedAt)
            .order_by_asc(comment::Column::Id)
            .all(self.conn)
            .await
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<comment::Model>, DbErr> {
        comment::Entity::find_by_id(id).one(self.conn).await
    }

    pub async fn insert(
        &self,
        item_id: Uuid,
        user_id: Uuid,
        text: Option<String>,
    ) -> Result<comment::Model, DbErr> {
        comment::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(item_id),
            user_id: Set(user_id),
            text: Set(text),
            created_at: Set(Utc::now()),
        }
        .insert(self.conn)
        .await
    }

    pub async fn delete(&self, id: Uuid) -> Result<u64, DbErr> {
        let res = comment::Entity::delete_by_id(id).exec(self.conn).await?;
        Ok(res.rows_affected)
    }
}
