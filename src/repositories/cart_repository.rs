use chrono::Utc;
use sea_orm::{
    sea_query::OnConflict, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{cart, cart_item, item};

/// Cart and cart line queries
pub struct CartRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> CartRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_for_user(&self, user_id: Uuid) -> Result<Option<cart::Model>, DbErr> {
        cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .one(self.conn)
            .await
    }

    /// Carts are created lazily on first use. A cart created concurrently for
    /// the same user wins and is returned.
    pub async fn get_or_create(&self, user_id: Uuid) -> Result<cart::Model, DbErr> {
        if let Some(existing) = self.find_for_user(user_id).await? {
            return Ok(existing);
        }
        cart::Entity::insert(cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
        })
        .on_conflict(
            OnConflict::column(cart::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(self.conn)
        .await?;

        self.find_for_user(user_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("cart of user {}", user_id)))
    }

    /// Lines of a cart with their items, oldest line first
    pub async fn lines_with_items(
        &self,
        cart_id: Uuid,
    ) -> Result<Vec<(cart_item::Model, item::Model)>, DbErr> {
        let rows = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .find_also_related(item::Entity)
            .order_by_asc(cart_item::Column::CreatedAt)
            .order_by_asc(cart_item::Column::Id)
            .all(self.conn)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(line, item)| item.map(|item| (line, item)))
            .collect())
    }

    pub async fn find_line(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<cart_item::Model>, DbErr> {
        cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .filter(cart_item::Column::ItemId.eq(item_id))
            .one(self.conn)
            .await
    }

    /// Line lookup restricted to the given cart
    pub async fn find_line_in_cart(
        &self,
        cart_id: Uuid,
        line_id: Uuid,
    ) -> Result<Option<cart_item::Model>, DbErr> {
        cart_item::Entity::find_by_id(line_id)
            .filter(cart_item::Column::CartId.eq(cart_id))
            .one(self.conn)
            .await
    }

    /// Inserts a line unless the cart already holds the item. Returns `None`
    /// when an existing line blocked the insert.
    pub async fn insert_line_if_absent(
        &self,
        cart_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Option<cart_item::Model>, DbErr> {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let inserted = cart_item::Entity::insert(cart_item::ActiveModel {
            id: Set(id),
            cart_id: Set(cart_id),
            item_id: Set(item_id),
            quantity: Set(quantity),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::columns([cart_item::Column::CartId, cart_item::Column::ItemId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(self.conn)
        .await?;

        if inserted == 0 {
            return Ok(None);
        }
        cart_item::Entity::find_by_id(id).one(self.conn).await
    }

    pub async fn set_quantity(
        &self,
        line: cart_item::Model,
        quantity: i32,
    ) -> Result<cart_item::Model, DbErr> {
        let mut active: cart_item::ActiveModel = line.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        active.update(self.conn).await
    }

    pub async fn delete_line(&self, line_id: Uuid) -> Result<u64, DbErr> {
        let res = cart_item::Entity::delete_by_id(line_id)
            .exec(self.conn)
            .await?;
        Ok(res.rows_affected)
    }
}
