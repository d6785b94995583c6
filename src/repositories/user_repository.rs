use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use uuid::Uuid;

use crate::entities::user;

pub struct UserRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<user::Model>, DbErr> {
        user::Entity::find_by_id(id).one(self.conn).await
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool, DbErr> {
        Ok(user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .count(self.conn)
            .await?
            > 0)
    }

    /// True when another account already uses `email`
    pub async fn email_taken(&self, email: &str, except: Option<Uuid>) -> Result<bool, DbErr> {
        let mut query = user::Entity::find().filter(user::Column::Email.eq(email));
        if let Some(id) = except {
            query = query.filter(user::Column::Id.ne(id));
        }
        Ok(query.count(self.conn).await? > 0)
    }

    /// Inserts an inactive, non-privileged account
    pub async fn insert_inactive(
        &self,
        username: &str,
        email: &str,
        password_hash: String,
    ) -> Result<user::Model, DbErr> {
        let now = Utc::now();
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            avatar: Set(None),
            is_active: Set(false),
            is_superuser: Set(false),
            date_joined: Set(now),
            updated_at: Set(now),
        }
        .insert(self.conn)
        .await
    }

    pub async fn activate(&self, account: user::Model) -> Result<user::Model, DbErr> {
        let mut active: user::ActiveModel = account.into();
        active.is_active = Set(true);
        active.updated_at = Set(Utc::now());
        active.update(self.conn).await
    }

    /// Staff accounts: active and allowed to manage the shop
    pub async fn grant_superuser(&self, account: user::Model) -> Result<user::Model, DbErr> {
        let mut active: user::ActiveModel = account.into();
        active.is_active = Set(true);
        active.is_superuser = Set(true);
        active.updated_at = Set(Utc::now());
        active.update(self.conn).await
    }

    pub async fn update_profile(
        &self,
        account: user::Model,
        email: String,
        first_name: String,
        last_name: String,
        avatar: Option<String>,
    ) -> Result<user::Model, DbErr> {
        let mut active: user::ActiveModel = account.into();
        active.email = Set(email);
        active.first_name = Set(first_name);
        active.last_name = Set(last_name);
        active.avatar = Set(avatar);
        active.updated_at = Set(Utc::now());
        active.update(self.conn).await
    }
}
