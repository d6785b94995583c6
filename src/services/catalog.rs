use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    auth::{consts, AuthUser},
    db::DbPool,
    entities::{color, item, item_class, material},
    errors::{FieldErrors, ServiceError},
    events::{Event, EventSender},
    repositories::{max_page, CommentRepository, ItemFilter, ItemRepository, ReferenceRepository},
};

const INVALID_CHOICE: &str =
    "Select a valid choice. That choice is not one of the available choices.";

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::new(99, 2) {
        let mut err = ValidationError::new("min_price");
        err.message = Some("Ensure this value is greater than or equal to 0.99.".into());
        return Err(err);
    }
    if price.normalize().scale() > 2 {
        let mut err = ValidationError::new("decimal_places");
        err.message = Some("Ensure that there are no more than 2 decimal places.".into());
        return Err(err);
    }
    if *price >= Decimal::new(100_000, 0) {
        let mut err = ValidationError::new("max_digits");
        err.message = Some("Ensure that there are no more than 7 digits in total.".into());
        return Err(err);
    }
    Ok(())
}

/// Fields accepted when creating or replacing an item
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ItemInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    pub description: Option<String>,
    pub color_id: Option<Uuid>,
    pub item_class_id: Option<Uuid>,
    #[serde(default)]
    pub material_ids: Vec<Uuid>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub count: i32,
    #[validate(url)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct CommentInput {
    #[validate(length(max = 255))]
    pub text: Option<String>,
}

/// Reference data payload; `value` is the class name, color or material
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct ReferenceInput {
    #[validate(length(min = 1, max = 255))]
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    ItemClass,
    Color,
    Material,
}

impl ReferenceKind {
    fn max_len(self) -> usize {
        match self {
            Self::ItemClass => 255,
            Self::Color | Self::Material => 25,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ItemClass => "Item class",
            Self::Color => "Color",
            Self::Material => "Material",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReferenceEntry {
    pub id: Uuid,
    pub value: String,
}

impl From<item_class::Model> for ReferenceEntry {
    fn from(m: item_class::Model) -> Self {
        Self { id: m.id, value: m.name }
    }
}

impl From<color::Model> for ReferenceEntry {
    fn from(m: color::Model) -> Self {
        Self { id: m.id, value: m.color }
    }
}

impl From<material::Model> for ReferenceEntry {
    fn from(m: material::Model) -> Self {
        Self {
            id: m.id,
            value: m.material,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemSummary {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub count: i32,
    pub item_class: Option<String>,
    pub color: Option<String>,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemPage {
    pub items: Vec<ItemSummary>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
    /// Cheapest price in the filtered set
    pub min_price: Option<Decimal>,
    /// Highest price in the filtered set
    pub max_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommentView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub username: Option<String>,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ItemDetail {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub description: Option<String>,
    pub count: i32,
    pub color: Option<ReferenceEntry>,
    pub item_class: Option<ReferenceEntry>,
    pub materials: Vec<ReferenceEntry>,
    pub comments: Vec<CommentView>,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IndexCounts {
    pub num_item: u64,
    pub num_class: u64,
}

/// Item catalog, reference data and item comments
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    page_size: u64,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>, page_size: u64) -> Self {
        Self {
            db,
            event_sender,
            page_size: page_size.max(1),
        }
    }

    /// Filtered, sorted page of items plus the price bounds of the filtered set
    #[instrument(skip(self))]
    pub async fn list_items(&self, mut filter: ItemFilter, page: u64) -> Result<ItemPage, ServiceError> {
        let db = &*self.db;
        let page = page.clamp(1, max_page(self.page_size));

        let refs = ReferenceRepository::new(db);
        let classes: HashMap<Uuid, String> = refs
            .classes()
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        filter.retain_known_class(|name| classes.values().any(|c| c == name));

        let repo = ItemRepository::new(db);
        let (items, total) = repo.find_page(&filter, page, self.page_size).await?;
        let bounds = repo.price_bounds(&filter).await?;
        let colors: HashMap<Uuid, String> = refs
            .colors()
            .await?
            .into_iter()
            .map(|c| (c.id, c.color))
            .collect();

        let items = items
            .into_iter()
            .map(|it| ItemSummary {
                image_url: it.image_url_or_placeholder(),
                item_class: it.item_class_id.and_then(|id| classes.get(&id).cloned()),
                color: it.color_id.and_then(|id| colors.get(&id).cloned()),
                id: it.id,
                name: it.name,
                price: it.price,
                count: it.count,
            })
            .collect();

        Ok(ItemPage {
            items,
            page,
            per_page: self.page_size,
            total,
            total_pages: total.div_ceil(self.page_size),
            min_price: bounds.map(|(lo, _)| lo),
            max_price: bounds.map(|(_, hi)| hi),
        })
    }

    #[instrument(skip(self))]
    pub async fn get_item(&self, id: Uuid) -> Result<ItemDetail, ServiceError> {
        let db = &*self.db;
        let item = ItemRepository::new(db)
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))?;

        let refs = ReferenceRepository::new(db);
        let color = match item.color_id {
            Some(color_id) => refs.find_color(color_id).await?.map(Into::into),
            None => None,
        };
        let item_class = match item.item_class_id {
            Some(class_id) => refs.find_class(class_id).await?.map(Into::into),
            None => None,
        };
        let materials = ItemRepository::new(db)
            .materials_of(id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        let comments = CommentRepository::new(db)
            .for_item(id)
            .await?
            .into_iter()
            .map(|(c, author)| CommentView {
                id: c.id,
                user_id: c.user_id,
                username: author.map(|u| u.username),
                text: c.text,
                created_at: c.created_at,
            })
            .collect();

        Ok(ItemDetail {
            image_url: item.image_url_or_placeholder(),
            id: item.id,
            name: item.name,
            price: item.price,
            description: item.description,
            count: item.count,
            color,
            item_class,
            materials,
            comments,
            created_at: item.created_at,
            updated_at: item.updated_at,
        })
    }

    /// Reference ids in `input` must exist
    async fn check_references(&self, input: &ItemInput) -> Result<(), ServiceError> {
        let refs = ReferenceRepository::new(&*self.db);
        let mut errors = FieldErrors::new();

        if let Some(color_id) = input.color_id {
            if refs.find_color(color_id).await?.is_none() {
                errors.insert("color_id".into(), vec![INVALID_CHOICE.into()]);
            }
        }
        if let Some(class_id) = input.item_class_id {
            if refs.find_class(class_id).await?.is_none() {
                errors.insert("item_class_id".into(), vec![INVALID_CHOICE.into()]);
            }
        }
        if !input.material_ids.is_empty() {
            let found = refs.find_materials(&input.material_ids).await?;
            let missing: Vec<String> = input
                .material_ids
                .iter()
                .filter(|id| !found.iter().any(|m| m.id == **id))
                .map(|id| format!("Select a valid choice. {} is not one of the available choices.", id))
                .collect();
            if !missing.is_empty() {
                errors.insert("material_ids".into(), missing);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::InvalidForm(errors))
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_item(&self, input: ItemInput) -> Result<ItemDetail, ServiceError> {
        input.validate()?;
        self.check_references(&input).await?;

        let txn = self.db.begin().await?;
        let now = Utc::now();
        let created = item::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            search_name: Set(item::search_key(&input.name)),
            price: Set(input.price),
            description: Set(input.description.clone()),
            color_id: Set(input.color_id),
            item_class_id: Set(input.item_class_id),
            count: Set(input.count),
            image_url: Set(input.image_url.clone()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;
        ItemRepository::new(&txn)
            .set_materials(created.id, &input.material_ids)
            .await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::ItemCreated(created.id))
            .await;
        info!(item_id = %created.id, "Item created");
        self.get_item(created.id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_item(&self, id: Uuid, input: ItemInput) -> Result<ItemDetail, ServiceError> {
        input.validate()?;
        self.check_references(&input).await?;

        let txn = self.db.begin().await?;
        let existing = ItemRepository::new(&txn)
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))?;

        let mut active: item::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.search_name = Set(item::search_key(&input.name));
        active.price = Set(input.price);
        active.description = Set(input.description.clone());
        active.color_id = Set(input.color_id);
        active.item_class_id = Set(input.item_class_id);
        active.count = Set(input.count);
        active.image_url = Set(input.image_url.clone());
        active.updated_at = Set(Utc::now());
        active.update(&txn).await?;
        ItemRepository::new(&txn)
            .set_materials(id, &input.material_ids)
            .await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::ItemUpdated(id)).await;
        info!(item_id = %id, "Item updated");
        self.get_item(id).await
    }

    #[instrument(skip(self))]
    pub async fn delete_item(&self, id: Uuid) -> Result<(), ServiceError> {
        let res = item::Entity::delete_by_id(id).exec(&*self.db).await?;
        if res.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!("Item {} not found", id)));
        }
        self.event_sender.send_or_log(Event::ItemDeleted(id)).await;
        info!(item_id = %id, "Item deleted");
        Ok(())
    }

    #[instrument(skip(self, input))]
    pub async fn post_comment(
        &self,
        item_id: Uuid,
        user: &AuthUser,
        input: CommentInput,
    ) -> Result<CommentView, ServiceError> {
        input.validate()?;
        let db = &*self.db;
        if ItemRepository::new(db).find_by_id(item_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("Item {} not found", item_id)));
        }

        let text = input
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        let comment = CommentRepository::new(db)
            .insert(item_id, user.user_id, text)
            .await?;

        self.event_sender
            .send_or_log(Event::CommentPosted {
                item_id,
                comment_id: comment.id,
            })
            .await;

        Ok(CommentView {
            id: comment.id,
            user_id: comment.user_id,
            username: user.name.clone(),
            text: comment.text,
            created_at: comment.created_at,
        })
    }

    /// Authors delete their own comments; moderators delete any. Returns the item id.
    #[instrument(skip(self))]
    pub async fn delete_comment(
        &self,
        comment_id: Uuid,
        user: &AuthUser,
    ) -> Result<Uuid, ServiceError> {
        let repo = CommentRepository::new(&*self.db);
        let comment = repo
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Comment {} not found", comment_id)))?;

        if comment.user_id != user.user_id && !user.can(consts::COMMENTS_MODERATE) {
            return Err(ServiceError::Forbidden(
                "Only the author or a moderator can delete this comment".to_string(),
            ));
        }

        repo.delete(comment_id).await?;
        self.event_sender
            .send_or_log(Event::CommentDeleted {
                item_id: comment.item_id,
                comment_id,
            })
            .await;
        Ok(comment.item_id)
    }

    pub async fn index_counts(&self) -> Result<IndexCounts, ServiceError> {
        let db = &*self.db;
        Ok(IndexCounts {
            num_item: ItemRepository::new(db).count().await?,
            num_class: ReferenceRepository::new(db).class_count().await?,
        })
    }

    pub async fn list_reference(&self, kind: ReferenceKind) -> Result<Vec<ReferenceEntry>, ServiceError> {
        let refs = ReferenceRepository::new(&*self.db);
        Ok(match kind {
            ReferenceKind::ItemClass => refs.classes().await?.into_iter().map(Into::into).collect(),
            ReferenceKind::Color => refs.colors().await?.into_iter().map(Into::into).collect(),
            ReferenceKind::Material => refs.materials().await?.into_iter().map(Into::into).collect(),
        })
    }

    #[instrument(skip(self, input))]
    pub async fn create_reference(
        &self,
        kind: ReferenceKind,
        input: ReferenceInput,
    ) -> Result<ReferenceEntry, ServiceError> {
        input.validate()?;
        let value = input.value.trim();
        if value.is_empty() {
            return Err(ServiceError::field("value", "This field is required."));
        }
        if value.chars().count() > kind.max_len() {
            return Err(ServiceError::field(
                "value",
                format!(
                    "Ensure this value has at most {} characters (it has {}).",
                    kind.max_len(),
                    value.chars().count()
                ),
            ));
        }

        let refs = ReferenceRepository::new(&*self.db);
        let exists = match kind {
            ReferenceKind::ItemClass => refs.class_name_exists(value).await?,
            ReferenceKind::Color => refs.color_exists(value).await?,
            ReferenceKind::Material => refs.material_exists(value).await?,
        };
        if exists {
            return Err(ServiceError::field(
                "value",
                format!("{} with this value already exists.", kind.label()),
            ));
        }

        let entry = match kind {
            ReferenceKind::ItemClass => refs.insert_class(value).await?.into(),
            ReferenceKind::Color => refs.insert_color(value).await?.into(),
            ReferenceKind::Material => refs.insert_material(value).await?.into(),
        };
        Ok(entry)
    }

    #[instrument(skip(self))]
    pub async fn delete_reference(&self, kind: ReferenceKind, id: Uuid) -> Result<(), ServiceError> {
        let refs = ReferenceRepository::new(&*self.db);
        let removed = match kind {
            ReferenceKind::ItemClass => refs.delete_class(id).await?,
            ReferenceKind::Color => refs.delete_color(id).await?,
            ReferenceKind::Material => refs.delete_material(id).await?,
        };
        if removed == 0 {
            return Err(ServiceError::NotFound(format!(
                "{} {} not found",
                kind.label(),
                id
            )));
        }
        Ok(())
    }
}
