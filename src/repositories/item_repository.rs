use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, LikeExpr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::{item, item_class, item_material, material};

/// Catalog query parameters. Absent or unusable filters pass everything through.
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ItemFilter {
    /// Case-insensitive substring of the item name
    pub name: Option<String>,
    /// Inclusive lower price bound, at most two decimal places
    pub min_price: Option<String>,
    /// Inclusive upper price bound, at most two decimal places
    pub max_price: Option<String>,
    /// Exact item class name; a name no class has is ignored
    pub class_name: Option<String>,
    /// `price_asc` or `price_desc`; anything else is ignored
    pub sort_price: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceSort {
    Asc,
    Desc,
}

impl ItemFilter {
    pub fn price_sort(&self) -> Option<PriceSort> {
        match self.sort_price.as_deref() {
            Some("price_asc") => Some(PriceSort::Asc),
            Some("price_desc") => Some(PriceSort::Desc),
            _ => None,
        }
    }

    /// Both price bounds, or neither when either one is malformed.
    pub fn price_range(&self) -> (Option<Decimal>, Option<Decimal>) {
        fn parse(raw: &Option<String>) -> Result<Option<Decimal>, ()> {
            match raw.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                None => Ok(None),
                Some(v) => match Decimal::from_str(v) {
                    Ok(d) if d.normalize().scale() <= 2 => Ok(Some(d)),
                    _ => Err(()),
                },
            }
        }
        match (parse(&self.min_price), parse(&self.max_price)) {
            (Ok(min), Ok(max)) => (min, max),
            _ => (None, None),
        }
    }

    /// Drops the class filter when `is_known` rejects the name.
    pub fn retain_known_class(&mut self, is_known: impl Fn(&str) -> bool) {
        if self.class_term().is_some_and(|name| !is_known(name)) {
            self.class_name = None;
        }
    }

    fn name_term(&self) -> Option<String> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(item::search_key)
    }

    fn class_term(&self) -> Option<&str> {
        self.class_name
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Typed item queries over any connection or open transaction
pub struct ItemRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ItemRepository<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    fn filtered(&self, filter: &ItemFilter) -> Select<item::Entity> {
        let mut query = item::Entity::find();

        if let Some(name) = filter.name_term() {
            query = query.filter(
                Expr::col((item::Entity, item::Column::SearchName))
                    .like(LikeExpr::new(format!("%{}%", escape_like(&name))).escape('\\')),
            );
        }
        let (min_price, max_price) = filter.price_range();
        if let Some(min) = min_price {
            query = query.filter(item::Column::Price.gte(min));
        }
        if let Some(max) = max_price {
            query = query.filter(item::Column::Price.lte(max));
        }
        if let Some(class_name) = filter.class_term() {
            query = query
                .inner_join(item_class::Entity)
                .filter(item_class::Column::Name.eq(class_name));
        }

        query
    }

    /// One page (1-based) of filtered items plus the total match count
    pub async fn find_page(
        &self,
        filter: &ItemFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<item::Model>, u64), DbErr> {
        let query = match filter.price_sort() {
            Some(PriceSort::Asc) => self.filtered(filter).order_by_asc(item::Column::Price),
            Some(PriceSort::Desc) => self.filtered(filter).order_by_desc(item::Column::Price),
            None => self.filtered(filter),
        }
        .order_by_asc(item::Column::Name)
        .order_by_asc(item::Column::Id);

        let paginator = query.paginate(self.conn, per_page.max(1));
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(super::page_index(page, per_page)).await?;
        Ok((items, total))
    }

    /// Lowest and highest price among the filtered items
    pub async fn price_bounds(
        &self,
        filter: &ItemFilter,
    ) -> Result<Option<(Decimal, Decimal)>, DbErr> {
        let cheapest = self
            .filtered(filter)
            .order_by_asc(item::Column::Price)
            .one(self.conn)
            .await?;
        let priciest = self
            .filtered(filter)
            .order_by_desc(item::Column::Price)
            .one(self.conn)
            .await?;

        Ok(cheapest.zip(priciest).map(|(lo, hi)| (lo.price, hi.price)))
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<item::Model>, DbErr> {
        item::Entity::find_by_id(id).one(self.conn).await
    }

    pub async fn count(&self) -> Result<u64, DbErr> {
        item::Entity::find().count(self.conn).await
    }

    pub async fn materials_of(&self, item_id: Uuid) -> Result<Vec<material::Model>, DbErr> {
        material::Entity::find()
            .inner_join(item_material::Entity)
            .filter(item_material::Column::ItemId.eq(item_id))
            .order_by_asc(material::Column::Material)
            .all(self.conn)
            .await
    }

    /// Replaces the material set of an item
    pub async fn set_materials(&self, item_id: Uuid, material_ids: &[Uuid]) -> Result<(), DbErr> {
        item_material::Entity::delete_many()
            .filter(item_material::Column::ItemId.eq(item_id))
            .exec(self.conn)
            .await?;

        let mut seen = std::collections::HashSet::new();
        for material_id in material_ids.iter().filter(|id| seen.insert(**id)) {
            item_material::ActiveModel {
                item_id: Set(item_id),
                material_id: Set(*material_id),
            }
            .insert(self.conn)
            .await?;
        }
        Ok(())
    }

    /// Lowers stock by `quantity`, never below zero
    pub async fn decrement_stock(
        &self,
        item: item::Model,
        quantity: i32,
    ) -> Result<item::Model, DbErr> {
        let remaining = (item.count - quantity).max(0);
        let mut active: item::ActiveModel = item.into();
        active.count = Set(remaining);
        active.updated_at = Set(chrono::Utc::now());
        active.update(self.conn).await
    }

    /// Names of the given items keyed by id; missing ids are absent from the map
    pub async fn names_by_ids(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>, DbErr> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<(Uuid, String)> = item::Entity::find()
            .select_only()
            .column(item::Column::Id)
            .column(item::Column::Name)
            .filter(item::Column::Id.is_in(ids.iter().copied()))
            .into_tuple()
            .all(self.conn)
            .await?;
        Ok(rows.into_iter().collect())
    }
}
