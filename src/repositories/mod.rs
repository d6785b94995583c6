//! Typed query structs. Each borrows a [`sea_orm::ConnectionTrait`] so the same
//! queries run against the pool or inside an open transaction.

pub mod cart_repository;
pub mod comment_repository;
pub mod item_repository;
pub mod purchase_repository;
pub mod reference_repository;
pub mod user_repository;

pub use cart_repository::CartRepository;
pub use comment_repository::CommentRepository;
pub use item_repository::{ItemFilter, ItemRepository, PriceSort};
pub use purchase_repository::{NewPurchaseRecord, PurchaseRepository};
pub use reference_repository::ReferenceRepository;
pub use user_repository::UserRepository;

/// Highest 1-based page whose row offset still fits a signed 64-bit SQL
/// `OFFSET` at `per_page` rows per page.
pub fn max_page(per_page: u64) -> u64 {
    (i64::MAX as u64 / per_page.max(1)).max(1)
}

/// Zero-based page index for `Paginator::fetch_page`, clamped to `1..=max_page`.
pub(crate) fn page_index(page: u64, per_page: u64) -> u64 {
    page.clamp(1, max_page(per_page)) - 1
}
