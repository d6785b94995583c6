use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::repositories::max_page;

pub fn success_response<T: Serialize>(data: T) -> Response {
    Json(data).into_response()
}

/// 201 with the stored resource as body
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(data)).into_response()
}

pub fn no_content_response() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

fn first_page() -> u64 {
    1
}

fn records_per_page() -> u64 {
    20
}

/// `?page=&per_page=` for staff listings such as purchase records
#[derive(Debug, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct PaginationParams {
    #[serde(default = "first_page")]
    pub page: u64,
    #[serde(default = "records_per_page")]
    pub per_page: u64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: first_page(),
            per_page: records_per_page(),
        }
    }
}

impl PaginationParams {
    /// Page numbers start at 1 and page size stays within `1..=max_per_page`
    /// and the page stays within [`max_page`] for that size
    pub fn clamped(&self, max_per_page: u64) -> (u64, u64) {
        let per_page = self.per_page.clamp(1, max_per_page.max(1));
        (self.page.clamp(1, max_page(per_page)), per_page)
    }
}

/// `?page=` for the item list; the page size is `catalog_page_size`
#[derive(Debug, Deserialize, Serialize, IntoParams, ToSchema)]
pub struct PageParam {
    #[serde(default = "first_page")]
    pub page: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 0, 50 => (1, 1) ; "zeros are raised")]
    #[test_case(3, 20, 50 => (3, 20) ; "within bounds")]
    #[test_case(2, 500, 50 => (2, 50) ; "page size capped")]
    #[test_case(u64::MAX, 20, 50 => (i64::MAX as u64 / 20, 20) ; "page number capped")]
    fn clamps_pagination(page: u64, per_page: u64, max: u64) -> (u64, u64) {
        PaginationParams { page, per_page }.clamped(max)
    }

    #[test]
    fn missing_query_values_take_defaults() {
        let params: PaginationParams = serde_json::from_str("{}").unwrap();
        assert_eq!((params.page, params.per_page), (1, 20));
        let page: PageParam = serde_json::from_str("{}").unwrap();
        assert_eq!(page.page, 1);
    }
}
