use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthUser};
use crate::handlers::common::{created_response, no_content_response, success_response, PageParam};
use crate::{
    errors::ServiceError,
    repositories::ItemFilter,
    services::catalog::{CommentInput, ItemInput, ReferenceInput, ReferenceKind},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Catalog routes: items, their comments, reference data and the index counts
pub fn catalog_routes() -> Router<Arc<AppState>> {
    let managed = Router::new()
        .route("/items", post(create_item))
        .route("/items/:id", put(update_item))
        .route("/items/:id", delete(delete_item))
        .route("/references/:kind", post(create_reference))
        .route("/references/:kind/:id", delete(delete_reference))
        .with_permission(perm::CATALOG_MANAGE);

    let commenting = Router::new()
        .route("/items/:id/comments", post(post_comment))
        .route("/comments/:id", delete(delete_comment))
        .with_auth();

    Router::new()
        .route("/index", get(index))
        .route("/items", get(list_items))
        .route("/items/:id", get(get_item))
        .route("/references/:kind", get(list_reference))
        .merge(managed)
        .merge(commenting)
}

fn reference_kind(segment: &str) -> Result<ReferenceKind, ServiceError> {
    match segment {
        "classes" => Ok(ReferenceKind::ItemClass),
        "colors" => Ok(ReferenceKind::Color),
        "materials" => Ok(ReferenceKind::Material),
        other => Err(ServiceError::NotFound(format!(
            "Unknown reference list '{}'",
            other
        ))),
    }
}

/// Item and item class counts for the landing page
#[utoipa::path(
    get,
    path = "/api/v1/index",
    responses((status = 200, description = "Catalog counts", body = crate::services::catalog::IndexCounts)),
    tag = "Catalog"
)]
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ServiceError> {
    let counts = state.services.catalog.index_counts().await?;
    Ok(success_response(counts))
}

/// Filtered, sorted and paginated item list
#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(ItemFilter, PageParam),
    responses(
        (status = 200, description = "Page of items", body = crate::services::catalog::ItemPage)
    ),
    tag = "Catalog"
)]
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ItemFilter>,
    Query(page): Query<PageParam>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state.services.catalog.list_items(filter, page.page).await?;
    Ok(success_response(page))
}

#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item with materials and comments", body = crate::services::catalog::ItemDetail),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.catalog.get_item(id).await?;
    Ok(success_response(item))
}

#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = ItemInput,
    responses(
        (status = 201, description = "Item created", body = crate::services::catalog::ItemDetail),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.catalog.create_item(payload).await?;
    Ok(created_response(item))
}

#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = ItemInput,
    responses(
        (status = 200, description = "Item replaced", body = crate::services::catalog::ItemDetail),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ItemInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let item = state.services.catalog.update_item(id, payload).await?;
    Ok(success_response(item))
}

#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 204, description = "Item deleted"),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.catalog.delete_item(id).await?;
    Ok(no_content_response())
}

/// Any signed-in user may comment on an item
#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/comments",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = CommentInput,
    responses(
        (status = 201, description = "Comment posted", body = crate::services::catalog::CommentView),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn post_comment(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<CommentInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let comment = state
        .services
        .catalog
        .post_comment(item_id, &user, payload)
        .await?;
    Ok(created_response(comment))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment deleted; body names the item to return to"),
        (status = 403, description = "Not the author", body = crate::errors::ErrorResponse),
        (status = 404, description = "Comment not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let item_id = state.services.catalog.delete_comment(id, &user).await?;
    Ok(success_response(json!({
        "deleted": id,
        "item_id": item_id,
    })))
}

/// Lists one of `classes`, `colors` or `materials`
#[utoipa::path(
    get,
    path = "/api/v1/references/{kind}",
    params(("kind" = String, Path, description = "classes, colors or materials")),
    responses(
        (status = 200, description = "Reference entries", body = [crate::services::catalog::ReferenceEntry]),
        (status = 404, description = "Unknown list", body = crate::errors::ErrorResponse)
    ),
    tag = "Catalog"
)]
pub async fn list_reference(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let entries = state
        .services
        .catalog
        .list_reference(reference_kind(&kind)?)
        .await?;
    Ok(success_response(entries))
}

#[utoipa::path(
    post,
    path = "/api/v1/references/{kind}",
    params(("kind" = String, Path, description = "classes, colors or materials")),
    request_body = ReferenceInput,
    responses(
        (status = 201, description = "Entry created", body = crate::services::catalog::ReferenceEntry),
        (status = 400, description = "Too long or duplicate", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn create_reference(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Json(payload): Json<ReferenceInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let entry = state
        .services
        .catalog
        .create_reference(reference_kind(&kind)?, payload)
        .await?;
    Ok(created_response(entry))
}

#[utoipa::path(
    delete,
    path = "/api/v1/references/{kind}/{id}",
    params(
        ("kind" = String, Path, description = "classes, colors or materials"),
        ("id" = Uuid, Path, description = "Entry id")
    ),
    responses(
        (status = 204, description = "Entry deleted"),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Catalog"
)]
pub async fn delete_reference(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<impl IntoResponse, ServiceError> {
    state
        .services
        .catalog
        .delete_reference(reference_kind(&kind)?, id)
        .await?;
    Ok(no_content_response())
}
