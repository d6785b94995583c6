use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthUser};
use crate::handlers::common::{no_content_response, success_response, PaginationParams};
use crate::{errors::ServiceError, AppState};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Purchase ledger: admin records plus the caller's own snapshots
pub fn purchases_routes() -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/records", get(list_records))
        .route("/records/:id", delete(delete_record))
        .with_permission(perm::PURCHASES_ADMIN);

    Router::new()
        .route("/mine", get(list_snapshots))
        .route("/mine/:id", delete(delete_snapshot))
        .with_auth()
        .merge(admin)
}

#[utoipa::path(
    get,
    path = "/api/v1/purchases/records",
    params(PaginationParams),
    responses(
        (status = 200, description = "Purchase records, newest first", body = crate::services::purchases::PurchaseRecordPage),
        (status = 403, description = "Forbidden")
    ),
    security(("Bearer" = [])),
    tag = "Purchases"
)]
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let (page, per_page) = params.clamped(state.config.api_max_page_size);
    let records = state
        .services
        .purchases
        .list_records(page, per_page)
        .await?;
    Ok(success_response(records))
}

#[utoipa::path(
    delete,
    path = "/api/v1/purchases/records/{id}",
    params(("id" = Uuid, Path, description = "Purchase record id")),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 404, description = "Record not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Purchases"
)]
pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.purchases.delete_record(id).await?;
    Ok(no_content_response())
}

/// The caller's purchase history
#[utoipa::path(
    get,
    path = "/api/v1/purchases/mine",
    responses(
        (status = 200, description = "Snapshots, newest first", body = [crate::services::purchases::SnapshotView])
    ),
    security(("Bearer" = [])),
    tag = "Purchases"
)]
pub async fn list_snapshots(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let snapshots = state.services.purchases.list_snapshots(&user).await?;
    Ok(success_response(snapshots))
}

#[utoipa::path(
    delete,
    path = "/api/v1/purchases/mine/{id}",
    params(("id" = Uuid, Path, description = "Snapshot id")),
    responses(
        (status = 204, description = "Snapshot deleted"),
        (status = 404, description = "Not found or not owned", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Purchases"
)]
pub async fn delete_snapshot(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.purchases.delete_snapshot(&user, id).await?;
    Ok(no_content_response())
}
