use crate::auth::{AuthRouterExt, AuthUser};
use crate::handlers::common::{no_content_response, success_response};
use crate::{
    errors::ServiceError,
    services::cart::{AddToCartInput, UpdateQuantityInput},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use uuid::Uuid;

/// Creates the router for the signed-in user's cart
pub fn carts_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_to_cart))
        .route("/items/:line_id", put(update_cart_line))
        .route("/items/:line_id", delete(remove_cart_line))
        .with_auth()
}

/// Get the cart with its lines and total
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses(
        (status = 200, description = "Current cart", body = crate::services::cart::CartView),
        (status = 401, description = "Unauthorized")
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.get_cart(&user).await?;
    Ok(success_response(cart))
}

/// Add one unit of an item, creating the cart on first use
#[utoipa::path(
    post,
    path = "/api/v1/cart/items",
    request_body = AddToCartInput,
    responses(
        (status = 200, description = "Line added or incremented", body = crate::services::cart::AddToCartOutcome),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddToCartInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.services.cart.add_item(&user, payload.item_id).await?;
    Ok(success_response(outcome))
}

/// Set the quantity of a cart line
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{line_id}",
    params(("line_id" = Uuid, Path, description = "Cart line id")),
    request_body = UpdateQuantityInput,
    responses(
        (status = 200, description = "Line updated", body = crate::services::cart::CartLineView),
        (status = 400, description = "Quantity below 1 or above stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Line not in this cart", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn update_cart_line(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(line_id): Path<Uuid>,
    Json(payload): Json<UpdateQuantityInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let line = state
        .services
        .cart
        .update_line_quantity(&user, line_id, payload)
        .await?;
    Ok(success_response(line))
}

#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{line_id}",
    params(("line_id" = Uuid, Path, description = "Cart line id")),
    responses(
        (status = 204, description = "Line removed"),
        (status = 404, description = "Line not in this cart", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_line(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(line_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.cart.remove_line(&user, line_id).await?;
    Ok(no_content_response())
}
