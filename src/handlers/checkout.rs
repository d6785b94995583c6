use crate::auth::{AuthRouterExt, AuthUser};
use crate::handlers::common::success_response;
use crate::{errors::ServiceError, services::checkout::PaymentForm, AppState};
use axum::{
    extract::{Json, State},
    response::IntoResponse,
    routing::post,
    Router,
};
use std::sync::Arc;

pub fn checkout_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", post(checkout)).with_auth()
}

/// Purchase everything in the cart
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = PaymentForm,
    responses(
        (status = 200, description = "Cart purchased and emptied", body = crate::services::checkout::CheckoutReceipt),
        (status = 400, description = "Invalid payment details", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("Bearer" = [])),
    tag = "Checkout"
)]
pub async fn checkout(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PaymentForm>,
) -> Result<impl IntoResponse, ServiceError> {
    let receipt = state.services.checkout.checkout(&user, payload).await?;
    Ok(success_response(receipt))
}
