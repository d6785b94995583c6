use crate::auth::{AuthRouterExt, AuthUser};
use crate::handlers::common::{created_response, success_response};
use crate::{
    errors::ServiceError,
    services::accounts::{ProfileUpdateForm, SignupForm},
    AppState,
};
use axum::{
    extract::{DefaultBodyLimit, Json, Path, State},
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Account routes. Mounted at `/accounts` so emailed activation links resolve.
pub fn accounts_routes(max_avatar_bytes: usize) -> Router<Arc<AppState>> {
    // base64 inflates the avatar by a third; leave room for the rest of the form
    let profile_body_limit = max_avatar_bytes / 3 * 4 + 64 * 1024;

    let profile = Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .layer(DefaultBodyLimit::max(profile_body_limit))
        .with_auth();

    Router::new()
        .route("/signup", post(signup))
        .route("/activate/:uid/:token", get(activate))
        .route("/activate/:uid/:token/", get(activate))
        .merge(profile)
}

/// Register an inactive account and email its activation link
#[utoipa::path(
    post,
    path = "/accounts/signup",
    request_body = SignupForm,
    responses(
        (status = 201, description = "Account created, activation email sent", body = crate::services::accounts::SignupOutcome),
        (status = 400, description = "Invalid form", body = crate::errors::ErrorResponse)
    ),
    tag = "Accounts"
)]
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SignupForm>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.services.accounts.signup(payload).await?;
    Ok(created_response(outcome))
}

/// Follow an activation link
#[utoipa::path(
    get,
    path = "/accounts/activate/{uid}/{token}",
    params(
        ("uid" = String, Path, description = "URL-safe base64 user id"),
        ("token" = String, Path, description = "Activation token")
    ),
    responses(
        (status = 200, description = "Activated or already active", body = crate::services::accounts::ActivationOutcome),
        (status = 400, description = "Activation link is invalid", body = crate::errors::ErrorResponse)
    ),
    tag = "Accounts"
)]
pub async fn activate(
    State(state): State<Arc<AppState>>,
    Path((uid, token)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.services.accounts.activate(&uid, &token).await?;
    Ok(success_response(outcome))
}

#[utoipa::path(
    get,
    path = "/accounts/profile",
    responses(
        (status = 200, description = "Profile with purchase history", body = crate::services::accounts::ProfileView),
        (status = 401, description = "Unauthorized")
    ),
    security(("Bearer" = [])),
    tag = "Accounts"
)]
pub async fn get_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state.services.accounts.profile(&user).await?;
    Ok(success_response(profile))
}

#[utoipa::path(
    put,
    path = "/accounts/profile",
    request_body = ProfileUpdateForm,
    responses(
        (status = 200, description = "Profile updated", body = crate::services::accounts::ProfileView),
        (status = 400, description = "Invalid form", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Accounts"
)]
pub async fn update_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ProfileUpdateForm>,
) -> Result<impl IntoResponse, ServiceError> {
    let profile = state
        .services
        .accounts
        .update_profile(&user, payload)
        .await?;
    Ok(success_response(profile))
}
