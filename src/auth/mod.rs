/*!
 * # Authentication and Authorization Module
 *
 * - JWT access and refresh tokens issued for storefront accounts
 * - Argon2 password hashing
 * - HMAC account activation tokens sent by email after signup
 * - Permission checks layered onto routers with [`AuthRouterExt`]
 */

use axum::{
    async_trait,
    extract::{DefaultBodyLimit, FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Duration as ChronoDuration;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::user;

mod activation;
mod password;
mod permissions;
mod tokens;

pub use activation::{decode_uid, encode_uid, ActivationTokens};
pub use password::{
    check_password_policy, hash_password, verify_password, PasswordPolicyError,
    MIN_PASSWORD_LENGTH,
};
pub use permissions::*;
pub use tokens::{Claims, TokenKind};

use tokens::RevocationList;

/// The caller behind a validated access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    /// Username, shown on comments and the cart title
    pub name: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r == roles::ADMIN)
    }

    /// Admins pass every permission check.
    pub fn can(&self, permission: &str) -> bool {
        self.is_admin() || self.permissions.iter().any(|p| p == permission)
    }

    fn from_claims(claims: Claims) -> Result<Self, AuthError> {
        if claims.kind != TokenKind::Access {
            return Err(AuthError::InvalidToken);
        }
        Ok(Self {
            user_id: claims.account_id().ok_or(AuthError::InvalidToken)?,
            name: claims.name,
            email: claims.email,
            roles: claims.roles,
            permissions: claims.permissions,
            token_id: claims.jti,
        })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
            refresh_token_expiration,
        }
    }

    pub fn from_app_config(cfg: &crate::config::AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            "storefront-api".to_string(),
            "storefront-auth".to_string(),
            Duration::from_secs(cfg.jwt_expiration as u64),
            Duration::from_secs(cfg.refresh_token_expiration as u64),
        )
    }

    fn ttl(&self, kind: TokenKind) -> Result<ChronoDuration, AuthError> {
        let ttl = match kind {
            TokenKind::Access => self.access_token_expiration,
            TokenKind::Refresh => self.refresh_token_expiration,
        };
        ChronoDuration::from_std(ttl)
            .map_err(|_| AuthError::InternalError("token lifetime out of range".to_string()))
    }
}

/// Checks credentials, issues and rotates tokens, and tracks revocations
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
    revoked: Arc<RevocationList>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self {
            config,
            db,
            revoked: Arc::new(RevocationList::default()),
        }
    }

    /// `login` may be the username or the email. Wrong passwords and unknown
    /// accounts are indistinguishable; inactive accounts are refused after
    /// the password matches.
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<user::Model, AuthError> {
        let login = login.trim();
        let account = user::Entity::find()
            .filter(
                Condition::any()
                    .add(user::Column::Username.eq(login))
                    .add(user::Column::Email.eq(login)),
            )
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash)
            .map_err(|e| AuthError::InternalError(e.to_string()))?
        {
            warn!(user_id = %account.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        if !account.is_active {
            return Err(AuthError::InactiveAccount);
        }
        Ok(account)
    }

    pub async fn generate_token(&self, account: &user::Model) -> Result<TokenPair, AuthError> {
        let access = self.sign(account, TokenKind::Access)?;
        let refresh = self.sign(account, TokenKind::Refresh)?;
        debug!(user_id = %account.id, "issued token pair");

        Ok(TokenPair {
            access_token: access,
            refresh_token: refresh,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            refresh_expires_in: self.config.refresh_token_expiration.as_secs() as i64,
        })
    }

    fn sign(&self, account: &user::Model, kind: TokenKind) -> Result<String, AuthError> {
        let claims = Claims::for_account(
            account,
            kind,
            self.config.ttl(kind)?,
            &self.config.jwt_issuer,
            &self.config.jwt_audience,
            grants_for(account),
        );
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Signature, audience, issuer, expiry and revocation checks.
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.revoked.contains(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }
        Ok(claims)
    }

    /// Exchanges a refresh token for a fresh pair and revokes the old one.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.validate_token(refresh_token).await?;
        if claims.kind != TokenKind::Refresh {
            return Err(AuthError::InvalidToken);
        }
        let user_id = claims.account_id().ok_or(AuthError::InvalidToken)?;

        let account = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;
        if !account.is_active {
            return Err(AuthError::InactiveAccount);
        }

        let pair = self.generate_token(&account).await?;
        self.revoked.revoke(claims.jti, claims.exp).await;
        Ok(pair)
    }

    /// Revokes a token until it would have expired anyway
    pub async fn revoke_token(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.validate_token(token).await?;
        self.revoked.revoke(claims.jti, claims.exp).await;
        Ok(())
    }

    async fn authorize(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingAuth)?;
        AuthUser::from_claims(self.validate_token(token).await?)
    }
}

/// Superusers manage the catalog, see purchase records and moderate comments.
fn grants_for(account: &user::Model) -> (Vec<String>, Vec<String>) {
    if !account.is_superuser {
        return (vec![roles::CUSTOMER.to_string()], vec![]);
    }
    let permissions = [
        consts::CATALOG_MANAGE,
        consts::PURCHASES_ADMIN,
        consts::COMMENTS_MODERATE,
    ];
    (
        vec![roles::ADMIN.to_string()],
        permissions.iter().map(|p| p.to_string()).collect(),
    )
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_expires_in: i64,
}

/// Login credentials; `username` also accepts the account email
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is not activated; follow the link sent by email")]
    InactiveAccount,

    #[error("No authentication token provided")]
    MissingToken,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Authentication token has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::MissingAuth => (StatusCode::UNAUTHORIZED, "AUTH_MISSING"),
            Self::InvalidCredentials => (StatusCode::UNAUTHORIZED, "AUTH_INVALID_CREDENTIALS"),
            Self::InactiveAccount => (StatusCode::UNAUTHORIZED, "AUTH_INACTIVE_ACCOUNT"),
            Self::MissingToken => (StatusCode::UNAUTHORIZED, "AUTH_MISSING_TOKEN"),
            Self::InvalidToken => (StatusCode::UNAUTHORIZED, "AUTH_INVALID_TOKEN"),
            Self::TokenExpired => (StatusCode::UNAUTHORIZED, "AUTH_TOKEN_EXPIRED"),
            Self::RevokedToken => (StatusCode::UNAUTHORIZED, "AUTH_REVOKED_TOKEN"),
            Self::UserNotFound => (StatusCode::NOT_FOUND, "AUTH_USER_NOT_FOUND"),
            Self::InsufficientPermissions => (StatusCode::FORBIDDEN, "AUTH_INSUFFICIENT_PERMISSIONS"),
            Self::TokenCreation(_) => (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_TOKEN_CREATION_FAILED"),
            Self::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_DATABASE_ERROR"),
            Self::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "AUTH_INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status.is_server_error() {
            warn!(error = %self, "authentication failure");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = serde_json::json!({ "error": { "code": code, "message": message } });
        (status, Json(body)).into_response()
    }
}

/// Rejects callers whose token lacks `required_permission`
pub async fn permission_middleware(
    State(required_permission): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .ok_or(AuthError::MissingAuth)?;
    if !user.can(&required_permission) {
        return Err(AuthError::InsufficientPermissions);
    }
    Ok(next.run(request).await)
}

/// Resolves the bearer token into an [`AuthUser`] request extension
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let Some(auth_service) = request.extensions().get::<Arc<AuthService>>().cloned() else {
        return AuthError::InternalError("auth service missing from request".to_string())
            .into_response();
    };

    match auth_service.authorize(request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn auth_routes() -> Router<Arc<AuthService>> {
    Router::new()
        .route("/login", post(login_handler))
        .route("/refresh", post(refresh_token_handler))
        .route("/logout", post(logout_handler))
        .layer(DefaultBodyLimit::max(64 * 1024))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 401, description = "Invalid credentials or inactive account")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<TokenPair>, AuthError> {
    let account = auth_service
        .authenticate(&credentials.username, &credentials.password)
        .await?;
    let pair = auth_service.generate_token(&account).await?;
    info!(user_id = %account.id, "user logged in");
    Ok(Json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = TokenPair),
        (status = 401, description = "Invalid, expired or already used refresh token")
    ),
    tag = "auth"
)]
pub async fn refresh_token_handler(
    State(auth_service): State<Arc<AuthService>>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<TokenPair>, AuthError> {
    Ok(Json(auth_service.refresh_token(&body.refresh_token).await?))
}

/// Revokes the presented access token
pub async fn logout_handler(
    State(auth_service): State<Arc<AuthService>>,
    headers: HeaderMap,
) -> Result<StatusCode, AuthError> {
    let token = bearer_token(&headers).ok_or(AuthError::MissingToken)?;
    auth_service.revoke_token(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Router helpers: `with_auth` requires a valid access token,
/// `with_permission` additionally requires a grant.
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_permission(self, permission: &str) -> Self;
}

impl<S> AuthRouterExt for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_permission(self, permission: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            permission.to_string(),
            permission_middleware,
        ))
        .with_auth()
    }
}
