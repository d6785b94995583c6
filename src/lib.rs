//! Storefront API Library
//!
//! Catalog, carts, checkout and accounts for a small online furniture shop.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod openapi;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::AuthService;
use crate::services::{mailer::Mailer, media::MediaStore};

/// Shared by every storefront handler
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
        mailer: Arc<dyn Mailer>,
        media: Arc<dyn MediaStore>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender, mailer, media, &config);
        Self {
            db,
            config,
            services,
        }
    }
}

/// Body of `GET /api/v1/status`
#[derive(Debug, Serialize, ToSchema)]
pub struct ServiceStatus {
    pub service: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ServiceStatus {
    fn capture(config: &config::AppConfig) -> Self {
        Self {
            service: "storefront-api",
            version: env!("CARGO_PKG_VERSION"),
            environment: config.environment.clone(),
            timestamp: Utc::now().to_rfc3339(),
            request_id: crate::tracing::current_request_id().map(|id| id.to_string()),
        }
    }
}

async fn api_status(State(state): State<Arc<AppState>>) -> Json<ServiceStatus> {
    Json(ServiceStatus::capture(&state.config))
}

/// Versioned JSON API: catalog, cart, checkout and purchases
pub fn api_v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/status", get(api_status))
        .merge(handlers::catalog::catalog_routes())
        .nest("/cart", handlers::carts::carts_routes())
        .nest("/checkout", handlers::checkout::checkout_routes())
        .nest("/purchases", handlers::purchases::purchases_routes())
}

/// Every route the server exposes, with request ids and the auth service wired in.
/// Transport layers (trace, compression, CORS, timeout, media files) are added by the binary.
pub fn app_router(state: Arc<AppState>, auth_service: Arc<AuthService>) -> Router {
    let max_avatar_bytes = state.config.max_avatar_bytes;

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .nest(
            "/accounts",
            handlers::accounts::accounts_routes(max_avatar_bytes),
        )
        .nest("/health", handlers::health::health_routes())
        .nest("/auth", auth::auth_routes().with_state(auth_service.clone()))
        .merge(openapi::swagger_ui())
        .layer(axum::middleware::from_fn_with_state(
            auth_service,
            inject_auth_service,
        ))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

/// `AuthUser` and the permission layers read the service from extensions.
async fn inject_auth_service(
    State(auth): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Response {
    req.extensions_mut().insert(auth);
    next.run(req).await
}
