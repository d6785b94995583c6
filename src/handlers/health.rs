use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::warn;

use crate::AppState;

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Marks process start; uptime in probe responses counts from here
pub fn init_start_time() {
    let _ = STARTED_AT.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    STARTED_AT.get().map_or(0, |t| t.elapsed().as_secs())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dependency {
    pub status: Status,
    pub detail: String,
    pub latency_ms: u64,
}

impl Dependency {
    fn from_result<E: std::fmt::Display>(result: Result<String, E>, started: Instant) -> Self {
        let latency_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(detail) => Self {
                status: Status::Up,
                detail,
                latency_ms,
            },
            Err(e) => Self {
                status: Status::Down,
                detail: e.to_string(),
                latency_ms,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub status: Status,
    pub version: &'static str,
    pub timestamp: String,
    pub uptime_secs: u64,
    /// Catalog, carts, purchases and accounts
    pub database: Dependency,
    /// Avatar uploads are written under `media_root`
    pub media: Dependency,
}

async fn live() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": Status::Up,
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime_secs(),
    }))
}

async fn ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let started = Instant::now();
    let database = Dependency::from_result(
        crate::db::check_connection(&state.db)
            .await
            .map(|_| "reachable".to_string()),
        started,
    );

    let started = Instant::now();
    let media_root = state.config.media_root.clone();
    let media = Dependency::from_result(
        tokio::fs::create_dir_all(&media_root)
            .await
            .map(|_| format!("{} writable", media_root)),
        started,
    );

    let status = if database.status == Status::Up && media.status == Status::Up {
        Status::Up
    } else {
        warn!(db = ?database.status, media = ?media.status, "Readiness probe failing");
        Status::Down
    };
    let code = match status {
        Status::Up => StatusCode::OK,
        Status::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(Readiness {
            status,
            version: env!("CARGO_PKG_VERSION"),
            timestamp: Utc::now().to_rfc3339(),
            uptime_secs: uptime_secs(),
            database,
            media,
        }),
    )
}

/// `GET /health` answers while the process runs; `GET /health/ready` also
/// needs the database and media directory.
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(live))
        .route("/ready", get(ready))
}
