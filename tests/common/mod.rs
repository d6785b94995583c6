#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use storefront_api::{
    auth::{hash_password, AuthConfig, AuthService},
    config::AppConfig,
    db,
    entities::{item, user},
    events::{self, EventSender},
    repositories::UserRepository,
    services::{
        catalog::{ItemInput, ReferenceInput, ReferenceKind},
        mailer::{EmailMessage, MailError, Mailer},
        media::LocalMediaStore,
    },
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "k3Jq9vX2mP8rT5wY1zB4nC7dF0gH6jL9qS2uV5xA8eD1iK4oN7rU0tW3yZ6bE9hM";
pub const TEST_PASSWORD: &str = "furniture-lover-42";
pub const TEST_BASE_URL: &str = "http://shop.test";
pub const TEST_MAX_AVATAR_BYTES: usize = 1024;

/// Mailer that keeps every message and can be told to fail
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    pub fn fail_next_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("mailer lock").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::Transport("connection refused".into()));
        }
        self.sent.lock().expect("mailer lock").push(message);
        Ok(())
    }
}

/// Application router over a throwaway SQLite file
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    pub auth_service: Arc<AuthService>,
    pub mailer: Arc<RecordingMailer>,
    pub media_dir: std::path::PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_url = format!("sqlite://{}/test.db?mode=rwc", dir.path().display());

        let mut cfg = AppConfig::new(
            db_url,
            TEST_SECRET.to_string(),
            3600,
            86_400,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        cfg.public_base_url = TEST_BASE_URL.to_string();
        cfg.max_avatar_bytes = TEST_MAX_AVATAR_BYTES;
        cfg.catalog_page_size = 9;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let mailer = Arc::new(RecordingMailer::default());
        let media_dir = dir.path().join("media");
        cfg.media_root = media_dir.display().to_string();
        let media = Arc::new(LocalMediaStore::new(media_dir.clone(), "/media"));

        let auth_service = Arc::new(AuthService::new(
            AuthConfig::from_app_config(&cfg),
            db_arc.clone(),
        ));

        let state = Arc::new(AppState::new(
            db_arc,
            cfg,
            event_sender,
            mailer.clone(),
            media,
        ));
        let router = storefront_api::app_router(state.clone(), auth_service.clone());

        Self {
            router,
            state,
            auth_service,
            mailer,
            media_dir,
            _event_task: event_task,
            _dir: dir,
        }
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response {
        self.request(Method::GET, uri, None, token).await
    }

    /// Active account with [`TEST_PASSWORD`]
    pub async fn create_user(&self, username: &str, superuser: bool) -> user::Model {
        let users = UserRepository::new(&*self.state.db);
        let hash = hash_password(TEST_PASSWORD).expect("hash password");
        let account = users
            .insert_inactive(username, &format!("{}@example.com", username), hash)
            .await
            .expect("insert user");
        if superuser {
            users.grant_superuser(account).await.expect("grant superuser")
        } else {
            users.activate(account).await.expect("activate user")
        }
    }

    pub async fn token_for(&self, account: &user::Model) -> String {
        self.auth_service
            .generate_token(account)
            .await
            .expect("token pair")
            .access_token
    }

    /// Active customer plus an access token for them
    pub async fn customer(&self, username: &str) -> (user::Model, String) {
        let account = self.create_user(username, false).await;
        let token = self.token_for(&account).await;
        (account, token)
    }

    pub async fn staff(&self) -> (user::Model, String) {
        let account = self.create_user("staff", true).await;
        let token = self.token_for(&account).await;
        (account, token)
    }

    pub async fn seed_reference(&self, kind: ReferenceKind, value: &str) -> Uuid {
        self.state
            .services
            .catalog
            .create_reference(
                kind,
                ReferenceInput {
                    value: value.to_string(),
                },
            )
            .await
            .expect("seed reference entry")
            .id
    }

    pub async fn seed_item(
        &self,
        name: &str,
        price: Decimal,
        count: i32,
        item_class_id: Option<Uuid>,
    ) -> Uuid {
        self.state
            .services
            .catalog
            .create_item(ItemInput {
                name: name.to_string(),
                price,
                description: None,
                color_id: None,
                item_class_id,
                material_ids: Vec::new(),
                count,
                image_url: None,
            })
            .await
            .expect("seed item")
            .id
    }

    pub async fn item(&self, id: Uuid) -> Option<item::Model> {
        use sea_orm::EntityTrait;
        item::Entity::find_by_id(id)
            .one(&*self.state.db)
            .await
            .expect("load item")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Messages listed for one field of a form error body
pub fn field_messages(body: &Value, field: &str) -> Vec<String> {
    body["details"][field]
        .as_array()
        .map(|msgs| {
            msgs.iter()
                .filter_map(|m| m.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
