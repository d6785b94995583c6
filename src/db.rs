use crate::config::AppConfig;
use crate::errors::ServiceError;
use metrics::{counter, gauge};
use migrations::Migrator;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

pub type DbPool = DatabaseConnection;

/// Pool settings derived from `AppConfig`
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl DbConfig {
    /// Each connection to `sqlite::memory:` opens its own empty database,
    /// so such pools are pinned to a single connection.
    fn is_in_memory_sqlite(&self) -> bool {
        self.url.starts_with("sqlite::memory:") || self.url.contains("mode=memory")
    }

    fn backend(&self) -> &str {
        self.url.split(':').next().unwrap_or("unknown")
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        let mut db = Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        };
        if db.is_in_memory_sqlite() {
            db.max_connections = 1;
            db.min_connections = 1;
        }
        db
    }
}

/// Opens the connection pool used by every repository.
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    gauge!("storefront_db.max_connections", config.max_connections as f64);

    let pool = Database::connect(opt).await.map_err(|e| {
        counter!("storefront_db.connection_failures", 1);
        error!(backend = config.backend(), error = %e, "could not open database pool");
        ServiceError::DatabaseError(e)
    })?;

    info!(
        backend = config.backend(),
        max_connections = config.max_connections,
        "database pool ready"
    );
    Ok(pool)
}

pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    establish_connection_with_config(&DbConfig::from(cfg)).await
}

/// Applies pending migrations for users, catalog, carts and purchases.
#[instrument(skip(pool))]
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    match Migrator::up(pool, None).await {
        Ok(()) => {
            info!(elapsed_ms = started.elapsed().as_millis() as u64, "schema up to date");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "migration failed");
            Err(ServiceError::DatabaseError(e))
        }
    }
}

pub async fn check_connection(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    if let Err(e) = pool.ping().await {
        counter!("storefront_db.connection_failures", 1);
        error!(error = %e, "database ping failed");
        return Err(ServiceError::DatabaseError(e));
    }

    let elapsed = started.elapsed();
    gauge!("storefront_db.ping_ms", elapsed.as_millis() as f64);
    debug!(elapsed_ms = elapsed.as_millis() as u64, "database ping");
    Ok(())
}
