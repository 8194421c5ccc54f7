//! Composition root: loads configuration, wires every component, serves
//! the HTTP/WebSocket surface, and drains in-flight work on shutdown
//! (§5 "Cancellation", §6 "Exit codes").

mod config;
mod shutdown;

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api_gateway::{AppState, RateLimitConfig};
use auth::TokenIssuer;
use config::{CoordinatorConfig, DatabaseType};
use endpoint_manager::EndpointManager;
use persistence::{PersistenceError, PostgresStore, SqliteStore, Store};
use pool_manager::PoolManager;
use repository_analyzer::RepositoryAnalyzer;
use shared_bus::{EndpointEventBus, EventPublisher};
use state_manager::{StateManager, StateManagerConfig};
use sync_coordinator::WatchdogConfig;
use tracing::{error, info};

const CONFIG_PATH_ENV: &str = "PACSYNC_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "coordinator";

#[tokio::main]
async fn main() {
    let exit_code = run().await;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

async fn run() -> i32 {
    let config_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = match CoordinatorConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fatal configuration error: {err}");
            return 1;
        }
    };

    init_logging(&config.log);
    info!(path = %config_path, "configuration loaded");

    let store = match build_store(&config.database).await {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "failed to initialize persistence layer");
            return 2;
        }
    };

    if let Err(err) = store.run_migrations().await {
        error!(error = %err, "failed to run schema migrations");
        return 2;
    }

    let admin_tokens: Vec<String> = env::var("PACSYNC_ADMIN_TOKENS")
        .map(|raw| raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    let tokens = Arc::new(
        TokenIssuer::new(config.security.jwt_secret_key.into_bytes(), config.security.token_expiry_hours * 3600)
            .with_admin_tokens(admin_tokens),
    );
    let events = Arc::new(EndpointEventBus::new());
    let publisher: Arc<dyn EventPublisher> = events.clone();
    let sync = sync_coordinator::spawn(store.clone(), publisher, WatchdogConfig::default());

    let app_state = AppState {
        store: store.clone(),
        tokens: tokens.clone(),
        endpoints: Arc::new(EndpointManager::new(store.clone(), tokens.clone())),
        pools: Arc::new(PoolManager::new(store.clone())),
        states: Arc::new(StateManager::new(store.clone(), StateManagerConfig::default())),
        analyzer: Arc::new(RepositoryAnalyzer::new(store.clone())),
        sync,
        events,
    };

    let router = api_gateway::build_router(
        app_state.clone(),
        &config.server.cors_origins,
        RateLimitConfig { requests_per_minute: config.api.rate_limit_per_minute, enabled: true },
        config.features.repository_analysis,
    );

    let addr: SocketAddr = match format!("{}:{}", config.server.host, config.server.port).parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, "invalid server.host/server.port");
            return 1;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, %addr, "failed to bind listening socket");
            return 2;
        }
    };
    info!(%addr, "coordinator listening");

    let server = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown::wait_for_signal());

    match server.await {
        Ok(()) => {
            info!("accept loop drained, finishing in-progress operations");
            shutdown::fail_surviving_operations(&*app_state.store, Duration::from_secs(30)).await;
            info!("shutdown complete");
            if shutdown::received_sigint() {
                130
            } else {
                0
            }
        }
        Err(err) => {
            error!(error = %err, "server exited with an uncaught error");
            3
        }
    }
}

async fn build_store(database: &config::DatabaseConfig) -> Result<Arc<dyn Store>, PersistenceError> {
    match database.kind {
        DatabaseType::Internal => {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .min_connections(database.pool_min_size)
                .max_connections(database.pool_max_size)
                .connect(&database.url)
                .await
                .map_err(|err| PersistenceError::backend("connect", err))?;
            Ok(Arc::new(SqliteStore::new(pool)))
        }
        DatabaseType::Postgresql => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .min_connections(database.pool_min_size)
                .max_connections(database.pool_max_size)
                .connect(&database.url)
                .await
                .map_err(|err| PersistenceError::backend("connect", err))?;
            Ok(Arc::new(PostgresStore::new(pool)))
        }
    }
}

fn init_logging(log: &config::LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&log.level).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if log.structured {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
