use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use storefront::{
    build_router,
    token::PostgresTokenRepository,
    user::PostgresUserRepository,
    AppConfig, AppState, DiskFileStore, InMemoryTokenRepository, InMemoryUserRepository,
    LogMailer, TokenRepository, UserRepository,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %e, "Server stopped with an error");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), BoxError> {
    info!(environment = %config.environment.as_str(), "Starting storefront server");

    let (user_repository, token_repository): (
        Arc<dyn UserRepository + Send + Sync>,
        Arc<dyn TokenRepository + Send + Sync>,
    ) = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Connected to PostgreSQL and applied migrations");

            (
                Arc::new(PostgresUserRepository::new(pool.clone())),
                Arc::new(PostgresTokenRepository::new(pool)),
            )
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory stores");
            (
                Arc::new(InMemoryUserRepository::new()),
                Arc::new(InMemoryTokenRepository::new()),
            )
        }
    };

    let port = config.port;
    let file_store = Arc::new(DiskFileStore::new(config.upload_dir.clone()));
    let state = AppState::new(
        config,
        user_repository,
        token_repository,
        Arc::new(LogMailer::new()),
        file_store,
    );

    spawn_cleanup(state.clone());

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await?;
    info!("Server running on http://localhost:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

/// Periodically drops expired tokens and finished rate-limit windows
fn spawn_cleanup(state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = state.token_service.delete_expired().await {
                warn!(error = %e, "Expired token cleanup failed");
            }
            state.rate_limiter.cleanup().await;
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
