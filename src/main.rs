use rusty_library_lending::{
    adapters::postgres::{PostgresCatalogStore, PostgresLedgerStore, PostgresUnitOfWork},
    api::{handlers::AppState, router::create_router},
    application::ServiceDependencies,
    config::AppConfig,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load configuration (.env included)
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rusty_library_lending=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Initialize database connection pool
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!("Database migrations completed");

    // Initialize adapters
    let catalog_store = Arc::new(PostgresCatalogStore::new(pool.clone()));
    let ledger_store = Arc::new(PostgresLedgerStore::new(pool.clone()));
    let unit_of_work = Arc::new(PostgresUnitOfWork::new(pool, config.lock_timeout));

    // Create service dependencies
    let service_deps = ServiceDependencies {
        catalog_store,
        ledger_store,
        unit_of_work,
        retry_policy: config.retry_policy,
    };

    // Create application state
    let app_state = Arc::new(AppState { service_deps });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
