use forum_core::config::Config;
use forum_core::database::{create_pool, run_migrations};
use forum_core::store::{ForumStore, MemoryStore, PgStore};
use forum_core::{AppState, create_app};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forum_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let store: Arc<dyn ForumStore> = match &config.database_url {
        Some(database_url) => {
            let db = create_pool(database_url, config.db_max_connections).await?;
            tracing::info!("Database connection pool created");

            run_migrations(&db).await?;
            tracing::info!("Database migrations completed");

            Arc::new(PgStore::new(db))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set, using the in-memory store: one transaction at a time, data is lost on exit"
            );
            Arc::new(MemoryStore::new())
        }
    };

    let addr = format!("{}:{}", config.host, config.port);
    let app = create_app(AppState::new(store, config));

    // Create listener
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
