use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use common::cache::{RedisConfig, RedisPool};
use common::database::{DatabaseConfig, health_check, init_pool};
use tracing::info;
use tracing_subscriber::EnvFilter;

use library::{
    AppState,
    config::{ServerConfig, SessionBackend},
    password::Argon2Hasher,
    routes::create_router,
    session::{MemorySessionStore, RedisSessionStore, SessionStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting bookshelf service");

    let config = ServerConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let sessions: Arc<dyn SessionStore> = match config.session_backend {
        SessionBackend::Memory => {
            info!("Keeping sessions in memory");
            Arc::new(MemorySessionStore::new())
        }
        SessionBackend::Redis => {
            let redis_config = RedisConfig::from_env()?;
            let redis_pool = RedisPool::new(&redis_config).await?;
            if !redis_pool.health_check().await? {
                anyhow::bail!("Failed to connect to Redis");
            }
            info!("Keeping sessions in Redis");
            Arc::new(RedisSessionStore::new(redis_pool))
        }
    };

    let bind_address = config.bind_address.clone();
    let app_state = AppState::new(pool, Arc::new(Argon2Hasher::default()), sessions, config);
    app_state.uploads.ensure_dirs().await?;
    info!("Storing uploads under {}", app_state.uploads.root().display());

    // Start the web server
    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Bookshelf service listening on {}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
