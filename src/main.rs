//! learnsite - A course publishing site

use anyhow::Result;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use learnsite::{
    config::Config,
    db,
    models::{CreateUserInput, UserRole},
    web::{self, AppState},
};

const ADMIN_USERNAME_ENV: &str = "LEARNSITE_ADMIN_USERNAME";
const ADMIN_PASSWORD_ENV: &str = "LEARNSITE_ADMIN_PASSWORD";
const ADMIN_EMAIL_ENV: &str = "LEARNSITE_ADMIN_EMAIL";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learnsite=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting learnsite...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let state = AppState::new(pool, &config)?;

    match state.user_service.cleanup_expired_sessions().await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Removed {} expired sessions", n),
        Err(e) => tracing::warn!("Failed to remove expired sessions: {}", e),
    }

    bootstrap_admin(&state).await?;

    let app = web::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the first staff account from the environment on an empty database
async fn bootstrap_admin(state: &AppState) -> Result<()> {
    let (Ok(username), Ok(password)) = (
        std::env::var(ADMIN_USERNAME_ENV),
        std::env::var(ADMIN_PASSWORD_ENV),
    ) else {
        return Ok(());
    };

    let email = std::env::var(ADMIN_EMAIL_ENV).unwrap_or_default();
    let input = CreateUserInput {
        username,
        email,
        password,
        role: UserRole::Admin,
    };

    match state.user_service.bootstrap_admin(input).await? {
        Some(user) => tracing::info!("Created admin user {}", user.username),
        None => tracing::debug!("Users already exist, skipping admin bootstrap"),
    }
    Ok(())
}
