//! Guestbook - GitHub sign-in and a session-gated guestbook

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guestbook::{
    api::{self, AppState, StageChain},
    config::Config,
    db::{
        self,
        repositories::{SqlxMessageRepository, SqlxSessionRepository, SqlxUserRepository},
    },
    services::{GitHubOAuthClient, LoginService, MessageService, SessionService, UserService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guestbook=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting guestbook...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    config.validate()?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let message_repo = SqlxMessageRepository::boxed(pool.clone());

    // Initialize services
    let provider = Arc::new(GitHubOAuthClient::new(&config.oauth)?);
    let user_service = Arc::new(UserService::new(user_repo));
    let session_service = Arc::new(SessionService::new(session_repo));
    let login_service = Arc::new(LoginService::new(
        provider,
        user_service.clone(),
        session_service.clone(),
        config.oauth.redirect_uri.clone(),
    ));
    let message_service = Arc::new(MessageService::new(message_repo));

    // Build application state
    let session_gate = Arc::new(StageChain::session_gate(
        session_service.clone(),
        user_service.clone(),
    ));
    let state = AppState {
        pool: pool.clone(),
        session_service,
        user_service,
        login_service,
        message_service,
        session_gate,
        auth: Arc::new(config.auth.clone()),
    };

    // Build router
    let app = api::build_router(state, &config.server.cors_origin)?;

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    pool.close().await;
    Ok(())
}
