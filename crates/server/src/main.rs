//! Pollcast server entry point.

use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use pollcast_api::{AppState, auth_middleware, router as api_router};
use pollcast_common::Config;
use pollcast_common::config::VoteBackendKind;
use pollcast_core::{
    Collaborators, InMemoryVoteBackend, PlaceholderAvatarPolicy, VoteBackend, VoteStore,
};
use pollcast_realtime::RedisVoteBackend;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pollcast=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting pollcast server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = pollcast_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    pollcast_db::migrate(&db).await?;
    info!("Migrations completed");

    // Vote storage
    let mut redis_backend = None;
    let backend: Arc<dyn VoteBackend> = match config.votes.backend {
        VoteBackendKind::Memory => {
            warn!("Using in-memory vote storage; votes are lost on restart");
            Arc::new(InMemoryVoteBackend::new())
        }
        VoteBackendKind::Redis => {
            info!("Connecting to Redis...");
            let backend = RedisVoteBackend::from_config(&config.votes).await?;
            backend.start().await?;
            redis_backend = Some(backend.clone());
            info!("Redis vote storage ready");
            Arc::new(backend)
        }
    };

    let state = AppState::new(
        Collaborators::database(Arc::new(db)),
        VoteStore::new(backend),
        Arc::new(PlaceholderAvatarPolicy::from_config(&config.avatar)),
    );

    // Build router
    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .nest("/api", api_router())
        .layer(middleware::from_fn(auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(backend) = redis_backend {
        if let Err(e) = backend.shutdown().await {
            warn!(error = %e, "Redis shutdown failed");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
