use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use scribe_api::AppStateInner;

const DEV_SECRET: &str = "dev-secret-change-me";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scribe=debug,scribe_api=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("SCRIBE_JWT_SECRET").unwrap_or_else(|_| {
        warn!("SCRIBE_JWT_SECRET unset, using the dev secret; do not deploy like this");
        DEV_SECRET.into()
    });
    let jwt_expiry_hours: i64 = std::env::var("SCRIBE_JWT_EXPIRY_HOURS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(24);
    let db_path = std::env::var("SCRIBE_DB_PATH").unwrap_or_else(|_| "scribe.db".into());
    let upload_dir: PathBuf = std::env::var("SCRIBE_UPLOAD_DIR")
        .unwrap_or_else(|_| "./uploads".into())
        .into();
    let host = std::env::var("SCRIBE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("SCRIBE_PORT")
        .unwrap_or_else(|_| "4000".into())
        .parse()?;

    // Init database and upload directory
    let db = scribe_db::Database::open(&PathBuf::from(&db_path))?;
    tokio::fs::create_dir_all(&upload_dir).await?;

    let state = Arc::new(AppStateInner {
        db,
        jwt_secret,
        jwt_expiry_hours,
        upload_dir,
    });

    // CORS: permissive unless a single allowed origin is pinned
    let cors = match std::env::var("SCRIBE_CORS_ORIGIN") {
        Ok(origin) if origin != "*" => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(origin.parse::<HeaderValue>()?))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
        _ => CorsLayer::permissive(),
    };

    let app = scribe_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Scribe server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
