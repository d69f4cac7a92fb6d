/// Clipdrop API Server
///
/// Resolves pasted video links into quality options and streams the chosen
/// variant back as an attachment.
mod provider;
mod routes;
mod transfer;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use provider::{MediaProvider, YtDlpProvider};

/// Shared application state for all API handlers.
pub struct AppState {
    pub provider: Arc<dyn MediaProvider>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenvy::dotenv().ok();

    // Init tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clipdrop_api=info,tower_http=info".into()),
        )
        .init();

    // Config
    let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let api_port: u16 = std::env::var("API_PORT")
        .unwrap_or_else(|_| "5000".to_string())
        .parse()
        .unwrap_or(5000);
    let ytdlp_bin = std::env::var("YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_string());
    let provider_timeout: u64 = std::env::var("PROVIDER_TIMEOUT_SECS")
        .unwrap_or_else(|_| "60".to_string())
        .parse()
        .unwrap_or(60);
    let static_dir = std::env::var("STATIC_DIR").ok().map(PathBuf::from);

    info!("Provider: {} (timeout {}s)", ytdlp_bin, provider_timeout);

    // App state
    let state = Arc::new(AppState {
        provider: Arc::new(YtDlpProvider::new(
            ytdlp_bin,
            Duration::from_secs(provider_timeout),
        )),
    });

    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Router
    let mut app = routes::router(state);

    // Static assets with index.html fallback
    match static_dir {
        Some(dir) if dir.is_dir() => {
            info!("Serving static files from {}", dir.display());
            let index = ServeFile::new(dir.join("index.html"));
            app = app.fallback_service(ServeDir::new(&dir).not_found_service(index));
        }
        Some(dir) => warn!("STATIC_DIR {} is not a directory, static serving disabled", dir.display()),
        None => {}
    }

    let app = app.layer(cors).layer(TraceLayer::new_for_http());

    // Bind
    let addr = format!("{}:{}", api_host, api_port);
    info!("Clipdrop API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
