mod bot;
mod config;
mod handlers;
mod services;
mod state;
mod traits;

use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::TelegramBot;
use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "factbot_server=trace,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match ServerConfig::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let app_state = match AppState::new(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to initialize server state: {:#}", e);
            std::process::exit(1);
        }
    };

    // Artifacts from a previous run are stale; sweep them before serving.
    let failures = app_state.cache.purge_all();
    for failure in &failures {
        tracing::warn!(
            "Startup purge left {} behind: {}",
            failure.path.display(),
            failure.reason
        );
    }
    tracing::info!(
        "Audio cache ready ({} artifacts retained)",
        app_state.cache.len()
    );

    // Configure TraceLayer to include headers and latency
    let trace_layer = TraceLayer::new_for_http()
        .on_request(|request: &axum::extract::Request, _span: &tracing::Span| {
            tracing::info!(
                "Started request: {} {} {:?}",
                request.method(),
                request.uri(),
                request.headers()
            );
        })
        .on_response(
            |response: &axum::response::Response,
             latency: std::time::Duration,
             _span: &tracing::Span| {
                tracing::info!(
                    "Finished request: {:?} in {:?}ms",
                    response.status(),
                    latency.as_millis()
                );
            },
        );

    let app = handlers::router(app_state.clone()).layer(trace_layer);

    // The bot is optional; the HTTP surface runs either way.
    if app_state.config.telegram.enable {
        if app_state.config.telegram.token.is_empty() {
            tracing::warn!("Telegram bot enabled but no token configured, skipping");
        } else {
            let voice_dir = std::path::Path::new(&app_state.config.tts.cache_dir).join("bot");
            let bot = Arc::new(TelegramBot::new(
                app_state.config.telegram.clone(),
                voice_dir,
            ));
            tokio::spawn(bot.run());
        }
    }

    // Run it
    let port = app_state.config.server.port;
    let host = &app_state.config.server.host;
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .expect("Invalid host/port");

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
