use anyhow::{Context, Result};
use axum::{
    Router,
    http::{HeaderName, Method},
    routing::{get, post},
};
use clap::Parser;
use std::{path::PathBuf, sync::Arc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::MakeSpan;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use uuid::Uuid;

mod config;
mod error;
mod handlers;
mod identity;
mod metrics;
mod store;
#[cfg(test)]
mod test_helpers;
mod ws;

use crate::config::{CorsOrigins, FileConfig, ServerConfig};
use crate::metrics::ServerMetrics;
use crate::store::MessageStore;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Parser)]
#[command(name = "chat")]
#[command(about = "Real-time chat server with online presence")]
struct Cli {
    /// Host to bind to (overrides config file)
    #[arg(short = 'b', long)]
    host: Option<String>,

    /// Port to listen on (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Path to the TOML config file
    #[arg(short, long, default_value = "chat.toml")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub config: Arc<ServerConfig>,
    pub hub: Arc<ws::ChatHub>,
    pub sockets: Arc<ws::SocketTable>,
    pub store: Arc<MessageStore>,
    pub metrics: Arc<ServerMetrics>,
}

impl AppState {
    pub(crate) fn new(config: ServerConfig) -> Self {
        let metrics = Arc::new(ServerMetrics::new());
        let sockets = Arc::new(ws::SocketTable::new(metrics.clone()));
        let hub = Arc::new(ws::ChatHub::new(sockets.clone()));
        Self {
            config: Arc::new(config),
            hub,
            sockets,
            store: Arc::new(MessageStore::new()),
            metrics,
        }
    }
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static(identity::USER_ID_HEADER),
        ]);
    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => layer.allow_origin(AllowOrigin::list(list.iter().cloned())),
    }
}

fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors);

    Router::new()
        .route("/ws", get(handlers::chat_websocket_handler))
        .route(
            "/api/messages/send/{receiver_id}",
            post(handlers::send_message_handler),
        )
        .route(
            "/api/messages/{peer_id}",
            get(handlers::get_conversation_handler),
        )
        .route("/api/online", get(handlers::online_users_handler))
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let default_directive = if cli.debug {
        "chat=debug,chat_server=debug,chat_presence=debug,tower_http=debug,info"
    } else {
        "chat=info,chat_server=info,chat_presence=info,tower_http=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let mut file_config: FileConfig = config::load_config(&cli.config)
        .extract()
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(host) = cli.host {
        file_config.server.host = host;
    }
    if let Some(port) = cli.port {
        file_config.server.port = port;
    }
    let server_config = ServerConfig::from_file(&file_config)?;

    info!("Starting chat server");

    let state = AppState::new(server_config);
    let hub_for_shutdown = state.hub.clone();
    let sockets_for_shutdown = state.sockets.clone();
    let addr = state.config.bind_addr;

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    let actual_addr = listener.local_addr()?;

    info!("Chat server listening on http://{}", actual_addr);
    info!("Endpoints:");
    info!("  GET    /ws?userId=<id>                 - Presence + message stream");
    info!("  POST   /api/messages/send/:receiver_id - Send a message");
    info!("  GET    /api/messages/:peer_id          - Conversation with a peer");
    info!("  GET    /api/online                     - Online user ids");

    // Create shutdown signal handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    // Run server with graceful shutdown
    let server_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("Server error");

    // Drop every registration and close the queues so writer tasks end
    info!(open_sockets = sockets_for_shutdown.len(), "Closing WebSockets");
    let drained = hub_for_shutdown.shutdown().await;
    let mut closed = 0;
    for (user_id, handles) in &drained {
        for handle in handles {
            if sockets_for_shutdown.close(handle) {
                closed += 1;
            }
        }
        tracing::debug!(user_id = %user_id, "Dropped presence");
    }
    info!("Closed {} connections for {} users", closed, drained.len());

    info!("Shutdown complete");
    server_result
}
