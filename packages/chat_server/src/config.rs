use anyhow::{Context, Result};
use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

// =============================================================================
// File config (figment-deserialized from defaults / chat.toml / env vars)
// =============================================================================
//
// Three equivalent ways to configure:
//
//   chat.toml:       [server]
//                    port = 5001
//
//   env var:         CHAT_SERVER__PORT=5001   (double underscore = nesting)
//
//   (single underscore stays within field names: CHAT_WEBSOCKET__OUTBOUND_QUEUE)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub websocket: WebSocketFileConfig,
    #[serde(default)]
    pub messages: MessagesFileConfig,
}

/// Listener and CORS settings (lives under `[server]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Browser origins allowed to call the API. `"*"` allows any origin.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: default_cors_origins(),
        }
    }
}

/// Per-connection settings (lives under `[websocket]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebSocketFileConfig {
    /// Frames buffered per connection before sends start failing
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for WebSocketFileConfig {
    fn default() -> Self {
        Self {
            outbound_queue: default_outbound_queue(),
        }
    }
}

/// Message validation (lives under `[messages]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessagesFileConfig {
    #[serde(default = "default_max_text_len")]
    pub max_text_len: usize,
}

impl Default for MessagesFileConfig {
    fn default() -> Self {
        Self {
            max_text_len: default_max_text_len(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5001
}
fn default_cors_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}
fn default_outbound_queue() -> usize {
    64
}
fn default_max_text_len() -> usize {
    4000
}

/// Build a figment that layers: defaults → chat.toml → CHAT_* env vars.
///
/// A missing config file is not an error; the layer is simply empty.
///
/// Env vars use double-underscore for nesting into sections:
///   `CHAT_SERVER__HOST=0.0.0.0`  →  `server.host = "0.0.0.0"`
pub fn load_config(config_path: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_path))
        .merge(Env::prefixed("CHAT_").split("__"))
}

// =============================================================================
// Runtime config (derived from FileConfig, used throughout the server)
// =============================================================================

#[derive(Clone, Debug)]
pub enum CorsOrigins {
    Any,
    List(Vec<HeaderValue>),
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub cors: CorsOrigins,
    /// Capacity of each connection's outbound frame queue
    pub outbound_queue: usize,
    /// Maximum message text length in characters
    pub max_text_len: usize,
}

impl ServerConfig {
    pub fn from_file(fc: &FileConfig) -> Result<Self> {
        let bind_addr = format!("{}:{}", fc.server.host, fc.server.port)
            .parse::<SocketAddr>()
            .with_context(|| {
                format!(
                    "Invalid listen address {}:{}",
                    fc.server.host, fc.server.port
                )
            })?;

        let cors = if fc.server.cors_origins.iter().any(|o| o == "*") {
            CorsOrigins::Any
        } else {
            let origins = fc
                .server
                .cors_origins
                .iter()
                .map(|o| {
                    HeaderValue::from_str(o).with_context(|| format!("Invalid CORS origin: {}", o))
                })
                .collect::<Result<Vec<_>>>()?;
            CorsOrigins::List(origins)
        };

        Ok(Self {
            bind_addr,
            cors,
            // A zero-capacity mpsc channel panics
            outbound_queue: fc.websocket.outbound_queue.max(1),
            max_text_len: fc.messages.max_text_len,
        })
    }
}
