use crate::AppState;
use crate::config::{FileConfig, ServerConfig};

/// App state built from the default config, with nothing connected.
pub fn test_app_state() -> AppState {
    let config = ServerConfig::from_file(&FileConfig::default()).unwrap();
    AppState::new(config)
}
