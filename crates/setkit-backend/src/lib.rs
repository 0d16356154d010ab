//! Settings store backends for setkit.
//!
//! This crate is the seam between the typed facade and the store that actually
//! holds settings: the `SettingsBackend`/`SchemaConnection` traits, an
//! in-process `MemoryBackend` serving programmatic schemas, a `GioBackend`
//! over the system GSettings database (cargo feature `gio`), backend selection
//! by name, and the `config.toml` that picks the default backend.

pub mod backend;
pub mod config;
#[cfg(feature = "gio")]
pub mod gsettings;
pub mod memory;

pub use backend::{
    backend_names, select_backend, ChangeListener, ListenerId, SchemaConnection, SettingsBackend,
    AUTO_BACKEND,
};
pub use config::{default_config_path, BackendConfig, DEFAULT_BACKEND};
pub use memory::MemoryBackend;

use setkit_schema::KeyType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("backend '{0}' is not available on this system")]
    Unavailable(String),
    #[error("schema not found: {0}")]
    SchemaNotFound(String),
    /// The schema exists but has no fixed path, so it cannot be opened by id.
    #[error("schema '{0}' is relocatable and needs a path")]
    Relocatable(String),
    #[error("key '{key}' not found in schema '{schema}'")]
    KeyNotFound { schema: String, key: String },
    #[error("key '{key}' has type '{declared}', not '{requested}'")]
    TypeMismatch {
        key: String,
        declared: KeyType,
        requested: KeyType,
    },
    #[error("connection to '{0}' already released")]
    Released(String),
    #[error("backend config error: {0}")]
    Config(String),
    #[error("backend operation failed: {0}")]
    Failed(String),
}
