//! Typed settings facade for setkit.
//!
//! This crate provides `SettingsHandle`, the typed read/write/subscribe view
//! of one schema on a `SettingsBackend`, along with the change-subscription
//! registry it uses, its open/closed lifecycle, and `SettingsWorker` for
//! background threads that own a handle of their own.

pub mod handle;
pub mod lifecycle;
pub mod subscription;
pub mod worker;

pub use handle::SettingsHandle;
pub use lifecycle::HandleState;
pub use subscription::{parse_event, EventFilter, SubscriptionId, SubscriptionRegistry, CHANGED};
pub use worker::{monitor, ChangeEvent, Monitor, SettingsWorker, StopSignal};

use setkit_backend::BackendError;
use setkit_schema::KeyType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    /// The backend cannot be reached or does not know the schema.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("key not found: '{key}' in schema '{schema}'")]
    KeyNotFound { schema: String, key: String },
    #[error("type mismatch: key '{key}' has type '{declared}', not '{requested}'")]
    TypeMismatch {
        key: String,
        declared: KeyType,
        requested: KeyType,
    },
    #[error("handle closed: schema '{0}'")]
    HandleClosed(String),
    #[error("unknown event: '{0}' (expected 'changed' or 'changed::<key>')")]
    UnknownEvent(String),
    #[error("worker error: {0}")]
    Worker(String),
    /// Any other failure reported by the backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<BackendError> for SettingsError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Unavailable(name) => {
                SettingsError::BackendUnavailable(format!("backend '{name}' is not available"))
            }
            BackendError::SchemaNotFound(id) => {
                SettingsError::BackendUnavailable(format!("schema '{id}' is not installed"))
            }
            BackendError::Relocatable(id) => {
                SettingsError::BackendUnavailable(format!("schema '{id}' is relocatable"))
            }
            BackendError::KeyNotFound { schema, key } => SettingsError::KeyNotFound { schema, key },
            BackendError::TypeMismatch {
                key,
                declared,
                requested,
            } => SettingsError::TypeMismatch {
                key,
                declared,
                requested,
            },
            BackendError::Released(id) => SettingsError::HandleClosed(id),
            other => SettingsError::Backend(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relocatable_schema_maps_to_unavailable() {
        let e: SettingsError = BackendError::Relocatable("org.x.profile".to_owned()).into();
        assert!(
            matches!(e, SettingsError::BackendUnavailable(ref m) if m.contains("org.x.profile"))
        );
    }

    #[test]
    fn schema_not_found_maps_to_unavailable() {
        let e: SettingsError = BackendError::SchemaNotFound("org.x".to_owned()).into();
        assert!(matches!(e, SettingsError::BackendUnavailable(ref m) if m.contains("org.x")));
    }

    #[test]
    fn key_errors_keep_their_kind() {
        let e: SettingsError = BackendError::KeyNotFound {
            schema: "s".to_owned(),
            key: "k".to_owned(),
        }
        .into();
        assert!(matches!(e, SettingsError::KeyNotFound { .. }));

        let e: SettingsError = BackendError::TypeMismatch {
            key: "k".to_owned(),
            declared: KeyType::Int,
            requested: KeyType::Boolean,
        }
        .into();
        assert!(matches!(e, SettingsError::TypeMismatch { .. }));
    }

    #[test]
    fn released_maps_to_handle_closed() {
        let e: SettingsError = BackendError::Released("s".to_owned()).into();
        assert!(matches!(e, SettingsError::HandleClosed(_)));
    }

    #[test]
    fn other_backend_failures_are_catch_all() {
        let e: SettingsError = BackendError::Failed("boom".to_owned()).into();
        assert!(matches!(e, SettingsError::Backend(ref m) if m.contains("boom")));
        assert!(e.to_string().starts_with("backend error:"));
    }

    #[test]
    fn display_prefixes_are_stable() {
        assert!(SettingsError::KeyNotFound {
            schema: "s".to_owned(),
            key: "k".to_owned()
        }
        .to_string()
        .starts_with("key not found:"));
        assert!(SettingsError::BackendUnavailable("x".to_owned())
            .to_string()
            .starts_with("backend unavailable:"));
        assert!(SettingsError::HandleClosed("s".to_owned())
            .to_string()
            .starts_with("handle closed:"));
    }
}
