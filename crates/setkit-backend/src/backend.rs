use crate::BackendError;
use setkit_schema::{KeyType, SettingValue};
use std::sync::Arc;

/// Callback invoked with the name of a changed key. May run on any thread.
pub type ChangeListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Backend-assigned identifier of a registered change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// A settings store that can open schemas by id.
///
/// Backends are shared between threads; the connections they hand out are not.
pub trait SettingsBackend: Send + Sync {
    fn name(&self) -> &str;

    fn available(&self) -> bool;

    /// Whether written values outlive the process and reach other processes.
    fn persistent(&self) -> bool;

    /// Ids of every schema this backend can open.
    fn list_schemas(&self) -> Result<Vec<String>, BackendError>;

    /// Acquire the backend's representation of `schema_id`.
    /// Fails with `SchemaNotFound` when the backend does not know the schema.
    fn open(&self, schema_id: &str) -> Result<Box<dyn SchemaConnection>, BackendError>;
}

/// An open schema. Confined to the thread that opened it.
pub trait SchemaConnection {
    fn schema_id(&self) -> &str;

    fn list_keys(&self) -> Result<Vec<String>, BackendError>;

    fn key_type(&self, key: &str) -> Result<KeyType, BackendError>;

    /// Read `key`, failing with `TypeMismatch` when its declared type is not
    /// `expected`.
    fn read(&self, key: &str, expected: KeyType) -> Result<SettingValue, BackendError>;

    /// Write `value` to `key`. Returns `Ok(false)` when the backend refuses the
    /// write (key not writable, value out of range).
    fn write(&self, key: &str, value: &SettingValue) -> Result<bool, BackendError>;

    /// Drop any user value for `key` so reads return the default again.
    fn reset(&self, key: &str) -> Result<(), BackendError>;

    /// Register `listener` for changes to any key, or only to `detail` when given.
    fn connect(
        &self,
        detail: Option<&str>,
        listener: ChangeListener,
    ) -> Result<ListenerId, BackendError>;

    /// Remove a listener. Returns `false` when the id is not registered.
    fn disconnect(&self, id: ListenerId) -> Result<bool, BackendError>;

    /// Block until pending writes reach the store.
    fn sync(&self) -> Result<(), BackendError> {
        Ok(())
    }

    /// Run listeners for changes queued since the last call. Returns how many
    /// dispatch rounds ran. Backends that notify on the writing thread queue
    /// nothing.
    fn dispatch_pending(&self) -> usize {
        0
    }

    /// Release the backend resource and every listener registered through this
    /// connection. Must be idempotent.
    fn release(&mut self);

    fn is_released(&self) -> bool;
}

/// Resolves to `gio` when it is compiled in and reachable, else `memory`.
pub const AUTO_BACKEND: &str = "auto";

fn auto_backend() -> Box<dyn SettingsBackend> {
    #[cfg(feature = "gio")]
    {
        let gio = crate::gsettings::GioBackend::new();
        if gio.available() {
            return Box::new(gio);
        }
    }
    Box::new(crate::memory::MemoryBackend::new())
}

pub fn select_backend(name: &str) -> Result<Box<dyn SettingsBackend>, BackendError> {
    match name {
        AUTO_BACKEND => Ok(auto_backend()),
        "memory" => Ok(Box::new(crate::memory::MemoryBackend::new())),
        #[cfg(feature = "gio")]
        "gio" => Ok(Box::new(crate::gsettings::GioBackend::new())),
        other => Err(BackendError::Unavailable(other.to_owned())),
    }
}

/// Names accepted by [`select_backend`] in this build.
pub fn backend_names() -> &'static [&'static str] {
    #[cfg(feature = "gio")]
    {
        &[AUTO_BACKEND, "memory", "gio"]
    }
    #[cfg(not(feature = "gio"))]
    {
        &[AUTO_BACKEND, "memory"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_memory_backend() {
        let backend = select_backend("memory").unwrap();
        assert_eq!(backend.name(), "memory");
        assert!(backend.available());
    }

    #[test]
    fn select_invalid_backend_fails() {
        let err = select_backend("nonexistent").err().unwrap();
        assert!(matches!(err, BackendError::Unavailable(ref n) if n == "nonexistent"));
    }

    #[test]
    fn listed_names_are_selectable() {
        for name in backend_names() {
            assert!(select_backend(name).is_ok(), "backend '{name}' not selectable");
        }
    }

    #[cfg(not(feature = "gio"))]
    #[test]
    fn auto_without_gio_is_memory() {
        let backend = select_backend(AUTO_BACKEND).unwrap();
        assert_eq!(backend.name(), "memory");
        assert!(!backend.persistent());
    }

    #[cfg(feature = "gio")]
    #[test]
    fn auto_prefers_reachable_gio() {
        let backend = select_backend(AUTO_BACKEND).unwrap();
        let gio_up = crate::gsettings::GioBackend::new().available();
        assert_eq!(backend.name(), if gio_up { "gio" } else { "memory" });
        assert_eq!(backend.persistent(), gio_up);
    }

    #[test]
    fn listener_id_display() {
        assert_eq!(ListenerId(4).to_string(), "listener#4");
    }
}
