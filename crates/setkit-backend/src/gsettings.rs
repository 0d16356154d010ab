//! GSettings backend over `gio::Settings`.
//!
//! `g_settings_new` aborts the process on an unknown schema and the typed
//! getters abort on an unknown key or a type mismatch, so every call is
//! checked against the installed `SettingsSchema` first.
//!
//! Each connection owns a private GLib main context that was thread-default
//! while its `gio::Settings` was built, so `changed` signals queue there
//! until `dispatch_pending` iterates it.

use crate::backend::{ChangeListener, ListenerId, SchemaConnection, SettingsBackend};
use crate::BackendError;
use gio::glib::{self, SignalHandlerId};
use gio::prelude::*;
use setkit_schema::{KeyType, SettingValue};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Default)]
pub struct GioBackend;

impl GioBackend {
    pub fn new() -> Self {
        Self
    }

    fn source() -> Result<gio::SettingsSchemaSource, BackendError> {
        gio::SettingsSchemaSource::default()
            .ok_or_else(|| BackendError::Unavailable("gio: no schemas installed".to_owned()))
    }
}

impl SettingsBackend for GioBackend {
    fn name(&self) -> &'static str {
        "gio"
    }

    fn available(&self) -> bool {
        gio::SettingsSchemaSource::default().is_some()
    }

    fn persistent(&self) -> bool {
        true
    }

    fn list_schemas(&self) -> Result<Vec<String>, BackendError> {
        let (non_relocatable, _relocatable) = Self::source()?.list_schemas(true);
        let mut ids: Vec<String> = non_relocatable.iter().map(ToString::to_string).collect();
        ids.sort();
        Ok(ids)
    }

    fn open(&self, schema_id: &str) -> Result<Box<dyn SchemaConnection>, BackendError> {
        let schema = Self::source()?
            .lookup(schema_id, true)
            .ok_or_else(|| BackendError::SchemaNotFound(schema_id.to_owned()))?;
        // Relocatable schemas need an explicit path; `new_full` without one aborts.
        if schema.path().is_none() {
            return Err(BackendError::Relocatable(schema_id.to_owned()));
        }
        let context = glib::MainContext::new();
        let settings = context
            .with_thread_default(|| {
                gio::Settings::new_full(&schema, None::<&gio::SettingsBackend>, None)
            })
            .map_err(|e| BackendError::Failed(format!("gio: {e}")))?;
        debug!("opened {schema_id} on gio backend");
        Ok(Box::new(GioConnection {
            schema_id: schema_id.to_owned(),
            schema,
            context,
            settings: Some(settings),
            handlers: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
        }))
    }
}

pub struct GioConnection {
    schema_id: String,
    schema: gio::SettingsSchema,
    context: glib::MainContext,
    settings: Option<gio::Settings>,
    handlers: RefCell<HashMap<ListenerId, SignalHandlerId>>,
    next_id: Cell<u64>,
}

impl GioConnection {
    fn settings(&self) -> Result<&gio::Settings, BackendError> {
        self.settings
            .as_ref()
            .ok_or_else(|| BackendError::Released(self.schema_id.clone()))
    }

    fn declared_type(&self, key: &str) -> Result<KeyType, BackendError> {
        if !self.schema.has_key(key) {
            return Err(BackendError::KeyNotFound {
                schema: self.schema_id.clone(),
                key: key.to_owned(),
            });
        }
        let value_type = self.schema.key(key).value_type();
        let signature = value_type.as_str();
        KeyType::from_signature(signature).ok_or_else(|| {
            BackendError::Failed(format!(
                "key '{key}' has unsupported type '{signature}'"
            ))
        })
    }

    fn checked(&self, key: &str, requested: KeyType) -> Result<&gio::Settings, BackendError> {
        let settings = self.settings()?;
        let declared = self.declared_type(key)?;
        if declared != requested {
            return Err(BackendError::TypeMismatch {
                key: key.to_owned(),
                declared,
                requested,
            });
        }
        Ok(settings)
    }
}

impl SchemaConnection for GioConnection {
    fn schema_id(&self) -> &str {
        &self.schema_id
    }

    fn list_keys(&self) -> Result<Vec<String>, BackendError> {
        self.settings()?;
        let mut keys: Vec<String> = self
            .schema
            .list_keys()
            .iter()
            .map(ToString::to_string)
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn key_type(&self, key: &str) -> Result<KeyType, BackendError> {
        self.settings()?;
        self.declared_type(key)
    }

    fn read(&self, key: &str, expected: KeyType) -> Result<SettingValue, BackendError> {
        let s = self.checked(key, expected)?;
        Ok(match expected {
            KeyType::Boolean => SettingValue::Boolean(s.boolean(key)),
            KeyType::Int => SettingValue::Int(s.int(key)),
            KeyType::UInt => SettingValue::UInt(s.uint(key)),
            KeyType::Double => SettingValue::Double(s.double(key)),
            KeyType::String => SettingValue::String(s.string(key).to_string()),
            KeyType::StringList => {
                SettingValue::StringList(s.strv(key).iter().map(ToString::to_string).collect())
            }
        })
    }

    fn write(&self, key: &str, value: &SettingValue) -> Result<bool, BackendError> {
        let s = self.checked(key, value.key_type())?;
        if !s.is_writable(key) {
            debug!("{}/{key} is not writable", self.schema_id);
            return Ok(false);
        }
        let result = match value {
            SettingValue::Boolean(v) => s.set_boolean(key, *v),
            SettingValue::Int(v) => s.set_int(key, *v),
            SettingValue::UInt(v) => s.set_uint(key, *v),
            SettingValue::Double(v) => s.set_double(key, *v),
            SettingValue::String(v) => s.set_string(key, v),
            SettingValue::StringList(v) => {
                let items: Vec<&str> = v.iter().map(String::as_str).collect();
                s.set_strv(key, items.as_slice())
            }
        };
        Ok(result.is_ok())
    }

    fn reset(&self, key: &str) -> Result<(), BackendError> {
        let s = self.settings()?;
        self.declared_type(key)?;
        s.reset(key);
        Ok(())
    }

    fn connect(
        &self,
        detail: Option<&str>,
        listener: ChangeListener,
    ) -> Result<ListenerId, BackendError> {
        let s = self.settings()?;
        let handler = s.connect_changed(detail, move |_, key| listener(key));
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.handlers.borrow_mut().insert(id, handler);
        Ok(id)
    }

    fn disconnect(&self, id: ListenerId) -> Result<bool, BackendError> {
        let s = self.settings()?;
        match self.handlers.borrow_mut().remove(&id) {
            Some(handler) => {
                s.disconnect(handler);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn sync(&self) -> Result<(), BackendError> {
        self.settings()?;
        gio::Settings::sync();
        Ok(())
    }

    fn dispatch_pending(&self) -> usize {
        if self.settings.is_none() {
            return 0;
        }
        let mut rounds = 0;
        while self.context.iteration(false) {
            rounds += 1;
        }
        rounds
    }

    fn release(&mut self) {
        let Some(settings) = self.settings.take() else {
            return;
        };
        for (_, handler) in self.handlers.borrow_mut().drain() {
            settings.disconnect(handler);
        }
        debug!("released {} on gio backend", self.schema_id);
    }

    fn is_released(&self) -> bool {
        self.settings.is_none()
    }
}

impl Drop for GioConnection {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABSENT: &str = "org.example.setkit.absent";

    /// `None` when the host has no compiled schemas, in which case the test
    /// has nothing to check.
    fn backend() -> Option<GioBackend> {
        let backend = GioBackend::new();
        if backend.available() {
            Some(backend)
        } else {
            eprintln!("no GSettings schemas installed, skipping");
            None
        }
    }

    /// First installed schema with a key of a supported type.
    fn sample(backend: &GioBackend) -> Option<(String, String, KeyType)> {
        for id in backend.list_schemas().ok()? {
            let Ok(conn) = backend.open(&id) else {
                continue;
            };
            let Ok(keys) = conn.list_keys() else {
                continue;
            };
            for key in keys {
                if let Ok(ty) = conn.key_type(&key) {
                    return Some((id, key, ty));
                }
            }
        }
        None
    }

    #[test]
    fn unknown_schema_is_not_found() {
        let Some(backend) = backend() else { return };
        assert!(matches!(
            backend.open(ABSENT),
            Err(BackendError::SchemaNotFound(ref id)) if id == ABSENT
        ));
    }

    #[test]
    fn relocatable_schema_is_refused() {
        let Some(backend) = backend() else { return };
        let Ok(source) = GioBackend::source() else { return };
        let (_, relocatable) = source.list_schemas(true);
        let Some(id) = relocatable.first() else {
            return;
        };
        assert!(matches!(
            backend.open(id),
            Err(BackendError::Relocatable(_))
        ));
    }

    #[test]
    fn unknown_key_is_reported_before_gio_sees_it() {
        let Some(backend) = backend() else { return };
        let Some((id, _, _)) = sample(&backend) else { return };
        let conn = backend.open(&id).unwrap();
        let missing = "setkit-no-such-key";
        assert!(matches!(
            conn.key_type(missing),
            Err(BackendError::KeyNotFound { .. })
        ));
        assert!(matches!(
            conn.read(missing, KeyType::Boolean),
            Err(BackendError::KeyNotFound { .. })
        ));
        assert!(matches!(
            conn.write(missing, &SettingValue::Boolean(true)),
            Err(BackendError::KeyNotFound { .. })
        ));
        assert!(matches!(
            conn.reset(missing),
            Err(BackendError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn wrong_type_is_reported_before_gio_sees_it() {
        let Some(backend) = backend() else { return };
        let Some((id, key, declared)) = sample(&backend) else { return };
        let conn = backend.open(&id).unwrap();
        let (requested, value) = if declared == KeyType::Boolean {
            (KeyType::StringList, SettingValue::StringList(Vec::new()))
        } else {
            (KeyType::Boolean, SettingValue::Boolean(true))
        };
        assert!(matches!(
            conn.read(&key, requested),
            Err(BackendError::TypeMismatch { declared: d, requested: r, .. })
                if d == declared && r == requested
        ));
        assert!(matches!(
            conn.write(&key, &value),
            Err(BackendError::TypeMismatch { .. })
        ));
        assert_eq!(conn.read(&key, declared).unwrap().key_type(), declared);
    }

    #[test]
    fn released_connection_dispatches_nothing() {
        let Some(backend) = backend() else { return };
        let Some((id, _, _)) = sample(&backend) else { return };
        let mut conn = backend.open(&id).unwrap();
        conn.connect(None, std::sync::Arc::new(|_| {})).unwrap();
        conn.dispatch_pending();
        conn.release();
        assert_eq!(conn.dispatch_pending(), 0);
    }

    #[test]
    fn release_is_idempotent() {
        let Some(backend) = backend() else { return };
        let Some((id, _, _)) = sample(&backend) else { return };
        let mut conn = backend.open(&id).unwrap();
        let listener = conn.connect(None, std::sync::Arc::new(|_| {})).unwrap();
        conn.release();
        conn.release();
        assert!(conn.is_released());
        assert!(matches!(conn.list_keys(), Err(BackendError::Released(_))));
        assert!(matches!(
            conn.disconnect(listener),
            Err(BackendError::Released(_))
        ));
    }
}
