use crate::lifecycle::HandleState;
use crate::subscription::{parse_event, SubscriptionId, SubscriptionRegistry};
use crate::SettingsError;
use setkit_backend::{SchemaConnection, SettingsBackend};
use setkit_schema::{KeyType, SchemaId, SettingValue};
use std::sync::Arc;
use tracing::{debug, trace};

/// Typed access to one schema of a settings backend.
///
/// The backend resource is held from [`open`](Self::open) until
/// [`close`](Self::close) or drop, whichever comes first. Closing detaches
/// every listener registered through [`subscribe`](Self::subscribe).
///
/// A handle is confined to the thread that opened it (it is not `Send`).
/// Threads that need the same schema open their own handle, see
/// [`SettingsWorker`](crate::SettingsWorker).
pub struct SettingsHandle {
    schema_id: SchemaId,
    backend: String,
    connection: Option<Box<dyn SchemaConnection>>,
    subscriptions: SubscriptionRegistry,
}

impl SettingsHandle {
    pub fn open(backend: &dyn SettingsBackend, schema_id: &str) -> Result<Self, SettingsError> {
        let connection = backend.open(schema_id)?;
        debug!("opened handle for {schema_id} ({} backend)", backend.name());
        Ok(Self {
            schema_id: SchemaId::new(schema_id),
            backend: backend.name().to_owned(),
            connection: Some(connection),
            subscriptions: SubscriptionRegistry::new(),
        })
    }

    pub fn schema_id(&self) -> &SchemaId {
        &self.schema_id
    }

    /// Name of the backend this handle was opened on.
    pub fn backend_name(&self) -> &str {
        &self.backend
    }

    pub fn state(&self) -> HandleState {
        if self.connection.is_some() {
            HandleState::Open
        } else {
            HandleState::Closed
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state() == HandleState::Closed
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn conn(&self) -> Result<&dyn SchemaConnection, SettingsError> {
        self.state().ensure_open(&self.schema_id)?;
        self.connection
            .as_deref()
            .ok_or_else(|| SettingsError::HandleClosed(self.schema_id.to_string()))
    }

    /// Register `callback` for `event`: `"changed"` for every key, or
    /// `"changed::<key>"` for one key. The callback receives the changed key
    /// and may run on a thread other than the caller's.
    pub fn subscribe<F>(&mut self, event: &str, callback: F) -> Result<SubscriptionId, SettingsError>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let conn = self.conn()?;
        let filter = parse_event(event)?;
        let listener = conn.connect(filter.detail(), Arc::new(callback))?;
        let id = self.subscriptions.insert(event, listener);
        trace!("{} subscribed to {event} as {id}", self.schema_id);
        Ok(id)
    }

    /// Detach a subscription. Returns `false` if `id` is unknown or was
    /// already removed.
    /// The subscription stays registered if the backend fails to detach it.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> Result<bool, SettingsError> {
        let conn = self.conn()?;
        let Some(listener) = self.subscriptions.listener(id) else {
            return Ok(false);
        };
        let detached = conn.disconnect(listener)?;
        self.subscriptions.remove(id);
        Ok(detached)
    }

    pub fn list_keys(&self) -> Result<Vec<String>, SettingsError> {
        Ok(self.conn()?.list_keys()?)
    }

    pub fn key_type(&self, key: &str) -> Result<KeyType, SettingsError> {
        Ok(self.conn()?.key_type(key)?)
    }

    /// Read `key` with whatever type the schema declares for it.
    pub fn get_value(&self, key: &str) -> Result<SettingValue, SettingsError> {
        let conn = self.conn()?;
        let ty = conn.key_type(key)?;
        Ok(conn.read(key, ty)?)
    }

    pub fn set_value(&self, key: &str, value: &SettingValue) -> Result<bool, SettingsError> {
        Ok(self.conn()?.write(key, value)?)
    }

    fn typed<T>(
        &self,
        key: &str,
        ty: KeyType,
        extract: impl FnOnce(SettingValue) -> Result<T, SettingValue>,
    ) -> Result<T, SettingsError> {
        let value = self.conn()?.read(key, ty)?;
        extract(value).map_err(|other| SettingsError::TypeMismatch {
            key: key.to_owned(),
            declared: other.key_type(),
            requested: ty,
        })
    }

    pub fn get_boolean(&self, key: &str) -> Result<bool, SettingsError> {
        self.typed(key, KeyType::Boolean, |v| match v {
            SettingValue::Boolean(b) => Ok(b),
            other => Err(other),
        })
    }

    pub fn set_boolean(&self, key: &str, value: bool) -> Result<bool, SettingsError> {
        self.set_value(key, &SettingValue::Boolean(value))
    }

    pub fn get_int(&self, key: &str) -> Result<i32, SettingsError> {
        self.typed(key, KeyType::Int, |v| match v {
            SettingValue::Int(i) => Ok(i),
            other => Err(other),
        })
    }

    pub fn set_int(&self, key: &str, value: i32) -> Result<bool, SettingsError> {
        self.set_value(key, &SettingValue::Int(value))
    }

    pub fn get_uint(&self, key: &str) -> Result<u32, SettingsError> {
        self.typed(key, KeyType::UInt, |v| match v {
            SettingValue::UInt(u) => Ok(u),
            other => Err(other),
        })
    }

    pub fn set_uint(&self, key: &str, value: u32) -> Result<bool, SettingsError> {
        self.set_value(key, &SettingValue::UInt(value))
    }

    pub fn get_double(&self, key: &str) -> Result<f64, SettingsError> {
        self.typed(key, KeyType::Double, |v| match v {
            SettingValue::Double(d) => Ok(d),
            other => Err(other),
        })
    }

    pub fn set_double(&self, key: &str, value: f64) -> Result<bool, SettingsError> {
        self.set_value(key, &SettingValue::Double(value))
    }

    pub fn get_string(&self, key: &str) -> Result<String, SettingsError> {
        self.typed(key, KeyType::String, |v| match v {
            SettingValue::String(s) => Ok(s),
            other => Err(other),
        })
    }

    pub fn set_string(&self, key: &str, value: &str) -> Result<bool, SettingsError> {
        self.set_value(key, &SettingValue::String(value.to_owned()))
    }

    pub fn get_string_list(&self, key: &str) -> Result<Vec<String>, SettingsError> {
        self.typed(key, KeyType::StringList, |v| match v {
            SettingValue::StringList(items) => Ok(items),
            other => Err(other),
        })
    }

    pub fn set_string_list<S: AsRef<str>>(
        &self,
        key: &str,
        values: &[S],
    ) -> Result<bool, SettingsError> {
        let items = values.iter().map(|s| s.as_ref().to_owned()).collect();
        self.set_value(key, &SettingValue::StringList(items))
    }

    /// Drop the stored value of `key`; reads return the schema default again.
    pub fn reset(&self, key: &str) -> Result<(), SettingsError> {
        Ok(self.conn()?.reset(key)?)
    }

    /// Wait for pending writes to reach the backend store.
    pub fn sync(&self) -> Result<(), SettingsError> {
        Ok(self.conn()?.sync()?)
    }

    /// Deliver change notifications the backend has queued for this handle.
    /// Returns how many dispatch rounds ran.
    pub fn dispatch_pending(&self) -> Result<usize, SettingsError> {
        Ok(self.conn()?.dispatch_pending())
    }

    /// Detach all subscriptions and release the backend resource.
    /// Calling it again does nothing.
    pub fn close(&mut self) {
        let Some(mut conn) = self.connection.take() else {
            return;
        };
        for listener in self.subscriptions.drain() {
            if let Err(e) = conn.disconnect(listener) {
                debug!("failed to detach {listener} from {}: {e}", self.schema_id);
            }
        }
        conn.release();
        debug!("closed handle for {}", self.schema_id);
    }
}

impl Drop for SettingsHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SettingsHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsHandle")
            .field("schema_id", &self.schema_id)
            .field("backend", &self.backend)
            .field("state", &self.state())
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
