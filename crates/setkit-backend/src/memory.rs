use crate::backend::{ChangeListener, ListenerId, SchemaConnection, SettingsBackend};
use crate::BackendError;
use setkit_schema::{builtin_source, KeyDef, KeyType, Schema, SchemaSource, SettingValue};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, BackendError> {
    m.lock()
        .map_err(|e| BackendError::Failed(format!("mutex poisoned: {e}")))
}

struct Listener {
    id: ListenerId,
    owner: u64,
    detail: Option<String>,
    callback: ChangeListener,
}

/// Live state of one schema, shared by every connection that opened it.
struct SchemaStore {
    schema: Schema,
    values: Mutex<BTreeMap<String, SettingValue>>,
    locked: Mutex<HashSet<String>>,
    listeners: Mutex<Vec<Listener>>,
}

impl SchemaStore {
    fn new(schema: Schema) -> Self {
        Self {
            schema,
            values: Mutex::new(BTreeMap::new()),
            locked: Mutex::new(HashSet::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn key_def(&self, key: &str) -> Result<&KeyDef, BackendError> {
        self.schema
            .key(key)
            .ok_or_else(|| BackendError::KeyNotFound {
                schema: self.schema.id().to_string(),
                key: key.to_owned(),
            })
    }

    fn read(&self, key: &str, expected: KeyType) -> Result<SettingValue, BackendError> {
        let def = self.key_def(key)?;
        if def.key_type() != expected {
            return Err(BackendError::TypeMismatch {
                key: key.to_owned(),
                declared: def.key_type(),
                requested: expected,
            });
        }
        let values = lock(&self.values)?;
        Ok(values.get(key).unwrap_or(&def.default).clone())
    }

    fn write(&self, key: &str, value: &SettingValue) -> Result<bool, BackendError> {
        let def = self.key_def(key)?;
        if def.key_type() != value.key_type() {
            return Err(BackendError::TypeMismatch {
                key: key.to_owned(),
                declared: def.key_type(),
                requested: value.key_type(),
            });
        }
        if lock(&self.locked)?.contains(key) {
            debug!("write to locked key {}/{key} refused", self.schema.id());
            return Ok(false);
        }
        if !def.accepts(value) {
            debug!("value {value} out of range for {}/{key}", self.schema.id());
            return Ok(false);
        }
        lock(&self.values)?.insert(key.to_owned(), value.clone());
        self.notify(key)?;
        Ok(true)
    }

    fn reset(&self, key: &str) -> Result<(), BackendError> {
        self.key_def(key)?;
        let had_value = lock(&self.values)?.remove(key).is_some();
        if had_value {
            self.notify(key)?;
        }
        Ok(())
    }

    /// Deliver `key` to matching listeners. Callbacks run after the listener
    /// lock is dropped so they may call back into the store.
    fn notify(&self, key: &str) -> Result<(), BackendError> {
        let targets: Vec<ChangeListener> = lock(&self.listeners)?
            .iter()
            .filter(|l| l.detail.as_deref().map_or(true, |d| d == key))
            .map(|l| Arc::clone(&l.callback))
            .collect();
        trace!(
            "notifying {} listener(s) of {}/{key}",
            targets.len(),
            self.schema.id()
        );
        for callback in targets {
            callback(key);
        }
        Ok(())
    }
}

/// In-process settings store serving a fixed [`SchemaSource`].
///
/// Values live as long as the backend. Every connection to the same schema
/// sees the same values and listeners, so a write through one handle reaches
/// subscribers of every other handle on that schema.
pub struct MemoryBackend {
    source: SchemaSource,
    stores: Mutex<HashMap<String, Arc<SchemaStore>>>,
    open_connections: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::with_source(builtin_source())
    }
}

impl MemoryBackend {
    /// A backend serving the built-in schemas.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(source: SchemaSource) -> Self {
        Self {
            source,
            stores: Mutex::new(HashMap::new()),
            open_connections: Arc::new(AtomicUsize::new(0)),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Number of connections opened and not yet released.
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// Number of listeners registered on `schema_id` across all connections.
    pub fn listener_count(&self, schema_id: &str) -> usize {
        let Ok(stores) = lock(&self.stores) else {
            return 0;
        };
        stores.get(schema_id).map_or(0, |s| {
            s.listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .len()
        })
    }

    /// Lock `key` down so writes to it return `false`.
    pub fn lock_key(&self, schema_id: &str, key: &str) -> Result<(), BackendError> {
        let store = self.store_for(schema_id)?;
        store.key_def(key)?;
        lock(&store.locked)?.insert(key.to_owned());
        Ok(())
    }

    pub fn unlock_key(&self, schema_id: &str, key: &str) -> Result<(), BackendError> {
        let store = self.store_for(schema_id)?;
        lock(&store.locked)?.remove(key);
        Ok(())
    }

    fn store_for(&self, schema_id: &str) -> Result<Arc<SchemaStore>, BackendError> {
        let mut stores = lock(&self.stores)?;
        if let Some(store) = stores.get(schema_id) {
            return Ok(Arc::clone(store));
        }
        let schema = self
            .source
            .lookup(schema_id)
            .ok_or_else(|| BackendError::SchemaNotFound(schema_id.to_owned()))?;
        let store = Arc::new(SchemaStore::new(schema.clone()));
        stores.insert(schema_id.to_owned(), Arc::clone(&store));
        Ok(store)
    }
}

impl SettingsBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn available(&self) -> bool {
        true
    }

    fn persistent(&self) -> bool {
        false
    }

    fn list_schemas(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.source.list())
    }

    fn open(&self, schema_id: &str) -> Result<Box<dyn SchemaConnection>, BackendError> {
        let store = self.store_for(schema_id)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.open_connections.fetch_add(1, Ordering::SeqCst);
        debug!("opened {schema_id} on memory backend (connection {id})");
        Ok(Box::new(MemoryConnection {
            id,
            schema_id: schema_id.to_owned(),
            store: Some(store),
            live: Arc::clone(&self.open_connections),
            next_id: Arc::clone(&self.next_id),
        }))
    }
}

pub struct MemoryConnection {
    id: u64,
    schema_id: String,
    store: Option<Arc<SchemaStore>>,
    live: Arc<AtomicUsize>,
    next_id: Arc<AtomicU64>,
}

impl MemoryConnection {
    fn store(&self) -> Result<&SchemaStore, BackendError> {
        self.store
            .as_deref()
            .ok_or_else(|| BackendError::Released(self.schema_id.clone()))
    }
}

impl SchemaConnection for MemoryConnection {
    fn schema_id(&self) -> &str {
        &self.schema_id
    }

    fn list_keys(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.store()?.schema.key_names())
    }

    fn key_type(&self, key: &str) -> Result<KeyType, BackendError> {
        Ok(self.store()?.key_def(key)?.key_type())
    }

    fn read(&self, key: &str, expected: KeyType) -> Result<SettingValue, BackendError> {
        self.store()?.read(key, expected)
    }

    fn write(&self, key: &str, value: &SettingValue) -> Result<bool, BackendError> {
        self.store()?.write(key, value)
    }

    fn reset(&self, key: &str) -> Result<(), BackendError> {
        self.store()?.reset(key)
    }

    fn connect(
        &self,
        detail: Option<&str>,
        listener: ChangeListener,
    ) -> Result<ListenerId, BackendError> {
        let store = self.store()?;
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        lock(&store.listeners)?.push(Listener {
            id,
            owner: self.id,
            detail: detail.map(str::to_owned),
            callback: listener,
        });
        Ok(id)
    }

    fn disconnect(&self, id: ListenerId) -> Result<bool, BackendError> {
        let store = self.store()?;
        let mut listeners = lock(&store.listeners)?;
        let before = listeners.len();
        listeners.retain(|l| !(l.id == id && l.owner == self.id));
        Ok(listeners.len() != before)
    }

    fn release(&mut self) {
        let Some(store) = self.store.take() else {
            return;
        };
        store
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| l.owner != self.id);
        self.live.fetch_sub(1, Ordering::SeqCst);
        debug!("released {} (connection {})", self.schema_id, self.id);
    }

    fn is_released(&self) -> bool {
        self.store.is_none()
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POWER: &str = "org.gnome.settings-daemon.plugins.power";
    const KEYBOARD: &str = "org.gnome.libgnomekbd.keyboard";

    #[test]
    fn open_unknown_schema_fails() {
        let backend = MemoryBackend::new();
        let err = backend.open("org.example.nonexistent").err().unwrap();
        assert!(matches!(err, BackendError::SchemaNotFound(_)));
        assert_eq!(backend.open_connections(), 0);
    }

    #[test]
    fn reads_default_until_written() {
        let backend = MemoryBackend::new();
        let conn = backend.open(POWER).unwrap();
        assert_eq!(
            conn.read("idle-brightness", KeyType::Int).unwrap(),
            SettingValue::Int(30)
        );
        assert!(conn.write("idle-brightness", &SettingValue::Int(31)).unwrap());
        assert_eq!(
            conn.read("idle-brightness", KeyType::Int).unwrap(),
            SettingValue::Int(31)
        );
        conn.reset("idle-brightness").unwrap();
        assert_eq!(
            conn.read("idle-brightness", KeyType::Int).unwrap(),
            SettingValue::Int(30)
        );
    }

    #[test]
    fn values_shared_between_connections() {
        let backend = MemoryBackend::new();
        let a = backend.open(POWER).unwrap();
        let b = backend.open(POWER).unwrap();
        assert!(a.write("active", &SettingValue::Boolean(false)).unwrap());
        assert_eq!(
            b.read("active", KeyType::Boolean).unwrap(),
            SettingValue::Boolean(false)
        );
        assert_eq!(backend.open_connections(), 2);
    }

    #[test]
    fn missing_key_and_wrong_type() {
        let backend = MemoryBackend::new();
        let conn = backend.open(POWER).unwrap();
        assert!(matches!(
            conn.read("no-such-key", KeyType::Boolean),
            Err(BackendError::KeyNotFound { .. })
        ));
        assert!(matches!(
            conn.read("active", KeyType::Int),
            Err(BackendError::TypeMismatch { .. })
        ));
        assert!(matches!(
            conn.write("active", &SettingValue::Int(1)),
            Err(BackendError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn out_of_range_and_locked_writes_return_false() {
        let backend = MemoryBackend::new();
        let conn = backend.open(POWER).unwrap();
        assert!(!conn.write("idle-brightness", &SettingValue::Int(101)).unwrap());

        backend.lock_key(POWER, "active").unwrap();
        assert!(!conn.write("active", &SettingValue::Boolean(false)).unwrap());
        backend.unlock_key(POWER, "active").unwrap();
        assert!(conn.write("active", &SettingValue::Boolean(false)).unwrap());
    }

    #[test]
    fn listeners_filtered_by_detail() {
        let backend = MemoryBackend::new();
        let conn = backend.open(KEYBOARD).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let all = Arc::clone(&seen);
        conn.connect(
            None,
            Arc::new(move |k: &str| all.lock().unwrap().push(format!("any:{k}"))),
        )
        .unwrap();
        let only = Arc::clone(&seen);
        conn.connect(
            Some("layouts"),
            Arc::new(move |k: &str| only.lock().unwrap().push(format!("layouts:{k}"))),
        )
        .unwrap();

        conn.write("options", &SettingValue::StringList(vec!["x".into()]))
            .unwrap();
        conn.write("layouts", &SettingValue::StringList(vec!["us".into()]))
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec!["any:options", "any:layouts", "layouts:layouts"]
        );
    }

    #[test]
    fn release_is_idempotent_and_detaches_listeners() {
        let backend = MemoryBackend::new();
        let mut conn = backend.open(POWER).unwrap();
        conn.connect(None, Arc::new(|_: &str| {})).unwrap();
        assert_eq!(backend.listener_count(POWER), 1);

        conn.release();
        conn.release();
        assert!(conn.is_released());
        assert_eq!(backend.open_connections(), 0);
        assert_eq!(backend.listener_count(POWER), 0);
        assert!(matches!(
            conn.list_keys(),
            Err(BackendError::Released(_))
        ));
    }

    #[test]
    fn drop_releases_connection() {
        let backend = MemoryBackend::new();
        {
            let _conn = backend.open(POWER).unwrap();
            assert_eq!(backend.open_connections(), 1);
        }
        assert_eq!(backend.open_connections(), 0);
    }

    #[test]
    fn disconnect_only_removes_own_listener() {
        let backend = MemoryBackend::new();
        let a = backend.open(POWER).unwrap();
        let b = backend.open(POWER).unwrap();
        let id = a.connect(None, Arc::new(|_: &str| {})).unwrap();
        assert!(!b.disconnect(id).unwrap());
        assert!(a.disconnect(id).unwrap());
        assert!(!a.disconnect(id).unwrap());
    }

    #[test]
    fn custom_source() {
        let source = SchemaSource::new().with_schema(
            Schema::builder("org.example.app")
                .key(KeyDef::string("title", "hello"))
                .build(),
        );
        let backend = MemoryBackend::with_source(source);
        assert_eq!(backend.list_schemas().unwrap(), vec!["org.example.app"]);
        let conn = backend.open("org.example.app").unwrap();
        assert_eq!(conn.list_keys().unwrap(), vec!["title"]);
        assert_eq!(conn.key_type("title").unwrap(), KeyType::String);
    }
}
