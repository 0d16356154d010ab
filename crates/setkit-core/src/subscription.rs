use crate::SettingsError;
use setkit_backend::ListenerId;
use std::collections::BTreeMap;

/// The only event a settings handle emits.
pub const CHANGED: &str = "changed";

/// Which keys an event name selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// `changed`
    AnyKey,
    /// `changed::<key>`
    Key(String),
}

impl EventFilter {
    /// Signal detail passed to the backend.
    pub fn detail(&self) -> Option<&str> {
        match self {
            EventFilter::AnyKey => None,
            EventFilter::Key(key) => Some(key.as_str()),
        }
    }
}

pub fn parse_event(name: &str) -> Result<EventFilter, SettingsError> {
    if name == CHANGED {
        return Ok(EventFilter::AnyKey);
    }
    match name.strip_prefix("changed::") {
        Some(key) if !key.is_empty() => Ok(EventFilter::Key(key.to_owned())),
        _ => Err(SettingsError::UnknownEvent(name.to_owned())),
    }
}

/// Token returned by `subscribe`, consumed by `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscription#{}", self.0)
    }
}

#[derive(Debug)]
struct Entry {
    event: String,
    listener: ListenerId,
}

/// Per-handle record of the backend listeners a handle registered, so they
/// can be detached individually or all at once on close.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next: u64,
    entries: BTreeMap<SubscriptionId, Entry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, event: &str, listener: ListenerId) -> SubscriptionId {
        self.next += 1;
        let id = SubscriptionId(self.next);
        self.entries.insert(
            id,
            Entry {
                event: event.to_owned(),
                listener,
            },
        );
        id
    }

    pub fn remove(&mut self, id: SubscriptionId) -> Option<ListenerId> {
        self.entries.remove(&id).map(|e| e.listener)
    }

    pub fn listener(&self, id: SubscriptionId) -> Option<ListenerId> {
        self.entries.get(&id).map(|e| e.listener)
    }

    pub fn event(&self, id: SubscriptionId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.event.as_str())
    }

    /// Remove every entry, returning the backend listeners to detach.
    pub fn drain(&mut self) -> Vec<ListenerId> {
        std::mem::take(&mut self.entries)
            .into_values()
            .map(|e| e.listener)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
