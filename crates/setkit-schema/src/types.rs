//! Newtype wrapper for schema identifiers.
//!
//! Serializes/deserializes as a plain string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Opaque name of a settings namespace, usually a dotted reverse-domain
/// string such as `org.gnome.system.locale`. Never validated here; the
/// backend decides whether it resolves.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(String);

impl SchemaId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for SchemaId {
    type Target = str;
    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SchemaId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for SchemaId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SchemaId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<String> for SchemaId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SchemaId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_id_display_and_as_ref() {
        let id = SchemaId::new("org.gnome.system.locale");
        assert_eq!(id.to_string(), "org.gnome.system.locale");
        assert_eq!(id.as_str(), "org.gnome.system.locale");
        assert_eq!(AsRef::<str>::as_ref(&id), "org.gnome.system.locale");
    }

    #[test]
    fn schema_id_serializes_as_plain_string() {
        let id = SchemaId::new("org.example.app");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"org.example.app\"");
        let back: SchemaId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn schema_id_compares_with_str() {
        let id = SchemaId::from("a.b");
        assert_eq!(id, "a.b");
        assert!(id.starts_with("a."));
        assert_eq!(id.into_inner(), "a.b");
    }
}
