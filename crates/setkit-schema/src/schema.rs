use crate::types::SchemaId;
use crate::value::{KeyType, SettingValue};
use serde::Serialize;
use std::collections::BTreeMap;

/// One key of a schema served by an in-process backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyDef {
    pub name: String,
    pub default: SettingValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Inclusive bounds for integer keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<(i64, i64)>,
}

impl KeyDef {
    pub fn new(name: &str, default: SettingValue) -> Self {
        Self {
            name: name.to_owned(),
            default,
            summary: None,
            range: None,
        }
    }

    pub fn boolean(name: &str, default: bool) -> Self {
        Self::new(name, SettingValue::Boolean(default))
    }

    pub fn int(name: &str, default: i32) -> Self {
        Self::new(name, SettingValue::Int(default))
    }

    pub fn uint(name: &str, default: u32) -> Self {
        Self::new(name, SettingValue::UInt(default))
    }

    pub fn double(name: &str, default: f64) -> Self {
        Self::new(name, SettingValue::Double(default))
    }

    pub fn string(name: &str, default: &str) -> Self {
        Self::new(name, SettingValue::String(default.to_owned()))
    }

    pub fn string_list(name: &str, default: &[&str]) -> Self {
        Self::new(
            name,
            SettingValue::StringList(default.iter().map(|s| (*s).to_owned()).collect()),
        )
    }

    #[must_use]
    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_owned());
        self
    }

    #[must_use]
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.range = Some((min, max));
        self
    }

    pub fn key_type(&self) -> KeyType {
        self.default.key_type()
    }

    /// Whether `value` has this key's type and falls inside its range.
    pub fn accepts(&self, value: &SettingValue) -> bool {
        if value.key_type() != self.key_type() {
            return false;
        }
        match (self.range, value.as_i64()) {
            (Some((min, max)), Some(v)) => (min..=max).contains(&v),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    id: SchemaId,
    keys: BTreeMap<String, KeyDef>,
}

impl Schema {
    pub fn builder(id: &str) -> SchemaBuilder {
        SchemaBuilder {
            id: SchemaId::new(id),
            keys: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &SchemaId {
        &self.id
    }

    pub fn key(&self, name: &str) -> Option<&KeyDef> {
        self.keys.get(name)
    }

    pub fn has_key(&self, name: &str) -> bool {
        self.keys.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &KeyDef> {
        self.keys.values()
    }

    /// Key names in sorted order.
    pub fn key_names(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }
}

pub struct SchemaBuilder {
    id: SchemaId,
    keys: BTreeMap<String, KeyDef>,
}

impl SchemaBuilder {
    /// Add a key. A later definition with the same name replaces the earlier one.
    #[must_use]
    pub fn key(mut self, def: KeyDef) -> Self {
        self.keys.insert(def.name.clone(), def);
        self
    }

    pub fn build(self) -> Schema {
        Schema {
            id: self.id,
            keys: self.keys,
        }
    }
}

/// The set of schemas an in-process backend can open.
#[derive(Debug, Clone, Default)]
pub struct SchemaSource {
    schemas: BTreeMap<SchemaId, Schema>,
}

impl SchemaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema, returning the one it replaced.
    pub fn insert(&mut self, schema: Schema) -> Option<Schema> {
        self.schemas.insert(schema.id.clone(), schema)
    }

    #[must_use]
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.insert(schema);
        self
    }

    pub fn lookup(&self, id: &str) -> Option<&Schema> {
        self.schemas.get(&SchemaId::new(id))
    }

    pub fn list(&self) -> Vec<String> {
        self.schemas.keys().map(|id| id.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::builder("org.example.sample")
            .key(KeyDef::boolean("enabled", true).with_summary("Master switch"))
            .key(KeyDef::int("level", 5).with_range(0, 10))
            .key(KeyDef::string_list("tags", &["a"]))
            .build()
    }

    #[test]
    fn builder_collects_keys_sorted() {
        let schema = sample();
        assert_eq!(schema.id(), "org.example.sample");
        assert_eq!(schema.key_names(), vec!["enabled", "level", "tags"]);
        assert_eq!(schema.key("level").unwrap().key_type(), KeyType::Int);
        assert!(!schema.has_key("missing"));
    }

    #[test]
    fn later_key_definition_wins() {
        let schema = Schema::builder("x")
            .key(KeyDef::int("k", 1))
            .key(KeyDef::boolean("k", false))
            .build();
        assert_eq!(schema.key_names().len(), 1);
        assert_eq!(schema.key("k").unwrap().key_type(), KeyType::Boolean);
    }

    #[test]
    fn accepts_checks_type_and_range() {
        let schema = sample();
        let level = schema.key("level").unwrap();
        assert!(level.accepts(&SettingValue::Int(10)));
        assert!(!level.accepts(&SettingValue::Int(11)));
        assert!(!level.accepts(&SettingValue::Int(-1)));
        assert!(!level.accepts(&SettingValue::UInt(3)));

        let enabled = schema.key("enabled").unwrap();
        assert!(enabled.accepts(&SettingValue::Boolean(false)));
        assert!(!enabled.accepts(&SettingValue::from("true")));
    }

    #[test]
    fn source_lookup_and_replace() {
        let mut source = SchemaSource::new().with_schema(sample());
        assert_eq!(source.len(), 1);
        assert!(source.lookup("org.example.sample").is_some());
        assert!(source.lookup("org.example.other").is_none());

        let replaced = source.insert(Schema::builder("org.example.sample").build());
        assert!(replaced.is_some());
        assert_eq!(source.len(), 1);
        assert!(source.lookup("org.example.sample").unwrap().key_names().is_empty());
    }
}
