//! Value model and schema descriptions for setkit.
//!
//! This crate defines what a setting is: the supported key types (`KeyType`)
//! and values (`SettingValue`) with their GVariant-style text form, the
//! `Schema`/`KeyDef` descriptions served by in-process backends, and the
//! built-in schema set mirroring common GNOME desktop namespaces.

pub mod preset;
pub mod schema;
pub mod types;
pub mod value;

pub use preset::{builtin_source, get_builtin, list_builtin, BuiltinSchema, BUILTIN_SCHEMAS};
pub use schema::{KeyDef, Schema, SchemaBuilder, SchemaSource};
pub use types::SchemaId;
pub use value::{parse_value, KeyType, SettingValue};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid value for type '{ty}': '{input}' ({reason})")]
    InvalidValue {
        ty: KeyType,
        input: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_error_display_invalid_value() {
        let e = SchemaError::InvalidValue {
            ty: KeyType::Int,
            input: "abc".to_owned(),
            reason: "not a number".to_owned(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("invalid value"));
        assert!(msg.contains("'i'"));
        assert!(msg.contains("abc"));
    }
}
