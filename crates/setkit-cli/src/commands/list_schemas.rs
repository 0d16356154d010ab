use super::{json_pretty, EXIT_SUCCESS};
use serde::Serialize;
use setkit_backend::SettingsBackend;
use setkit_core::SettingsHandle;

#[derive(Debug, Serialize)]
struct SchemaSummary {
    schema: String,
    /// `None` when the schema could not be opened.
    keys: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn summarize(backend: &dyn SettingsBackend, schema: String) -> SchemaSummary {
    match SettingsHandle::open(backend, &schema).and_then(|h| h.list_keys()) {
        Ok(keys) => SchemaSummary {
            schema,
            keys: Some(keys.len()),
            error: None,
        },
        Err(e) => SchemaSummary {
            schema,
            keys: None,
            error: Some(e.to_string()),
        },
    }
}

pub fn run(backend: &dyn SettingsBackend, json: bool) -> Result<u8, String> {
    let schemas = backend
        .list_schemas()
        .map_err(|e| format!("backend error: {e}"))?;

    let summaries: Vec<SchemaSummary> = schemas
        .into_iter()
        .map(|schema| summarize(backend, schema))
        .collect();

    if json {
        println!("{}", json_pretty(&summaries)?);
    } else if summaries.is_empty() {
        println!("no schemas found");
    } else {
        println!("{:<6} SCHEMA", "KEYS");
        for s in &summaries {
            match (&s.keys, &s.error) {
                (Some(n), _) => println!("{n:<6} {}", s.schema),
                (None, err) => {
                    let reason = console::Style::new()
                        .red()
                        .apply_to(err.as_deref().unwrap_or("cannot open"));
                    println!("{:<6} {} ({reason})", "-", s.schema);
                }
            }
        }
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use setkit_backend::{BackendError, MemoryBackend, SchemaConnection};

    /// Lists one schema it refuses to open.
    struct UnopenableBackend;

    impl SettingsBackend for UnopenableBackend {
        fn name(&self) -> &str {
            "unopenable"
        }

        fn available(&self) -> bool {
            true
        }

        fn persistent(&self) -> bool {
            false
        }

        fn list_schemas(&self) -> Result<Vec<String>, BackendError> {
            Ok(vec!["org.example.reloc".to_owned()])
        }

        fn open(&self, schema_id: &str) -> Result<Box<dyn SchemaConnection>, BackendError> {
            Err(BackendError::Relocatable(schema_id.to_owned()))
        }
    }

    #[test]
    fn summary_counts_keys() {
        let backend = MemoryBackend::new();
        let s = summarize(&backend, "org.gnome.system.locale".to_owned());
        assert_eq!(s.keys, Some(1));
        assert!(s.error.is_none());
    }

    #[test]
    fn unopenable_schema_keeps_its_error() {
        let s = summarize(&UnopenableBackend, "org.example.reloc".to_owned());
        assert_eq!(s.keys, None);
        assert!(s.error.unwrap().contains("relocatable"));
    }

    #[test]
    fn unopenable_schema_serializes_null_keys() {
        let s = summarize(&UnopenableBackend, "org.example.reloc".to_owned());
        let v = serde_json::to_value(&s).unwrap();
        assert!(v["keys"].is_null());
        assert!(v["error"].is_string());
    }

    #[test]
    fn listing_with_unopenable_schema_succeeds() {
        assert_eq!(run(&UnopenableBackend, true).unwrap(), EXIT_SUCCESS);
    }
}
