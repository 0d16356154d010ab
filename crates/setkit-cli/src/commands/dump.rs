use super::get::KeyValue;
use super::{json_pretty, open_handle, EXIT_SUCCESS};
use setkit_backend::SettingsBackend;

fn collect(backend: &dyn SettingsBackend, schema: &str, out: &mut Vec<KeyValue>) -> Result<(), String> {
    let handle = open_handle(backend, schema)?;
    for key in handle.list_keys().map_err(|e| e.to_string())? {
        let value = handle.get_value(&key).map_err(|e| e.to_string())?;
        out.push(KeyValue {
            schema: schema.to_owned(),
            key,
            ty: value.key_type(),
            value,
        });
    }
    Ok(())
}

pub fn run(backend: &dyn SettingsBackend, schema: Option<&str>, json: bool) -> Result<u8, String> {
    let schemas = match schema {
        Some(s) => vec![s.to_owned()],
        None => backend
            .list_schemas()
            .map_err(|e| format!("backend error: {e}"))?,
    };

    let mut entries = Vec::new();
    for s in &schemas {
        collect(backend, s, &mut entries)?;
    }

    if json {
        println!("{}", json_pretty(&entries)?);
    } else {
        for e in &entries {
            println!("{} {} {}", e.schema, e.key, e.value);
        }
    }
    Ok(EXIT_SUCCESS)
}
