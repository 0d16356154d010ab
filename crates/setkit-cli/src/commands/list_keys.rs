use super::{colorize_type, json_pretty, open_handle, EXIT_SUCCESS};
use serde::Serialize;
use setkit_backend::SettingsBackend;
use setkit_schema::KeyType;

#[derive(Serialize)]
struct KeyEntry {
    key: String,
    #[serde(rename = "type")]
    ty: KeyType,
}

pub fn run(backend: &dyn SettingsBackend, schema: &str, json: bool) -> Result<u8, String> {
    let handle = open_handle(backend, schema)?;
    let keys = handle.list_keys().map_err(|e| e.to_string())?;
    let entries = keys
        .into_iter()
        .map(|key| {
            let ty = handle.key_type(&key).map_err(|e| e.to_string())?;
            Ok(KeyEntry { key, ty })
        })
        .collect::<Result<Vec<_>, String>>()?;

    if json {
        println!("{}", json_pretty(&entries)?);
    } else {
        for e in &entries {
            println!("{:<4} {}", colorize_type(e.ty), e.key);
        }
    }
    Ok(EXIT_SUCCESS)
}
