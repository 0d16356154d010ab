use super::{json_pretty, open_handle, warn_if_ephemeral, EXIT_SUCCESS};
use setkit_backend::SettingsBackend;

pub fn run(backend: &dyn SettingsBackend, schema: &str, key: &str, json: bool) -> Result<u8, String> {
    let handle = open_handle(backend, schema)?;
    handle.reset(key).map_err(|e| e.to_string())?;
    handle.sync().map_err(|e| e.to_string())?;
    let persisted = warn_if_ephemeral(backend, "reset");
    let value = handle.get_value(key).map_err(|e| e.to_string())?;
    if json {
        let out = serde_json::json!({
            "schema": schema,
            "key": key,
            "value": value,
            "persisted": persisted,
        });
        println!("{}", json_pretty(&out)?);
    } else {
        println!("{schema} {key} reset to {value}");
    }
    Ok(EXIT_SUCCESS)
}
