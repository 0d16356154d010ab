use super::{json_pretty, open_handle, warn_if_ephemeral, EXIT_FAILURE, EXIT_SUCCESS};
use setkit_backend::SettingsBackend;
use setkit_schema::parse_value;

pub fn run(
    backend: &dyn SettingsBackend,
    schema: &str,
    key: &str,
    raw: &str,
    json: bool,
) -> Result<u8, String> {
    let handle = open_handle(backend, schema)?;
    let ty = handle.key_type(key).map_err(|e| e.to_string())?;
    let value = parse_value(ty, raw).map_err(|e| e.to_string())?;
    let written = handle.set_value(key, &value).map_err(|e| e.to_string())?;
    let persisted = if written {
        handle.sync().map_err(|e| e.to_string())?;
        warn_if_ephemeral(backend, "write")
    } else {
        false
    };

    if json {
        let out = serde_json::json!({
            "schema": schema,
            "key": key,
            "value": value,
            "written": written,
            "persisted": persisted,
        });
        println!("{}", json_pretty(&out)?);
    } else if written {
        println!("{schema} {key} = {value}");
    } else {
        eprintln!("{schema} {key}: write rejected (key is locked or value is out of range)");
    }
    Ok(if written { EXIT_SUCCESS } else { EXIT_FAILURE })
}
