use super::{json_pretty, open_handle, EXIT_SUCCESS};
use serde::Serialize;
use setkit_backend::SettingsBackend;
use setkit_schema::{KeyType, SettingValue};

#[derive(Serialize)]
pub struct KeyValue {
    pub schema: String,
    pub key: String,
    #[serde(rename = "type")]
    pub ty: KeyType,
    pub value: SettingValue,
}

pub fn run(backend: &dyn SettingsBackend, schema: &str, key: &str, json: bool) -> Result<u8, String> {
    let handle = open_handle(backend, schema)?;
    let value = handle.get_value(key).map_err(|e| e.to_string())?;
    if json {
        let out = KeyValue {
            schema: schema.to_owned(),
            key: key.to_owned(),
            ty: value.key_type(),
            value,
        };
        println!("{}", json_pretty(&out)?);
    } else {
        println!("{value}");
    }
    Ok(EXIT_SUCCESS)
}
