pub mod completions;
pub mod dump;
pub mod exercise;
pub mod get;
pub mod list_keys;
pub mod list_schemas;
pub mod man_pages;
pub mod monitor;
pub mod reset;
pub mod set;

use setkit_backend::SettingsBackend;
use setkit_core::SettingsHandle;
use setkit_schema::KeyType;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_KEY_ERROR: u8 = 2;
pub const EXIT_BACKEND_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

/// Exit code for an error message, keyed on the prefixes `SettingsError`
/// and `SchemaError` render with.
pub fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("key not found:")
        || msg.starts_with("type mismatch:")
        || msg.starts_with("invalid value")
        || msg.starts_with("unknown event:")
    {
        EXIT_KEY_ERROR
    } else if msg.starts_with("backend unavailable:") || msg.starts_with("backend error:") {
        EXIT_BACKEND_ERROR
    } else {
        EXIT_FAILURE
    }
}

pub fn open_handle(backend: &dyn SettingsBackend, schema: &str) -> Result<SettingsHandle, String> {
    SettingsHandle::open(backend, schema).map_err(|e| e.to_string())
}

/// Warn on stderr when `backend` drops writes at exit. Returns whether the
/// backend persists.
pub fn warn_if_ephemeral(backend: &dyn SettingsBackend, action: &str) -> bool {
    if backend.persistent() {
        return true;
    }
    let label = console::Style::new().yellow().apply_to("warning");
    eprintln!(
        "{label}: the {} backend keeps values only for this process; the {action} is lost on exit",
        backend.name()
    );
    false
}

pub fn colorize_type(ty: KeyType) -> String {
    use console::Style;
    let sig = ty.signature();
    match ty {
        KeyType::Boolean => Style::new().magenta().apply_to(sig).to_string(),
        KeyType::Int | KeyType::UInt => Style::new().cyan().apply_to(sig).to_string(),
        KeyType::Double => Style::new().blue().apply_to(sig).to_string(),
        KeyType::String => Style::new().green().apply_to(sig).to_string(),
        KeyType::StringList => Style::new().yellow().apply_to(sig).to_string(),
    }
}
