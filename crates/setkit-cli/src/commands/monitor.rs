use super::{open_handle, EXIT_SUCCESS};
use serde::Serialize;
use setkit_backend::SettingsBackend;
use setkit_core::{monitor, SettingsHandle, CHANGED};
use setkit_schema::SettingValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// When to stop watching, besides Ctrl-C.
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    pub timeout_ms: Option<u64>,
    pub count: Option<usize>,
}

#[derive(Serialize)]
struct Notification<'a> {
    schema: &'a str,
    key: &'a str,
    value: Option<SettingValue>,
}

/// Current value of `key`, or `None` when it cannot be read.
fn read_current(reader: &SettingsHandle, key: &str) -> Option<SettingValue> {
    match reader.get_value(key) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("could not read changed key {key}: {e}");
            None
        }
    }
}

pub fn run(
    backend: Arc<dyn SettingsBackend>,
    schema: &str,
    key: Option<&str>,
    limits: Limits,
    json: bool,
) -> Result<u8, String> {
    let event = key.map_or_else(|| CHANGED.to_owned(), |k| format!("{CHANGED}::{k}"));
    // Read values on this thread; the monitor's handle belongs to its worker.
    let reader = open_handle(backend.as_ref(), schema)?;
    if !backend.persistent() {
        return Err(format!(
            "cannot monitor on the {} backend: it only sees writes made by this process",
            backend.name()
        ));
    }
    let mon = monitor(backend, schema, &event).map_err(|e| e.to_string())?;

    let stop = mon.stop_signal();
    let handler_stop = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_stop.request()) {
        debug!("Ctrl-C handler not installed: {e}");
    }

    let deadline = limits
        .timeout_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    let mut seen = 0usize;
    while !stop.is_requested() && mon.is_running() {
        if limits.count.is_some_and(|max| seen >= max) {
            break;
        }
        let wait = match deadline {
            Some(d) => {
                let now = Instant::now();
                if now >= d {
                    break;
                }
                (d - now).min(POLL_INTERVAL)
            }
            None => POLL_INTERVAL,
        };
        let Some(change) = mon.recv_timeout(wait) else {
            continue;
        };
        seen += 1;
        let value = read_current(&reader, &change.key);
        if json {
            let out = Notification {
                schema: &change.schema,
                key: &change.key,
                value,
            };
            let line = serde_json::to_string(&out)
                .map_err(|e| format!("JSON serialization failed: {e}"))?;
            println!("{line}");
        } else if let Some(value) = value {
            println!("{}: {value}", change.key);
        } else {
            println!("{}", change.key);
        }
    }

    debug!("monitor on {schema} stopping after {seen} notification(s)");
    mon.stop().map_err(|e| e.to_string())?;
    Ok(EXIT_SUCCESS)
}
