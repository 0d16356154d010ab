use super::{json_pretty, open_handle, EXIT_SUCCESS};
use serde::Serialize;
use setkit_backend::SettingsBackend;
use setkit_core::SettingsHandle;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

const POWER: &str = "org.gnome.settings-daemon.plugins.power";
const KEYBOARD: &str = "org.gnome.libgnomekbd.keyboard";
const LOCALE: &str = "org.gnome.system.locale";
const MOUSE: &str = "org.gnome.settings-daemon.peripherals.mouse";

#[derive(Debug, Serialize)]
struct Round {
    locale_keys: Vec<String>,
    motion_threshold: i32,
    power_keys: usize,
    active: bool,
    idle_dim_battery_written: bool,
    idle_brightness: i32,
    idle_brightness_written: bool,
    options_written: bool,
    options: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Report {
    backend: String,
    iterations: u32,
    notifications: usize,
    last_round: Option<Round>,
}

struct Handles {
    power: SettingsHandle,
    keyboard: SettingsHandle,
    locale: SettingsHandle,
    mouse: SettingsHandle,
}

fn round(h: &Handles) -> Result<Round, String> {
    let err = |e: setkit_core::SettingsError| e.to_string();
    Ok(Round {
        locale_keys: h.locale.list_keys().map_err(err)?,
        motion_threshold: h.mouse.get_int("motion-threshold").map_err(err)?,
        power_keys: h.power.list_keys().map_err(err)?.len(),
        active: h.power.get_boolean("active").map_err(err)?,
        idle_dim_battery_written: h
            .power
            .set_boolean("idle-dim-battery", true)
            .map_err(err)?,
        idle_brightness: h.power.get_int("idle-brightness").map_err(err)?,
        idle_brightness_written: h.power.set_int("idle-brightness", 31).map_err(err)?,
        options_written: h
            .keyboard
            .set_string_list("options", &["xxx", "ooo"])
            .map_err(err)?,
        options: h.keyboard.get_string_list("options").map_err(err)?,
    })
}

fn print_round(r: &Round) {
    println!("list_keys {LOCALE}: {:?}", r.locale_keys);
    println!("get_int motion-threshold: {}", r.motion_threshold);
    println!("list_keys {POWER}: {} keys", r.power_keys);
    println!("get_boolean active: {}", r.active);
    println!("set_boolean idle-dim-battery: {}", r.idle_dim_battery_written);
    println!("get_int idle-brightness: {}", r.idle_brightness);
    println!("set_int idle-brightness: {}", r.idle_brightness_written);
    println!("set_strv options: {}", r.options_written);
    println!("get_strv options: {:?}", r.options);
}

pub fn run(backend: &dyn SettingsBackend, iterations: u32, json: bool) -> Result<u8, String> {
    let mut handles = Handles {
        power: open_handle(backend, POWER)?,
        keyboard: open_handle(backend, KEYBOARD)?,
        locale: open_handle(backend, LOCALE)?,
        mouse: open_handle(backend, MOUSE)?,
    };

    let notifications = Arc::new(AtomicUsize::new(0));
    for handle in [&mut handles.power, &mut handles.keyboard] {
        let counter = Arc::clone(&notifications);
        handle
            .subscribe("changed", move |key| {
                counter.fetch_add(1, Ordering::Relaxed);
                debug!("changed {key}");
            })
            .map_err(|e| e.to_string())?;
    }

    let mut last_round = None;
    for i in 0..iterations {
        let r = round(&handles)?;
        if !json && i == 0 {
            print_round(&r);
        }
        last_round = Some(r);
    }

    handles.power.sync().map_err(|e| e.to_string())?;
    for handle in [&handles.power, &handles.keyboard] {
        handle.dispatch_pending().map_err(|e| e.to_string())?;
    }
    let report = Report {
        backend: backend.name().to_owned(),
        iterations,
        notifications: notifications.load(Ordering::Relaxed),
        last_round,
    };
    if json {
        println!("{}", json_pretty(&report)?);
    } else {
        println!(
            "{} round(s) on {} backend, {} change notification(s)",
            report.iterations, report.backend, report.notifications
        );
    }
    Ok(EXIT_SUCCESS)
}
