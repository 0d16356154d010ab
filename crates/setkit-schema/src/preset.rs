use crate::schema::{KeyDef, Schema, SchemaSource};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BuiltinSchema {
    pub id: &'static str,
    pub description: &'static str,
}

pub const BUILTIN_SCHEMAS: &[BuiltinSchema] = &[
    BuiltinSchema {
        id: "org.gnome.settings-daemon.plugins.power",
        description: "Power management: idle dimming, sleep, and battery actions",
    },
    BuiltinSchema {
        id: "org.gnome.libgnomekbd.keyboard",
        description: "Keyboard model, layouts, and XKB options",
    },
    BuiltinSchema {
        id: "org.gnome.system.locale",
        description: "System locale region",
    },
    BuiltinSchema {
        id: "org.gnome.settings-daemon.peripherals.mouse",
        description: "Mouse pointer behaviour",
    },
    BuiltinSchema {
        id: "org.gnome.settings-daemon.plugins.xrandr",
        description: "Display configuration and backlight brightness",
    },
];

fn power() -> Schema {
    Schema::builder("org.gnome.settings-daemon.plugins.power")
        .key(KeyDef::boolean("active", true).with_summary("Activation of this plugin"))
        .key(KeyDef::boolean("idle-dim-ac", false).with_summary("Dim the screen when idle on AC"))
        .key(
            KeyDef::boolean("idle-dim-battery", true)
                .with_summary("Dim the screen when idle on battery"),
        )
        .key(
            KeyDef::int("idle-brightness", 30)
                .with_range(0, 100)
                .with_summary("Brightness percentage when idle"),
        )
        .key(KeyDef::int("idle-dim-time", 90).with_summary("Seconds before the screen dims"))
        .key(KeyDef::int("sleep-inactive-ac-timeout", 0))
        .key(KeyDef::string("sleep-inactive-ac-type", "suspend"))
        .key(KeyDef::int("sleep-inactive-battery-timeout", 0))
        .key(KeyDef::string("sleep-inactive-battery-type", "suspend"))
        .key(KeyDef::string("lid-close-ac-action", "suspend"))
        .key(KeyDef::string("lid-close-battery-action", "suspend"))
        .key(KeyDef::string("critical-battery-action", "hibernate"))
        .key(
            KeyDef::int("percentage-low", 10)
                .with_range(0, 100)
                .with_summary("Battery percentage considered low"),
        )
        .key(KeyDef::int("percentage-critical", 3).with_range(0, 100))
        .build()
}

fn keyboard() -> Schema {
    Schema::builder("org.gnome.libgnomekbd.keyboard")
        .key(KeyDef::string("model", "").with_summary("Keyboard model"))
        .key(KeyDef::string_list("layouts", &[]).with_summary("Keyboard layouts"))
        .key(KeyDef::string_list("options", &[]).with_summary("Keyboard options"))
        .build()
}

fn locale() -> Schema {
    Schema::builder("org.gnome.system.locale")
        .key(KeyDef::string("region", "").with_summary("Locale used for dates, numbers, and units"))
        .build()
}

fn mouse() -> Schema {
    Schema::builder("org.gnome.settings-daemon.peripherals.mouse")
        .key(KeyDef::boolean("left-handed", false))
        .key(KeyDef::double("motion-acceleration", -1.0))
        .key(
            KeyDef::int("motion-threshold", -1)
                .with_summary("Pixels the pointer moves before accelerating"),
        )
        .key(KeyDef::int("double-click", 400).with_summary("Double click time in milliseconds"))
        .key(KeyDef::uint("drag-threshold", 8))
        .key(KeyDef::boolean("locate-pointer", false))
        .key(KeyDef::boolean("middle-button-enabled", false))
        .build()
}

fn xrandr() -> Schema {
    Schema::builder("org.gnome.settings-daemon.plugins.xrandr")
        .key(KeyDef::boolean("active", true))
        .key(KeyDef::double("brightness", 0.8).with_summary("Backlight brightness fraction"))
        .key(KeyDef::string("default-monitors-setup", "follow-lid"))
        .key(KeyDef::string("default-configuration-file", "/etc/gnome-settings-daemon/xrandr/monitors.xml"))
        .build()
}

pub fn get_builtin(id: &str) -> Option<Schema> {
    match id {
        "org.gnome.settings-daemon.plugins.power" => Some(power()),
        "org.gnome.libgnomekbd.keyboard" => Some(keyboard()),
        "org.gnome.system.locale" => Some(locale()),
        "org.gnome.settings-daemon.peripherals.mouse" => Some(mouse()),
        "org.gnome.settings-daemon.plugins.xrandr" => Some(xrandr()),
        _ => None,
    }
}

pub fn list_builtin() -> &'static [BuiltinSchema] {
    BUILTIN_SCHEMAS
}

/// A source holding every built-in schema.
pub fn builtin_source() -> SchemaSource {
    let mut source = SchemaSource::new();
    for entry in BUILTIN_SCHEMAS {
        if let Some(schema) = get_builtin(entry.id) {
            source.insert(schema);
        }
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::KeyType;

    #[test]
    fn every_listed_builtin_resolves() {
        for entry in BUILTIN_SCHEMAS {
            let schema = get_builtin(entry.id);
            assert!(schema.is_some(), "builtin '{}' has no definition", entry.id);
            assert_eq!(schema.unwrap().id(), entry.id);
        }
        assert!(get_builtin("org.example.nonexistent").is_none());
    }

    #[test]
    fn builtin_ids_are_unique() {
        let mut ids: Vec<&str> = BUILTIN_SCHEMAS.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), BUILTIN_SCHEMAS.len());
        assert_eq!(builtin_source().len(), BUILTIN_SCHEMAS.len());
    }

    #[test]
    fn defaults_fall_inside_declared_ranges() {
        let source = builtin_source();
        for id in source.list() {
            let schema = source.lookup(&id).unwrap();
            for key in schema.keys() {
                assert!(
                    key.accepts(&key.default),
                    "default of {id}/{} rejected by its own range",
                    key.name
                );
            }
        }
    }

    #[test]
    fn example_keys_have_expected_types() {
        let power = get_builtin("org.gnome.settings-daemon.plugins.power").unwrap();
        assert_eq!(power.key("active").unwrap().key_type(), KeyType::Boolean);
        assert_eq!(power.key("idle-brightness").unwrap().key_type(), KeyType::Int);

        let kbd = get_builtin("org.gnome.libgnomekbd.keyboard").unwrap();
        assert_eq!(kbd.key("options").unwrap().key_type(), KeyType::StringList);

        let mouse = get_builtin("org.gnome.settings-daemon.peripherals.mouse").unwrap();
        assert_eq!(mouse.key("motion-threshold").unwrap().key_type(), KeyType::Int);
        assert_eq!(mouse.key("drag-threshold").unwrap().key_type(), KeyType::UInt);
    }
}
