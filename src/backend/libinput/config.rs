//! Layered device configuration.
//!
//! Configuration is resolved per device from a toml table tree: the `[defaults]` table
//! applies to everything, one category table (`[touchpad]`, `[pointer]` or `[keyboard]`)
//! applies by capability, and a `[device."vvvv:pppp:Name"]` table overrides both for one
//! specific model. The touchpad category is checked before the pointer category since a
//! touchpad also satisfies the pointer predicate.

use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::input::device::DeviceCapabilities;

/// Errors when loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("Failed to read the configuration file")]
    Io(#[from] std::io::Error),
    /// The file is not valid toml
    #[error("Failed to parse the configuration file")]
    Parse(#[from] toml::de::Error),
}

/// The layered key-value store device configuration is read from.
///
/// Reads are atomic with respect to [`reload`](Self::reload): a profile is resolved from
/// one consistent tree.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfigStore {
    path: Option<PathBuf>,
    root: toml::Table,
}

/// Configuration resolved for one device.
///
/// `None` means the layered store does not mention the key and the device (or libinput)
/// default applies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceProfile {
    /// Whether event processing is enabled
    pub enabled: Option<bool>,
    /// Invert the scroll direction
    pub natural_scroll: Option<bool>,
    /// Pointer acceleration in the range -1.0 to 1.0
    pub accel_speed: Option<f64>,
    /// Tap-to-click on touchpads
    pub tap_to_click: Option<bool>,
    /// Disable the touchpad while typing
    pub disable_while_typing: Option<bool>,
    /// Multiplier applied to scroll axis values
    pub scroll_factor: Option<f64>,
    /// Name of the output this device prefers
    pub output_name: Option<String>,
    /// Sub-rectangle of the output a tablet maps to, as `[x, y, w, h]` unit fractions
    pub output_area: Option<[f64; 4]>,
}

impl DeviceConfigStore {
    /// A store without any configuration; every profile resolves to defaults
    pub fn empty() -> Self {
        Default::default()
    }

    /// Parse a store from a toml string
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Ok(DeviceConfigStore {
            path: None,
            root: toml.parse::<toml::Table>()?,
        })
    }

    /// Load a store from a toml file, remembering the path for [`reload`](Self::reload)
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let root = fs::read_to_string(&path)?.parse::<toml::Table>()?;
        Ok(DeviceConfigStore {
            path: Some(path),
            root,
        })
    }

    /// Re-read the backing file, if the store was loaded from one
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            self.root = fs::read_to_string(path)?.parse::<toml::Table>()?;
            debug!(path = %path.display(), "Reloaded device configuration");
        }
        Ok(())
    }

    /// Resolve the profile for a device with the given capabilities and identity
    pub fn profile_for(
        &self,
        capabilities: &DeviceCapabilities,
        (vendor, product): (u32, u32),
        name: &str,
    ) -> DeviceProfile {
        let mut profile = DeviceProfile::default();
        profile.merge_from(self.table("defaults"));

        // touchpad before pointer, a touchpad satisfies both predicates
        let category = if capabilities.touchpad {
            Some("touchpad")
        } else if capabilities.pointer {
            Some("pointer")
        } else if capabilities.keyboard {
            Some("keyboard")
        } else {
            None
        };
        if let Some(category) = category {
            profile.merge_from(self.table(category));
        }

        let key = format!("{vendor:04x}:{product:04x}:{name}");
        let device_override = self
            .root
            .get("device")
            .and_then(toml::Value::as_table)
            .and_then(|devices| devices.get(&key))
            .and_then(toml::Value::as_table);
        profile.merge_from(device_override);

        profile
    }

    fn table(&self, name: &str) -> Option<&toml::Table> {
        self.root.get(name).and_then(toml::Value::as_table)
    }
}

fn float(table: &toml::Table, key: &str) -> Option<f64> {
    match table.get(key)? {
        toml::Value::Float(value) => Some(*value),
        toml::Value::Integer(value) => Some(*value as f64),
        _ => None,
    }
}

impl DeviceProfile {
    fn merge_from(&mut self, table: Option<&toml::Table>) {
        let Some(table) = table else {
            return;
        };
        if let Some(enabled) = table.get("enabled").and_then(toml::Value::as_bool) {
            self.enabled = Some(enabled);
        }
        if let Some(natural) = table.get("natural-scroll").and_then(toml::Value::as_bool) {
            self.natural_scroll = Some(natural);
        }
        if let Some(speed) = float(table, "accel-speed") {
            self.accel_speed = Some(speed);
        }
        if let Some(tap) = table.get("tap-to-click").and_then(toml::Value::as_bool) {
            self.tap_to_click = Some(tap);
        }
        if let Some(dwt) = table.get("disable-while-typing").and_then(toml::Value::as_bool) {
            self.disable_while_typing = Some(dwt);
        }
        if let Some(factor) = float(table, "scroll-factor") {
            self.scroll_factor = Some(factor);
        }
        if let Some(output) = table.get("output-name").and_then(toml::Value::as_str) {
            self.output_name = Some(output.to_owned());
        }
        if let Some(area) = table.get("output-area").and_then(toml::Value::as_array) {
            let values: Vec<f64> = area
                .iter()
                .filter_map(|value| value.as_float().or_else(|| value.as_integer().map(|i| i as f64)))
                .collect();
            if let [x, y, w, h] = values[..] {
                self.output_area = Some([x, y, w, h]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [defaults]
        natural-scroll = false
        scroll-factor = 1.0

        [pointer]
        accel-speed = 0.5

        [touchpad]
        natural-scroll = true
        tap-to-click = true

        [device."046d:c52b:Logitech MX Master"]
        scroll-factor = 2.5
    "#;

    fn pointer_caps() -> DeviceCapabilities {
        DeviceCapabilities {
            pointer: true,
            ..Default::default()
        }
    }

    #[test]
    fn category_layering() {
        let store = DeviceConfigStore::from_toml_str(CONFIG).unwrap();
        let profile = store.profile_for(&pointer_caps(), (0x1234, 0x0001), "Some Mouse");
        assert_eq!(profile.natural_scroll, Some(false));
        assert_eq!(profile.accel_speed, Some(0.5));
        assert_eq!(profile.tap_to_click, None);
    }

    #[test]
    fn touchpad_category_wins_over_pointer() {
        let store = DeviceConfigStore::from_toml_str(CONFIG).unwrap();
        let caps = DeviceCapabilities {
            pointer: true,
            touchpad: true,
            ..Default::default()
        };
        let profile = store.profile_for(&caps, (0xabcd, 0x0002), "Some Touchpad");
        assert_eq!(profile.natural_scroll, Some(true));
        assert_eq!(profile.tap_to_click, Some(true));
        // the pointer category is not merged at all for a touchpad
        assert_eq!(profile.accel_speed, None);
    }

    #[test]
    fn device_override_wins() {
        let store = DeviceConfigStore::from_toml_str(CONFIG).unwrap();
        let profile = store.profile_for(&pointer_caps(), (0x046d, 0xc52b), "Logitech MX Master");
        assert_eq!(profile.scroll_factor, Some(2.5));
        assert_eq!(profile.accel_speed, Some(0.5));
    }

    #[test]
    fn empty_store_resolves_to_defaults() {
        let store = DeviceConfigStore::empty();
        let profile = store.profile_for(&pointer_caps(), (0, 0), "whatever");
        assert_eq!(profile, DeviceProfile::default());
    }
}
