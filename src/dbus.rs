//! Session-bus surface of the device registry.
//!
//! Publishes an object with a read-only `devicesSysNames` property listing the
//! currently registered real devices in registration order, plus `deviceAdded` /
//! `deviceRemoved` signals. A separate listener subscribes to the desktop-wide settings
//! broadcast and reports pointer-configuration changes back into the compositor loop.

use std::sync::{Arc, Mutex};

use calloop::channel;
use indexmap::IndexMap;
use tracing::{debug, warn};
use zbus::object_server::SignalEmitter;

use crate::backend::libinput::Connection;
use crate::input::device::DeviceHandle;

/// Object path of the device manager
pub const OBJECT_PATH: &str = "/org/bellows/InputDevice";
/// Interface name of the device manager
pub const INTERFACE: &str = "org.bellows.InputDeviceManager";
/// Interface name of the settings broadcast
pub const SETTINGS_INTERFACE: &str = "org.bellows.Settings";

// values of the settings broadcast, matching the desktop settings daemon
const CHANGE_TYPE_SETTINGS: i32 = 3;
const SETTINGS_MOUSE: i32 = 0;

/// The device-manager D-Bus object
pub struct DeviceManager {
    devices: Arc<Mutex<IndexMap<String, DeviceHandle>>>,
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager").finish_non_exhaustive()
    }
}

#[zbus::interface(name = "org.bellows.InputDeviceManager")]
impl DeviceManager {
    /// System names of all registered devices, in registration order
    #[zbus(property, name = "devicesSysNames")]
    fn devices_sys_names(&self) -> Vec<String> {
        self.devices.lock().unwrap().keys().cloned().collect()
    }

    /// A device appeared
    #[zbus(signal, name = "deviceAdded")]
    async fn device_added(emitter: &SignalEmitter<'_>, sysname: &str) -> zbus::Result<()>;

    /// A device went away
    #[zbus(signal, name = "deviceRemoved")]
    async fn device_removed(emitter: &SignalEmitter<'_>, sysname: &str) -> zbus::Result<()>;
}

/// Handle used to emit the device signals after [`serve`]
#[derive(Debug, Clone)]
pub struct DeviceManagerHandle {
    bus: zbus::Connection,
}

impl DeviceManagerHandle {
    /// Announce a new device on the bus
    pub fn device_added(&self, sysname: &str) {
        let result = SignalEmitter::new(&self.bus, OBJECT_PATH)
            .and_then(|emitter| zbus::block_on(DeviceManager::device_added(&emitter, sysname)));
        if let Err(err) = result {
            warn!("Failed to emit deviceAdded: {}", err);
        }
    }

    /// Announce a removed device on the bus
    pub fn device_removed(&self, sysname: &str) {
        let result = SignalEmitter::new(&self.bus, OBJECT_PATH)
            .and_then(|emitter| zbus::block_on(DeviceManager::device_removed(&emitter, sysname)));
        if let Err(err) = result {
            warn!("Failed to emit deviceRemoved: {}", err);
        }
    }
}

/// Publish the device registry of `connection` at [`OBJECT_PATH`].
///
/// Reading the property returns exactly the currently registered real devices; virtual
/// devices never show up here.
pub fn serve(
    bus: &zbus::blocking::Connection,
    connection: &Connection,
) -> zbus::Result<DeviceManagerHandle> {
    bus.object_server().at(
        OBJECT_PATH,
        DeviceManager {
            devices: connection.device_table(),
        },
    )?;
    debug!(path = OBJECT_PATH, "Serving input device manager");
    Ok(DeviceManagerHandle {
        bus: bus.inner().clone(),
    })
}

/// A change reported by the settings broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsChange {
    /// The mouse settings changed; pointer devices should re-read their configuration
    Mouse,
}

/// Subscribe to the desktop settings broadcast.
///
/// Returns a calloop channel delivering [`SettingsChange`]s; insert it into the
/// compositor loop and call
/// [`Connection::reload_pointer_config`] on [`SettingsChange::Mouse`]. The
/// subscription runs on its own listener thread for the lifetime of the bus
/// connection.
pub fn settings_listener(
    bus: &zbus::blocking::Connection,
) -> zbus::Result<channel::Channel<SettingsChange>> {
    let (sender, channel) = channel::channel();

    let rule = zbus::MatchRule::builder()
        .msg_type(zbus::message::Type::Signal)
        .interface(SETTINGS_INTERFACE)?
        .member("notifyChange")?
        .build();
    let messages = zbus::blocking::MessageIterator::for_match_rule(rule, bus, None)?;

    std::thread::Builder::new()
        .name("dbus-settings".into())
        .spawn(move || {
            for message in messages {
                let Ok(message) = message else {
                    break;
                };
                let Ok((change_type, arg)) = message.body().deserialize::<(i32, i32)>() else {
                    continue;
                };
                if change_type == CHANGE_TYPE_SETTINGS && arg == SETTINGS_MOUSE {
                    debug!("Mouse settings changed");
                    if sender.send(SettingsChange::Mouse).is_err() {
                        break;
                    }
                }
            }
        })
        .map_err(|err| zbus::Error::Failure(format!("failed to spawn the settings listener: {err}")))?;

    Ok(channel)
}
