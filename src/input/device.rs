//! The [`InputDevice`] record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::output::{Output, WeakOutput};
use crate::utils::{Normalized, Raw, Rectangle, Size};

bitflags::bitflags! {
    /// Keyboard LEDs of a device
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Leds: u32 {
        /// Num lock
        const NUMLOCK = 0x01;
        /// Caps lock
        const CAPSLOCK = 0x02;
        /// Scroll lock
        const SCROLLLOCK = 0x04;
    }
}

/// Capabilities of an [`InputDevice`].
///
/// Each flag is immutable for the lifetime of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceCapabilities {
    /// Device has keys
    pub keyboard: bool,
    /// Device has the full alphanumeric key range
    pub alphanumeric_keyboard: bool,
    /// Device can move a pointer
    pub pointer: bool,
    /// Device is a touchpad (also satisfies the pointer predicate)
    pub touchpad: bool,
    /// Device is a touch screen
    pub touch: bool,
    /// Device accepts tablet tools
    pub tablet_tool: bool,
    /// Device is a tablet pad
    pub tablet_pad: bool,
    /// Device carries a tablet-mode switch
    pub tablet_mode_switch: bool,
    /// Device carries a lid switch
    pub lid_switch: bool,
}

/// Mutable per-device configuration.
///
/// Mutations happen on the compositor thread and are read by the worker thread under the
/// device mutex, see [`InputDevice`].
#[derive(Debug, Clone, Default)]
pub struct DeviceState {
    pub(crate) enabled: bool,
    pub(crate) leds: Leds,
    pub(crate) output: Option<WeakOutput>,
    pub(crate) scroll_factor: f64,
    pub(crate) output_name: Option<String>,
    pub(crate) output_area: Option<Rectangle<f64, Normalized>>,
}

/// Shared handle to an [`InputDevice`]
pub type DeviceHandle = Arc<InputDevice>;

/// One source of input events, real or virtual.
///
/// Real devices are created by the device registry when the backend reports them; virtual
/// devices are created when a fake-input client binds. Both are destroyed by dropping the
/// last handle, after the removal event has been drained. Events still queued keep the
/// record alive through their own handles, but are discarded at dispatch once the device
/// is no longer [alive](Self::is_alive).
#[derive(Debug)]
pub struct InputDevice {
    sysname: String,
    name: String,
    vendor: u32,
    product: u32,
    capabilities: DeviceCapabilities,
    physical_size: Option<Size<f64, Raw>>,
    alive: AtomicBool,
    state: Mutex<DeviceState>,
}

impl InputDevice {
    /// Create a new device record.
    ///
    /// `sysname` is the stable system name of the device node and is empty for virtual
    /// devices.
    pub fn new(
        sysname: impl Into<String>,
        name: impl Into<String>,
        (vendor, product): (u32, u32),
        capabilities: DeviceCapabilities,
        physical_size: Option<Size<f64, Raw>>,
    ) -> DeviceHandle {
        Arc::new(InputDevice {
            sysname: sysname.into(),
            name: name.into(),
            vendor,
            product,
            capabilities,
            physical_size,
            alive: AtomicBool::new(true),
            state: Mutex::new(DeviceState {
                enabled: true,
                scroll_factor: 1.0,
                ..Default::default()
            }),
        })
    }

    /// Create the record of a virtual device with the given capabilities
    pub fn new_virtual(name: impl Into<String>, capabilities: DeviceCapabilities) -> DeviceHandle {
        Self::new("", name, (0, 0), capabilities, None)
    }

    /// Stable system name, empty for virtual devices
    pub fn sysname(&self) -> &str {
        &self.sysname
    }

    /// Human readable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vendor id, 0 for virtual devices
    pub fn vendor(&self) -> u32 {
        self.vendor
    }

    /// Product id, 0 for virtual devices
    pub fn product(&self) -> u32 {
        self.product
    }

    /// Group key shared by the sub-devices of one physical device (e.g. a tablet's pad
    /// and tool interfaces)
    pub fn group(&self) -> u64 {
        ((self.vendor as u64) << 32) | self.product as u64
    }

    /// Capability set of this device
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Advertised physical size in millimeters, if any
    pub fn physical_size(&self) -> Option<Size<f64, Raw>> {
        self.physical_size
    }

    /// Whether this device is driven by a client rather than by hardware.
    ///
    /// Virtual devices report their absolute coordinates directly in compositor space;
    /// they are never bound to an output.
    pub fn is_virtual(&self) -> bool {
        self.sysname.is_empty()
    }

    /// Whether the device is still registered.
    ///
    /// Events referencing a device that is no longer alive are dropped at dispatch.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub(crate) fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Device has keys
    pub fn is_keyboard(&self) -> bool {
        self.capabilities.keyboard
    }

    /// Device has the full alphanumeric key range
    pub fn is_alphanumeric_keyboard(&self) -> bool {
        self.capabilities.alphanumeric_keyboard
    }

    /// Device can move a pointer
    pub fn is_pointer(&self) -> bool {
        self.capabilities.pointer
    }

    /// Device is a touchpad
    pub fn is_touchpad(&self) -> bool {
        self.capabilities.touchpad
    }

    /// Device is a touch screen
    pub fn is_touch(&self) -> bool {
        self.capabilities.touch
    }

    /// Device accepts tablet tools
    pub fn is_tablet_tool(&self) -> bool {
        self.capabilities.tablet_tool
    }

    /// Device is a tablet pad
    pub fn is_tablet_pad(&self) -> bool {
        self.capabilities.tablet_pad
    }

    /// Device carries a tablet-mode switch
    pub fn is_tablet_mode_switch(&self) -> bool {
        self.capabilities.tablet_mode_switch
    }

    /// Device carries a lid switch
    pub fn is_lid_switch(&self) -> bool {
        self.capabilities.lid_switch
    }

    /// Whether event processing for the device is enabled
    pub fn is_enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.state.lock().unwrap().enabled = enabled;
    }

    /// Current keyboard LED state
    pub fn leds(&self) -> Leds {
        self.state.lock().unwrap().leds
    }

    pub(crate) fn set_leds(&self, leds: Leds) {
        self.state.lock().unwrap().leds = leds;
    }

    /// Scroll factor applied multiplicatively to axis events of this device
    pub fn scroll_factor(&self) -> f64 {
        self.state.lock().unwrap().scroll_factor
    }

    /// Set the scroll factor for axis events of this device
    pub fn set_scroll_factor(&self, factor: f64) {
        self.state.lock().unwrap().scroll_factor = factor;
    }

    /// The output this device is currently assigned to, if it is still around
    pub fn output(&self) -> Option<Output> {
        self.state
            .lock()
            .unwrap()
            .output
            .as_ref()
            .and_then(WeakOutput::upgrade)
    }

    /// Assign the device to an output
    pub fn set_output(&self, output: Option<&Output>) {
        self.state.lock().unwrap().output = output.map(Output::downgrade);
    }

    /// Output name this device prefers, from its configuration or hardware information
    pub fn output_name(&self) -> Option<String> {
        self.state.lock().unwrap().output_name.clone()
    }

    /// Set the preferred output name.
    ///
    /// The binder re-runs its assignment when the name transitions to empty.
    pub fn set_output_name(&self, name: Option<String>) {
        self.state.lock().unwrap().output_name = name.filter(|name| !name.is_empty());
    }

    /// Sub-rectangle of the assigned output this tablet maps to, in unit coordinates
    pub fn output_area(&self) -> Option<Rectangle<f64, Normalized>> {
        self.state.lock().unwrap().output_area
    }

    /// Restrict the tablet mapping to a sub-rectangle of the assigned output
    pub fn set_output_area(&self, area: Option<Rectangle<f64, Normalized>>) {
        self.state.lock().unwrap().output_area = area;
    }
}
