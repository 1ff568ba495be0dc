//! Device and event model shared by real and virtual input devices.
//!
//! All sources of input, physical devices enumerated by the
//! [libinput backend](crate::backend::libinput) as well as virtual devices created by
//! clients of the [fake-input protocol](crate::wayland::fake_input) alike, are represented by
//! the same [`InputDevice`] record and feed the same [`InputEvent`] stream. Capability
//! differences are plain predicates on the record, not distinct types.

pub mod device;
pub mod event;
pub mod queue;
pub mod tablet;
pub mod touch;

pub use self::device::{DeviceCapabilities, DeviceHandle, InputDevice, Leds};
pub use self::event::InputEvent;
