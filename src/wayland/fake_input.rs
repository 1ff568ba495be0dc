//! Synthetic input from clients.
//!
//! This module implements the `org_kde_kwin_fake_input` global. Every bind creates one
//! virtual [`InputDevice`] whose events are pushed into the same [`EventQueue`] as real
//! input and share its ordering. Event synthesis is gated behind an authentication
//! handshake: the client states who it is and why it wants the capability, the
//! compositor policy answers asynchronously through [`FakeDevice::set_authentication`].
//! Until it does, every request is silently dropped.
//!
//! ```no_run
//! # extern crate wayland_server;
//! use bellows::delegate_fake_input;
//! use bellows::input::queue::EventQueue;
//! use bellows::wayland::fake_input::{FakeDevice, FakeInputHandler, FakeInputState};
//!
//! struct State { fake_input: FakeInputState }
//! # let mut display = wayland_server::Display::<State>::new().unwrap();
//! let (queue, _source) = EventQueue::new().unwrap();
//!
//! let state = State {
//!     fake_input: FakeInputState::new::<State>(&display.handle(), queue),
//! };
//!
//! impl FakeInputHandler for State {
//!     fn fake_input_state(&mut self) -> &mut FakeInputState {
//!         &mut self.fake_input
//!     }
//!
//!     fn authentication_requested(&mut self, device: FakeDevice, application: String, reason: String) {
//!         // ask the policy layer; it answers with device.set_authentication(..)
//!         let _ = (device, application, reason);
//!     }
//! }
//! delegate_fake_input!(State);
//! ```

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};
use wayland_protocols_plasma::fake_input::server::org_kde_kwin_fake_input::{
    self, OrgKdeKwinFakeInput,
};
use wayland_server::backend::{ClientId, GlobalId};
use wayland_server::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New};

use crate::input::device::{DeviceCapabilities, DeviceHandle, InputDevice};
use crate::input::event::{
    self as events, Axis, AxisSource, ButtonState, InputEvent, KeyState,
};
use crate::input::queue::EventQueue;
use crate::utils::clock::{Clock, Monotonic};

const FAKE_INPUT_VERSION: u32 = 4;

/// Handler trait for the fake-input global
pub trait FakeInputHandler: Sized {
    /// [`FakeInputState`] getter
    fn fake_input_state(&mut self) -> &mut FakeInputState;

    /// A client asked for the capability to synthesize events.
    ///
    /// The policy layer decides asynchronously and answers by calling
    /// [`FakeDevice::set_authentication`]; until then the device drops everything.
    fn authentication_requested(&mut self, device: FakeDevice, application: String, reason: String);
}

/// State of the fake-input global
#[derive(Debug)]
pub struct FakeInputState {
    global: GlobalId,
    queue: Arc<EventQueue>,
    clock: Clock<Monotonic>,
}

impl FakeInputState {
    /// Create a new `org_kde_kwin_fake_input` global.
    ///
    /// Synthesized events are pushed into `queue`, timestamped with the compositor's
    /// monotonic clock at ingestion time.
    pub fn new<D>(display: &DisplayHandle, queue: Arc<EventQueue>) -> Self
    where
        D: GlobalDispatch<OrgKdeKwinFakeInput, ()>,
        D: Dispatch<OrgKdeKwinFakeInput, FakeInputUserData>,
        D: FakeInputHandler,
        D: 'static,
    {
        let global = display.create_global::<D, OrgKdeKwinFakeInput, _>(FAKE_INPUT_VERSION, ());
        Self {
            global,
            queue,
            clock: Clock::new(),
        }
    }

    /// Returns the [`OrgKdeKwinFakeInput`] global
    pub fn global(&self) -> GlobalId {
        self.global.clone()
    }
}

/// User data of the [`OrgKdeKwinFakeInput`] resource
#[derive(Debug)]
pub struct FakeInputUserData {
    device: FakeDevice,
}

#[derive(Debug)]
struct FakeDeviceInner {
    handle: DeviceHandle,
    authenticated: AtomicBool,
    touch_slots: Mutex<HashSet<u32>>,
}

/// A virtual input device created by a fake-input client.
///
/// Cheap to clone; the policy layer keeps one to answer the authentication request.
/// All event-producing operations return `None` (and have no side effect) while the
/// device is not authenticated.
#[derive(Debug, Clone)]
pub struct FakeDevice {
    inner: Arc<FakeDeviceInner>,
}

impl FakeDevice {
    fn new() -> Self {
        FakeDevice {
            inner: Arc::new(FakeDeviceInner {
                handle: InputDevice::new_virtual(
                    "virtual input device",
                    DeviceCapabilities {
                        keyboard: true,
                        pointer: true,
                        touch: true,
                        ..Default::default()
                    },
                ),
                authenticated: AtomicBool::new(false),
                touch_slots: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// The underlying device record
    pub fn device(&self) -> &DeviceHandle {
        &self.inner.handle
    }

    /// Whether the policy layer has granted event synthesis
    pub fn is_authenticated(&self) -> bool {
        self.inner.authenticated.load(Ordering::Acquire)
    }

    /// Grant or revoke event synthesis.
    ///
    /// Revoking takes effect for the next request; events already queued stay queued.
    pub fn set_authentication(&self, granted: bool) {
        debug!(
            device = self.inner.handle.name(),
            granted, "Fake input authentication changed"
        );
        self.inner.authenticated.store(granted, Ordering::Release);
    }

    fn gated(&self) -> Option<()> {
        if self.is_authenticated() {
            Some(())
        } else {
            trace!("Dropping fake input request of unauthenticated client");
            None
        }
    }

    fn pointer_motion(&self, time: u64, delta_x: f64, delta_y: f64) -> Option<InputEvent> {
        self.gated()?;
        Some(InputEvent::PointerMotion {
            event: events::PointerMotionEvent {
                device: self.inner.handle.clone(),
                time,
                delta: (delta_x, delta_y).into(),
                delta_unaccel: (delta_x, delta_y).into(),
            },
        })
    }

    fn pointer_motion_absolute(&self, time: u64, x: f64, y: f64) -> Option<InputEvent> {
        self.gated()?;
        Some(InputEvent::PointerMotionAbsolute {
            event: events::PointerMotionAbsoluteEvent {
                device: self.inner.handle.clone(),
                time,
                // fake input positions are already in compositor space
                position: (x, y).into(),
            },
        })
    }

    fn button(&self, time: u64, button: u32, state: u32) -> Option<InputEvent> {
        self.gated()?;
        Some(InputEvent::PointerButton {
            event: events::PointerButtonEvent {
                device: self.inner.handle.clone(),
                time,
                button,
                state: button_state(state)?,
            },
        })
    }

    fn axis(&self, time: u64, axis: u32, value: f64) -> Option<InputEvent> {
        self.gated()?;
        let axis = match axis {
            0 => Axis::Vertical,
            1 => Axis::Horizontal,
            other => {
                trace!(axis = other, "Invalid fake input axis, dropping");
                return None;
            }
        };
        Some(InputEvent::PointerAxis {
            event: events::PointerAxisEvent {
                device: self.inner.handle.clone(),
                time,
                axis,
                source: AxisSource::Wheel,
                value,
                value_v120: None,
            },
        })
    }

    fn keyboard_key(&self, time: u64, key: u32, state: u32) -> Option<InputEvent> {
        self.gated()?;
        Some(InputEvent::Keyboard {
            event: events::KeyboardKeyEvent {
                device: self.inner.handle.clone(),
                time,
                key_code: key,
                state: match state {
                    0 => KeyState::Released,
                    1 => KeyState::Pressed,
                    other => {
                        trace!(state = other, "Invalid fake input key state, dropping");
                        return None;
                    }
                },
            },
        })
    }

    fn touch_down(&self, time: u64, id: u32, x: f64, y: f64) -> Option<InputEvent> {
        self.gated()?;
        if !self.inner.touch_slots.lock().unwrap().insert(id) {
            trace!(id, "Duplicate fake touch down, dropping");
            return None;
        }
        Some(InputEvent::TouchDown {
            event: events::TouchDownEvent {
                device: self.inner.handle.clone(),
                time,
                slot: id,
                position: (x, y).into(),
            },
        })
    }

    fn touch_motion(&self, time: u64, id: u32, x: f64, y: f64) -> Option<InputEvent> {
        self.gated()?;
        if !self.inner.touch_slots.lock().unwrap().contains(&id) {
            trace!(id, "Fake touch motion for an unknown id, dropping");
            return None;
        }
        Some(InputEvent::TouchMotion {
            event: events::TouchMotionEvent {
                device: self.inner.handle.clone(),
                time,
                slot: id,
                position: (x, y).into(),
            },
        })
    }

    fn touch_up(&self, time: u64, id: u32) -> Option<InputEvent> {
        self.gated()?;
        if !self.inner.touch_slots.lock().unwrap().remove(&id) {
            trace!(id, "Fake touch up for an unknown id, dropping");
            return None;
        }
        Some(InputEvent::TouchUp {
            event: events::TouchUpEvent {
                device: self.inner.handle.clone(),
                time,
                slot: id,
            },
        })
    }

    fn touch_cancel(&self, time: u64) -> Option<InputEvent> {
        self.gated()?;
        self.inner.touch_slots.lock().unwrap().clear();
        Some(InputEvent::TouchCancel {
            event: events::TouchCancelEvent {
                device: self.inner.handle.clone(),
                time,
            },
        })
    }

    fn touch_frame(&self, time: u64) -> Option<InputEvent> {
        self.gated()?;
        Some(InputEvent::TouchFrame {
            event: events::TouchFrameEvent {
                device: self.inner.handle.clone(),
                time,
            },
        })
    }
}

fn button_state(state: u32) -> Option<ButtonState> {
    match state {
        0 => Some(ButtonState::Released),
        1 => Some(ButtonState::Pressed),
        other => {
            trace!(state = other, "Invalid fake input button state, dropping");
            None
        }
    }
}

impl<D> GlobalDispatch<OrgKdeKwinFakeInput, (), D> for FakeInputState
where
    D: GlobalDispatch<OrgKdeKwinFakeInput, ()>,
    D: Dispatch<OrgKdeKwinFakeInput, FakeInputUserData>,
    D: FakeInputHandler,
    D: 'static,
{
    fn bind(
        state: &mut D,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<OrgKdeKwinFakeInput>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        let device = FakeDevice::new();
        data_init.init(
            resource,
            FakeInputUserData {
                device: device.clone(),
            },
        );

        let fake_input = state.fake_input_state();
        fake_input.queue.push(InputEvent::DeviceAdded {
            device: device.device().clone(),
            time: fake_input.clock.now().as_micros(),
        });
    }
}

impl<D> Dispatch<OrgKdeKwinFakeInput, FakeInputUserData, D> for FakeInputState
where
    D: Dispatch<OrgKdeKwinFakeInput, FakeInputUserData>,
    D: FakeInputHandler,
    D: 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &OrgKdeKwinFakeInput,
        request: org_kde_kwin_fake_input::Request,
        data: &FakeInputUserData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            org_kde_kwin_fake_input::Request::Authenticate { application, reason } => {
                state.authentication_requested(data.device.clone(), application, reason);
            }
            request => {
                let fake_input = state.fake_input_state();
                let time = fake_input.clock.now().as_micros();
                let device = &data.device;
                let event = match request {
                    // handled above
                    org_kde_kwin_fake_input::Request::Authenticate { .. } => None,
                    org_kde_kwin_fake_input::Request::PointerMotion { delta_x, delta_y } => {
                        device.pointer_motion(time, delta_x, delta_y)
                    }
                    org_kde_kwin_fake_input::Request::PointerMotionAbsolute { x, y } => {
                        device.pointer_motion_absolute(time, x, y)
                    }
                    org_kde_kwin_fake_input::Request::Button { button, state } => {
                        device.button(time, button, state)
                    }
                    org_kde_kwin_fake_input::Request::Axis { axis, value } => {
                        device.axis(time, axis, value)
                    }
                    org_kde_kwin_fake_input::Request::KeyboardKey { button, state } => {
                        device.keyboard_key(time, button, state)
                    }
                    org_kde_kwin_fake_input::Request::TouchDown { id, x, y } => {
                        device.touch_down(time, id, x, y)
                    }
                    org_kde_kwin_fake_input::Request::TouchMotion { id, x, y } => {
                        device.touch_motion(time, id, x, y)
                    }
                    org_kde_kwin_fake_input::Request::TouchUp { id } => device.touch_up(time, id),
                    org_kde_kwin_fake_input::Request::TouchCancel => device.touch_cancel(time),
                    org_kde_kwin_fake_input::Request::TouchFrame => device.touch_frame(time),
                    org_kde_kwin_fake_input::Request::Destroy => None,
                    _ => None,
                };

                if let Some(event) = event {
                    fake_input.queue.push(event);
                }
            }
        }
    }

    fn destroyed(
        state: &mut D,
        _client: ClientId,
        _resource: &OrgKdeKwinFakeInput,
        data: &FakeInputUserData,
    ) {
        let fake_input = state.fake_input_state();
        data.device.device().mark_dead();
        fake_input.queue.push(InputEvent::DeviceRemoved {
            device: data.device.device().clone(),
            time: fake_input.clock.now().as_micros(),
        });
    }
}

/// Macro to delegate implementation of the fake input protocol
#[macro_export]
macro_rules! delegate_fake_input {
    ($(@<$( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+>)? $ty: ty) => {
        type __OrgKdeKwinFakeInput =
            $crate::reexports::wayland_protocols_plasma::fake_input::server::org_kde_kwin_fake_input::OrgKdeKwinFakeInput;

        $crate::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty:
            [
                __OrgKdeKwinFakeInput: ()
            ] => $crate::wayland::fake_input::FakeInputState
        );

        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty:
            [
                __OrgKdeKwinFakeInput: $crate::wayland::fake_input::FakeInputUserData
            ] => $crate::wayland::fake_input::FakeInputState
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_is_dropped_before_authentication() {
        let device = FakeDevice::new();
        assert!(device.pointer_motion(1, 1.0, 2.0).is_none());
        assert!(device.pointer_motion_absolute(2, 10.0, 10.0).is_none());
        assert!(device.button(3, 0x110, 1).is_none());
        assert!(device.axis(4, 0, 15.0).is_none());
        assert!(device.keyboard_key(5, 30, 1).is_none());
        assert!(device.touch_down(6, 0, 1.0, 1.0).is_none());
        assert!(device.touch_frame(7).is_none());
        // the rejected touch down left no state behind
        assert!(device.inner.touch_slots.lock().unwrap().is_empty());
    }

    #[test]
    fn authenticated_motion_is_delivered_with_pointer_capability() {
        let device = FakeDevice::new();
        device.set_authentication(true);

        let event = device.pointer_motion(1, 1.0, 2.0).expect("gate is open");
        let InputEvent::PointerMotion { event } = event else {
            panic!("expected a motion event");
        };
        assert_eq!(event.delta, (1.0, 2.0).into());
        assert!(event.device.is_pointer());
    }

    #[test]
    fn authentication_can_be_revoked() {
        let device = FakeDevice::new();
        device.set_authentication(true);
        assert!(device.pointer_motion(1, 1.0, 1.0).is_some());
        device.set_authentication(false);
        assert!(device.pointer_motion(2, 1.0, 1.0).is_none());
    }

    #[test]
    fn touch_id_lifecycle() {
        let device = FakeDevice::new();
        device.set_authentication(true);

        assert!(device.touch_down(1, 0, 100.0, 100.0).is_some());
        // duplicate down for an active id
        assert!(device.touch_down(2, 0, 50.0, 50.0).is_none());
        assert!(device.touch_motion(3, 0, 110.0, 110.0).is_some());
        // unknown id
        assert!(device.touch_motion(4, 1, 0.0, 0.0).is_none());
        assert!(device.touch_up(5, 0).is_some());
        assert!(device.touch_up(6, 1).is_none());
    }

    #[test]
    fn touch_cancel_clears_all_ids() {
        let device = FakeDevice::new();
        device.set_authentication(true);

        assert!(device.touch_down(1, 0, 1.0, 1.0).is_some());
        assert!(device.touch_down(2, 1, 2.0, 2.0).is_some());
        assert!(device.touch_cancel(3).is_some());
        // ids are free again
        assert!(device.touch_down(4, 0, 3.0, 3.0).is_some());
        assert!(device.touch_down(5, 1, 4.0, 4.0).is_some());
    }

    #[test]
    fn invalid_values_are_dropped() {
        let device = FakeDevice::new();
        device.set_authentication(true);

        assert!(device.axis(1, 2, 10.0).is_none());
        assert!(device.button(2, 0x110, 7).is_none());
        assert!(device.keyboard_key(3, 30, 2).is_none());
        // valid ones still pass
        assert!(device.axis(4, 1, 10.0).is_some());
        assert!(device.button(5, 0x110, 0).is_some());
    }
}
