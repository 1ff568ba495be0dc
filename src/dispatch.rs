//! The single entry point of the input stream into the compositor.
//!
//! The [`InputDispatcher`] drains the [`EventQueue`] on the compositor thread, in
//! arrival order, and per event: drops events whose source device is gone, validates
//! the touch-slot lifecycle, resolves device coordinates through the
//! [`OutputBinder`](crate::output::OutputBinder), stamps an activity notification for
//! the idle machinery and hands the result to the [`InputHandler`]. Synthetic events
//! share the queue with real ones; there is no separate ordering discipline.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::input::device::DeviceHandle;
use crate::input::event::{
    GestureHoldBeginEvent, GestureHoldEndEvent, GesturePinchBeginEvent, GesturePinchEndEvent,
    GesturePinchUpdateEvent, GestureSwipeBeginEvent, GestureSwipeEndEvent, GestureSwipeUpdateEvent,
    InputEvent, KeyboardKeyEvent, PointerAxisEvent, PointerButtonEvent, PointerMotionEvent,
    ProximityState, SwitchToggleEvent, TabletPadButtonEvent, TabletPadRingEvent,
    TabletPadStripEvent, TabletToolAxes, TabletToolButtonEvent, TipState, TouchCancelEvent,
    TouchFrameEvent, TouchUpEvent,
};
use crate::input::queue::EventQueue;
use crate::input::tablet::TabletToolDescriptor;
use crate::input::touch::TouchTracker;
use crate::output::{Output, OutputBinder};
use crate::utils::{Logical, Point};

/// An absolute position event resolved to the global space
#[derive(Debug, Clone)]
pub struct AbsolutePositionEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Position in the global space
    pub position: Point<f64, Logical>,
}

/// A touch down or motion resolved to the global space
#[derive(Debug, Clone)]
pub struct TouchPositionEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Device-local slot of the contact
    pub slot: u32,
    /// Position in the global space
    pub position: Point<f64, Logical>,
}

/// What a tablet tool sample reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabletToolEventKind {
    /// An axis changed while in proximity
    Axis,
    /// The tool entered or left detection range
    Proximity(ProximityState),
    /// The tip touched or left the surface
    Tip(TipState),
}

/// A tablet tool sample resolved to the global space
#[derive(Debug, Clone)]
pub struct TabletToolEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Identity of the tool
    pub tool: TabletToolDescriptor,
    /// What this sample reports
    pub kind: TabletToolEventKind,
    /// Position in the global space
    pub position: Point<f64, Logical>,
    /// Axis values of this sample
    pub axes: TabletToolAxes,
    /// Whether the tool is within detection range
    pub in_proximity: bool,
    /// Whether the tip is touching the surface
    pub tip_down: bool,
}

/// An event as delivered to the compositor, with all coordinates in the global space
#[derive(Debug, Clone)]
pub enum DispatchedEvent {
    /// A key press or release
    Keyboard(KeyboardKeyEvent),
    /// Relative pointer motion, possibly coalesced from several queued events
    PointerMotion(PointerMotionEvent),
    /// Absolute pointer motion mapped to the combined screen space
    PointerMotionAbsolute(AbsolutePositionEvent),
    /// A pointer button press or release
    PointerButton(PointerButtonEvent),
    /// A scroll along one axis
    PointerAxis(PointerAxisEvent),
    /// A new touch contact
    TouchDown(TouchPositionEvent),
    /// Movement of a touch contact
    TouchMotion(TouchPositionEvent),
    /// End of a touch contact
    TouchUp(TouchUpEvent),
    /// Cancellation of all contacts of a device
    TouchCancel(TouchCancelEvent),
    /// A set of touchpoints was committed
    TouchFrame(TouchFrameEvent),
    /// A swipe gesture began
    GestureSwipeBegin(GestureSwipeBeginEvent),
    /// A swipe gesture was updated
    GestureSwipeUpdate(GestureSwipeUpdateEvent),
    /// A swipe gesture ended
    GestureSwipeEnd(GestureSwipeEndEvent),
    /// A pinch gesture began
    GesturePinchBegin(GesturePinchBeginEvent),
    /// A pinch gesture was updated
    GesturePinchUpdate(GesturePinchUpdateEvent),
    /// A pinch gesture ended
    GesturePinchEnd(GesturePinchEndEvent),
    /// A hold gesture began
    GestureHoldBegin(GestureHoldBeginEvent),
    /// A hold gesture ended
    GestureHoldEnd(GestureHoldEndEvent),
    /// A switch changed state
    SwitchToggle(SwitchToggleEvent),
    /// A tablet tool moved, changed proximity or tip state
    TabletTool(TabletToolEvent),
    /// A tablet tool button was pressed or released
    TabletToolButton(TabletToolButtonEvent),
    /// A tablet pad button was pressed or released
    TabletPadButton(TabletPadButtonEvent),
    /// A tablet pad ring moved
    TabletPadRing(TabletPadRingEvent),
    /// A tablet pad strip moved
    TabletPadStrip(TabletPadStripEvent),
}

/// Implement to receive the dispatched input stream
pub trait InputHandler {
    /// A new device was registered
    fn device_added(&mut self, device: &DeviceHandle) {
        let _ = device;
    }

    /// A device was removed; its record is dead after this returns
    fn device_removed(&mut self, device: &DeviceHandle) {
        let _ = device;
    }

    /// User activity occurred.
    ///
    /// Called once per dispatched event, except for tablet proximity changes. Feed this
    /// into the idle machinery.
    fn activity(&mut self) {}

    /// An input event, in queue order
    fn input_event(&mut self, event: DispatchedEvent);
}

/// Drains the event queue and routes events into the compositor.
///
/// All state the dispatcher touches is owned by the compositor thread; context is passed
/// in explicitly rather than reached through globals.
#[derive(Debug)]
pub struct InputDispatcher {
    queue: Arc<EventQueue>,
    binder: OutputBinder,
    touch: TouchTracker,
}

impl InputDispatcher {
    /// Create a dispatcher draining the given queue
    pub fn new(queue: Arc<EventQueue>) -> Self {
        InputDispatcher {
            queue,
            binder: OutputBinder::new(),
            touch: TouchTracker::new(),
        }
    }

    /// Inform the dispatcher about the current set of outputs.
    ///
    /// Re-runs the output assignment of every touch and tablet device.
    pub fn outputs_changed(&mut self, outputs: &[Output]) {
        self.binder.set_outputs(outputs);
    }

    /// Re-run the output assignment of one device, e.g. after its preferred output name
    /// was reconfigured
    pub fn refresh_device(&mut self, device: &DeviceHandle) {
        self.binder.assign(device);
    }

    /// The output binder used for coordinate resolution
    pub fn binder(&self) -> &OutputBinder {
        &self.binder
    }

    /// Drain the queue until it is empty, feeding `handler`.
    ///
    /// Call this from the wake source callback of the queue.
    #[profiling::function]
    pub fn dispatch<H: InputHandler>(&mut self, handler: &mut H) {
        let queue = self.queue.clone();
        queue.dispatch(|event| self.process(event, handler));
    }

    fn process<H: InputHandler>(&mut self, event: InputEvent, handler: &mut H) {
        match &event {
            InputEvent::DeviceAdded { device, .. } => {
                self.binder.register_device(device);
                handler.device_added(device);
                return;
            }
            InputEvent::DeviceRemoved { device, .. } => {
                self.binder.unregister_device(device);
                self.touch.remove_device(device);
                handler.device_removed(device);
                device.mark_dead();
                return;
            }
            event => {
                // the device was destroyed while this event sat in the queue
                if !event.device().is_alive() {
                    trace!("Dropping event of dead device {:?}", event.device().name());
                    return;
                }
            }
        }

        let activity = !matches!(&event, InputEvent::TabletToolProximity { .. });

        let dispatched = match event {
            InputEvent::DeviceAdded { .. } | InputEvent::DeviceRemoved { .. } => unreachable!(),
            InputEvent::Keyboard { event } => Some(DispatchedEvent::Keyboard(event)),
            InputEvent::PointerMotion { event } => Some(DispatchedEvent::PointerMotion(event)),
            InputEvent::PointerMotionAbsolute { event } => {
                // virtual devices report compositor-space positions directly
                let position = if event.device.is_virtual() {
                    retype(event.position)
                } else {
                    self.binder.map_to_screen(event.position)
                };
                Some(DispatchedEvent::PointerMotionAbsolute(AbsolutePositionEvent {
                    position,
                    device: event.device,
                    time: event.time,
                }))
            }
            InputEvent::PointerButton { event } => Some(DispatchedEvent::PointerButton(event)),
            InputEvent::PointerAxis { event } => Some(DispatchedEvent::PointerAxis(event)),
            InputEvent::TouchDown { event } => {
                let position = if event.device.is_virtual() {
                    Some(retype(event.position))
                } else {
                    self.binder.map_to_output(&event.device, event.position)
                };
                match position {
                    Some(position) if self.touch.down(&event.device, event.slot, position) => {
                        Some(DispatchedEvent::TouchDown(TouchPositionEvent {
                            device: event.device,
                            time: event.time,
                            slot: event.slot,
                            position,
                        }))
                    }
                    Some(_) => {
                        trace!(slot = event.slot, "Duplicate touch down, dropping");
                        None
                    }
                    None => {
                        debug!(
                            device = event.device.name(),
                            "Touch event without an output, dropping"
                        );
                        None
                    }
                }
            }
            InputEvent::TouchMotion { event } => {
                let position = if event.device.is_virtual() {
                    Some(retype(event.position))
                } else {
                    self.binder.map_to_output(&event.device, event.position)
                };
                match position {
                    Some(position) if self.touch.motion(&event.device, event.slot, position) => {
                        Some(DispatchedEvent::TouchMotion(TouchPositionEvent {
                            device: event.device,
                            time: event.time,
                            slot: event.slot,
                            position,
                        }))
                    }
                    Some(_) => {
                        trace!(slot = event.slot, "Touch motion for an unknown slot, dropping");
                        None
                    }
                    None => {
                        debug!(
                            device = event.device.name(),
                            "Touch event without an output, dropping"
                        );
                        None
                    }
                }
            }
            InputEvent::TouchUp { event } => {
                if self.touch.up(&event.device, event.slot) {
                    Some(DispatchedEvent::TouchUp(event))
                } else {
                    trace!(slot = event.slot, "Touch up for an unknown slot, dropping");
                    None
                }
            }
            InputEvent::TouchCancel { event } => {
                self.touch.cancel(&event.device);
                Some(DispatchedEvent::TouchCancel(event))
            }
            InputEvent::TouchFrame { event } => Some(DispatchedEvent::TouchFrame(event)),
            InputEvent::GestureSwipeBegin { event } => {
                Some(DispatchedEvent::GestureSwipeBegin(event))
            }
            InputEvent::GestureSwipeUpdate { event } => {
                Some(DispatchedEvent::GestureSwipeUpdate(event))
            }
            InputEvent::GestureSwipeEnd { event } => Some(DispatchedEvent::GestureSwipeEnd(event)),
            InputEvent::GesturePinchBegin { event } => {
                Some(DispatchedEvent::GesturePinchBegin(event))
            }
            InputEvent::GesturePinchUpdate { event } => {
                Some(DispatchedEvent::GesturePinchUpdate(event))
            }
            InputEvent::GesturePinchEnd { event } => Some(DispatchedEvent::GesturePinchEnd(event)),
            InputEvent::GestureHoldBegin { event } => Some(DispatchedEvent::GestureHoldBegin(event)),
            InputEvent::GestureHoldEnd { event } => Some(DispatchedEvent::GestureHoldEnd(event)),
            InputEvent::SwitchToggle { event } => Some(DispatchedEvent::SwitchToggle(event)),
            InputEvent::TabletToolAxis { event } => self
                .map_tablet(
                    event.device,
                    event.time,
                    event.tool,
                    TabletToolEventKind::Axis,
                    event.position,
                    event.axes,
                    event.in_proximity,
                    event.tip_down,
                )
                .map(DispatchedEvent::TabletTool),
            InputEvent::TabletToolProximity { event } => self
                .map_tablet(
                    event.device,
                    event.time,
                    event.tool,
                    TabletToolEventKind::Proximity(event.state),
                    event.position,
                    event.axes,
                    event.in_proximity,
                    event.tip_down,
                )
                .map(DispatchedEvent::TabletTool),
            InputEvent::TabletToolTip { event } => self
                .map_tablet(
                    event.device,
                    event.time,
                    event.tool,
                    TabletToolEventKind::Tip(event.state),
                    event.position,
                    event.axes,
                    event.in_proximity,
                    event.tip_down,
                )
                .map(DispatchedEvent::TabletTool),
            InputEvent::TabletToolButton { event } => Some(DispatchedEvent::TabletToolButton(event)),
            InputEvent::TabletPadButton { event } => Some(DispatchedEvent::TabletPadButton(event)),
            InputEvent::TabletPadRing { event } => Some(DispatchedEvent::TabletPadRing(event)),
            InputEvent::TabletPadStrip { event } => Some(DispatchedEvent::TabletPadStrip(event)),
        };

        if let Some(dispatched) = dispatched {
            if activity {
                handler.activity();
            }
            handler.input_event(dispatched);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn map_tablet(
        &mut self,
        device: DeviceHandle,
        time: u64,
        tool: TabletToolDescriptor,
        kind: TabletToolEventKind,
        position: Point<f64, crate::utils::Normalized>,
        axes: TabletToolAxes,
        in_proximity: bool,
        tip_down: bool,
    ) -> Option<TabletToolEvent> {
        match self.binder.map_to_output(&device, position) {
            Some(position) => Some(TabletToolEvent {
                device,
                time,
                tool,
                kind,
                position,
                axes,
                in_proximity,
                tip_down,
            }),
            None => {
                debug!(device = device.name(), "Tablet event without an output, dropping");
                None
            }
        }
    }
}

fn retype<Kind, Other>(point: Point<f64, Kind>) -> Point<f64, Other> {
    (point.x, point.y).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::device::{DeviceCapabilities, InputDevice};
    use crate::input::event::{KeyState, TouchDownEvent, TouchMotionEvent};
    use crate::output::{Mode, PhysicalProperties};

    #[derive(Default)]
    struct Collect {
        events: Vec<DispatchedEvent>,
        added: usize,
        removed: usize,
        activity: usize,
    }

    impl InputHandler for Collect {
        fn device_added(&mut self, _: &DeviceHandle) {
            self.added += 1;
        }

        fn device_removed(&mut self, _: &DeviceHandle) {
            self.removed += 1;
        }

        fn activity(&mut self) {
            self.activity += 1;
        }

        fn input_event(&mut self, event: DispatchedEvent) {
            self.events.push(event);
        }
    }

    fn output() -> Output {
        let output = Output::new(
            "eDP-1".into(),
            PhysicalProperties {
                size: (310, 170).into(),
                internal: true,
                make: "Screens Inc".into(),
                model: "Monitor Ultra".into(),
            },
        );
        output.change_current_state(
            Some(Mode {
                size: (1000, 1000).into(),
                refresh: 60_000,
            }),
            None,
            None,
            None,
        );
        output
    }

    fn touch_device() -> DeviceHandle {
        InputDevice::new(
            "event7",
            "test touch",
            (0x1234, 0x5678),
            DeviceCapabilities {
                touch: true,
                ..Default::default()
            },
            Some((310.0, 170.0).into()),
        )
    }

    fn down(device: &DeviceHandle, time: u64, slot: u32, x: f64, y: f64) -> InputEvent {
        InputEvent::TouchDown {
            event: TouchDownEvent {
                device: device.clone(),
                time,
                slot,
                position: (x, y).into(),
            },
        }
    }

    fn motion(device: &DeviceHandle, time: u64, slot: u32, x: f64, y: f64) -> InputEvent {
        InputEvent::TouchMotion {
            event: TouchMotionEvent {
                device: device.clone(),
                time,
                slot,
                position: (x, y).into(),
            },
        }
    }

    fn up(device: &DeviceHandle, time: u64, slot: u32) -> InputEvent {
        InputEvent::TouchUp {
            event: crate::input::event::TouchUpEvent {
                device: device.clone(),
                time,
                slot,
            },
        }
    }

    #[test]
    fn touch_lifecycle_filtering() {
        let (queue, _source) = EventQueue::new().unwrap();
        let mut dispatcher = InputDispatcher::new(queue.clone());
        dispatcher.outputs_changed(&[output()]);

        let device = touch_device();
        let time = crate::utils::clock::Clock::<crate::utils::Monotonic>::new()
            .now()
            .as_micros();
        queue.push(InputEvent::DeviceAdded {
            device: device.clone(),
            time,
        });
        queue.extend([
            down(&device, 1, 0, 0.1, 0.1),
            down(&device, 2, 0, 0.05, 0.05),
            motion(&device, 3, 0, 0.11, 0.11),
            motion(&device, 4, 1, 0.0, 0.0),
            up(&device, 5, 0),
            up(&device, 6, 1),
        ]);

        let mut collect = Collect::default();
        dispatcher.dispatch(&mut collect);

        assert_eq!(collect.added, 1);
        assert_eq!(collect.events.len(), 3);
        assert!(matches!(
            &collect.events[0],
            DispatchedEvent::TouchDown(event) if event.slot == 0 && event.position == (100.0, 100.0).into()
        ));
        assert!(matches!(
            &collect.events[1],
            DispatchedEvent::TouchMotion(event) if event.slot == 0 && event.position == (110.0, 110.0).into()
        ));
        assert!(matches!(
            &collect.events[2],
            DispatchedEvent::TouchUp(event) if event.slot == 0
        ));
    }

    #[test]
    fn events_of_dead_devices_are_dropped() {
        let (queue, _source) = EventQueue::new().unwrap();
        let mut dispatcher = InputDispatcher::new(queue.clone());
        dispatcher.outputs_changed(&[output()]);

        let device = touch_device();
        queue.push(InputEvent::DeviceAdded {
            device: device.clone(),
            time: 0,
        });
        queue.push(InputEvent::DeviceRemoved {
            device: device.clone(),
            time: 1,
        });
        // queued after the removal, e.g. from a fake-input client racing its disconnect
        queue.push(down(&device, 2, 0, 0.5, 0.5));

        let mut collect = Collect::default();
        dispatcher.dispatch(&mut collect);

        assert_eq!(collect.added, 1);
        assert_eq!(collect.removed, 1);
        assert!(collect.events.is_empty());
        assert!(!device.is_alive());
    }

    #[test]
    fn touch_without_output_is_dropped() {
        let (queue, _source) = EventQueue::new().unwrap();
        let mut dispatcher = InputDispatcher::new(queue.clone());
        // no outputs at all

        let device = touch_device();
        queue.push(InputEvent::DeviceAdded {
            device: device.clone(),
            time: 0,
        });
        queue.push(down(&device, 1, 0, 0.5, 0.5));

        let mut collect = Collect::default();
        dispatcher.dispatch(&mut collect);
        assert!(collect.events.is_empty());
    }

    #[test]
    fn virtual_touch_positions_are_compositor_space() {
        let (queue, _source) = EventQueue::new().unwrap();
        let mut dispatcher = InputDispatcher::new(queue.clone());
        // deliberately no outputs: virtual devices do not need one

        let device = InputDevice::new_virtual(
            "virtual input device",
            DeviceCapabilities {
                touch: true,
                ..Default::default()
            },
        );
        queue.push(down(&device, 1, 0, 123.0, 45.0));

        let mut collect = Collect::default();
        dispatcher.dispatch(&mut collect);

        assert_eq!(collect.events.len(), 1);
        assert!(matches!(
            &collect.events[0],
            DispatchedEvent::TouchDown(event) if event.position == (123.0, 45.0).into()
        ));
    }

    #[test]
    fn activity_ticks_for_keys_but_not_proximity() {
        let (queue, _source) = EventQueue::new().unwrap();
        let mut dispatcher = InputDispatcher::new(queue.clone());
        dispatcher.outputs_changed(&[output()]);

        let keyboard = InputDevice::new_virtual(
            "test keyboard",
            DeviceCapabilities {
                keyboard: true,
                ..Default::default()
            },
        );
        queue.push(InputEvent::Keyboard {
            event: KeyboardKeyEvent {
                device: keyboard.clone(),
                time: 1,
                key_code: 30,
                state: KeyState::Pressed,
            },
        });

        let mut collect = Collect::default();
        dispatcher.dispatch(&mut collect);
        assert_eq!(collect.activity, 1);
        assert_eq!(collect.events.len(), 1);
    }
}
