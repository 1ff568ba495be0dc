//! Typed input events.
//!
//! Every event carries the handle of its source device and a microsecond timestamp from
//! the monotonic clock. Timestamps are non-decreasing per device; across devices the
//! queue insertion order is authoritative.

use crate::input::device::DeviceHandle;
use crate::input::tablet::TabletToolDescriptor;
use crate::utils::{Logical, Normalized, Point};

/// State of a key on a keyboard. Either pressed or released
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum KeyState {
    /// Key is released
    Released,
    /// Key is pressed
    Pressed,
}

/// State of a button. Either pressed or released
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ButtonState {
    /// Button is released
    Released,
    /// Button is pressed
    Pressed,
}

/// Axis when scrolling
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Axis {
    /// Vertical axis
    Vertical,
    /// Horizontal axis
    Horizontal,
}

/// Source of an axis when scrolling
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AxisSource {
    /// Finger. Mostly used for trackpads.
    ///
    /// A scroll sequence from this source is terminated with a scroll value of 0, which
    /// a caller may use to trigger kinetic scrolling.
    Finger,
    /// Continuous scrolling device. Almost identical to [`Self::Finger`], but with no
    /// guaranteed terminating event.
    Continuous,
    /// Scroll wheel. Scrolling is in discrete steps and may additionally report a
    /// high-resolution value-120 measure.
    Wheel,
}

/// Switches known to the compositor
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Switch {
    /// The laptop lid
    Lid,
    /// Tablet-mode switch of a convertible
    TabletMode,
}

/// State of a switch
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SwitchState {
    /// Switch is off
    Off,
    /// Switch is on
    On,
}

/// A key press or release
#[derive(Debug, Clone)]
pub struct KeyboardKeyEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Code of the key, see `linux/input-event-codes.h`
    pub key_code: u32,
    /// State of the key
    pub state: KeyState,
}

/// Relative pointer motion
#[derive(Debug, Clone)]
pub struct PointerMotionEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Accelerated delta
    pub delta: Point<f64, Logical>,
    /// Delta as reported by the hardware, without pointer acceleration applied
    pub delta_unaccel: Point<f64, Logical>,
}

/// Absolute pointer motion, in device coordinates normalized to the unit square
#[derive(Debug, Clone)]
pub struct PointerMotionAbsoluteEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Position normalized to the unit square
    pub position: Point<f64, Normalized>,
}

/// A pointer button press or release
#[derive(Debug, Clone)]
pub struct PointerButtonEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Button code, see `linux/input-event-codes.h`
    pub button: u32,
    /// State of the button
    pub state: ButtonState,
}

/// A scroll event along one axis
#[derive(Debug, Clone)]
pub struct PointerAxisEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Axis of the scroll
    pub axis: Axis,
    /// Source of the scroll
    pub source: AxisSource,
    /// Scroll amount, with the device scroll factor applied
    pub value: f64,
    /// High-resolution value-120 measure, only reported by wheel sources
    pub value_v120: Option<f64>,
}

/// Start of a touch contact
#[derive(Debug, Clone)]
pub struct TouchDownEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Device-local slot of the contact
    pub slot: u32,
    /// Position normalized to the unit square
    pub position: Point<f64, Normalized>,
}

/// Movement of a touch contact
#[derive(Debug, Clone)]
pub struct TouchMotionEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Device-local slot of the contact
    pub slot: u32,
    /// Position normalized to the unit square
    pub position: Point<f64, Normalized>,
}

/// End of a touch contact
#[derive(Debug, Clone)]
pub struct TouchUpEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Device-local slot of the contact
    pub slot: u32,
}

/// Cancellation of all contacts of the device.
///
/// Previous events of the current contacts should be ignored.
#[derive(Debug, Clone)]
pub struct TouchCancelEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
}

/// End of a set of touchpoints at one device sample time
#[derive(Debug, Clone)]
pub struct TouchFrameEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
}

/// Start of a swipe gesture
#[derive(Debug, Clone)]
pub struct GestureSwipeBeginEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Number of fingers of the gesture
    pub fingers: u32,
}

/// Update of a swipe gesture
#[derive(Debug, Clone)]
pub struct GestureSwipeUpdateEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Relative motion of the gesture center
    pub delta: Point<f64, Logical>,
}

/// End of a swipe gesture
#[derive(Debug, Clone)]
pub struct GestureSwipeEndEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Whether the gesture was cancelled rather than finished
    pub cancelled: bool,
}

/// Start of a pinch gesture
#[derive(Debug, Clone)]
pub struct GesturePinchBeginEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Number of fingers of the gesture
    pub fingers: u32,
}

/// Update of a pinch gesture
#[derive(Debug, Clone)]
pub struct GesturePinchUpdateEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Relative motion of the gesture center
    pub delta: Point<f64, Logical>,
    /// Absolute scale compared to the begin event
    pub scale: f64,
    /// Angle delta in degrees, clockwise positive, relative to the previous event
    pub rotation: f64,
}

/// End of a pinch gesture
#[derive(Debug, Clone)]
pub struct GesturePinchEndEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Whether the gesture was cancelled rather than finished
    pub cancelled: bool,
}

/// Start of a hold gesture
#[derive(Debug, Clone)]
pub struct GestureHoldBeginEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Number of fingers of the gesture
    pub fingers: u32,
}

/// End of a hold gesture
#[derive(Debug, Clone)]
pub struct GestureHoldEndEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Whether the gesture was cancelled rather than finished
    pub cancelled: bool,
}

/// A switch changed state
#[derive(Debug, Clone)]
pub struct SwitchToggleEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// The switch that toggled
    pub switch: Switch,
    /// New state of the switch
    pub state: SwitchState,
}

/// Axis values of a tablet tool sample
#[derive(Debug, Clone, Copy, Default)]
pub struct TabletToolAxes {
    /// Pressure in the range 0.0 to 1.0
    pub pressure: f64,
    /// Distance above the tablet in the range 0.0 to 1.0
    pub distance: f64,
    /// Tilt along the x and y axes of the tablet, in degrees
    pub tilt: (f64, f64),
    /// Rotation in degrees, clockwise from the tool's neutral position
    pub rotation: f64,
    /// Slider position in the range -1.0 to 1.0
    pub slider: f64,
    /// Wheel delta in degrees
    pub wheel_delta: f64,
}

/// A tablet tool moved or changed one of its axes
#[derive(Debug, Clone)]
pub struct TabletToolAxisEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Identity of the tool
    pub tool: TabletToolDescriptor,
    /// Position normalized to the unit square
    pub position: Point<f64, Normalized>,
    /// Axis values of this sample
    pub axes: TabletToolAxes,
    /// Whether the tool is within detection range
    pub in_proximity: bool,
    /// Whether the tip is touching the surface
    pub tip_down: bool,
}

/// State of tool proximity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityState {
    /// Tool entered detection range
    In,
    /// Tool left detection range
    Out,
}

/// A tablet tool entered or left detection range
#[derive(Debug, Clone)]
pub struct TabletToolProximityEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Identity of the tool
    pub tool: TabletToolDescriptor,
    /// Position normalized to the unit square
    pub position: Point<f64, Normalized>,
    /// Axis values of this sample
    pub axes: TabletToolAxes,
    /// Whether the tool is within detection range
    pub in_proximity: bool,
    /// Whether the tip is touching the surface
    pub tip_down: bool,
    /// The proximity transition of this event
    pub state: ProximityState,
}

/// State of a tool tip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipState {
    /// Tip lifted off the surface
    Up,
    /// Tip touched the surface
    Down,
}

/// The tip of a tablet tool touched or left the surface
#[derive(Debug, Clone)]
pub struct TabletToolTipEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Identity of the tool
    pub tool: TabletToolDescriptor,
    /// Position normalized to the unit square
    pub position: Point<f64, Normalized>,
    /// Axis values of this sample
    pub axes: TabletToolAxes,
    /// Whether the tool is within detection range
    pub in_proximity: bool,
    /// Whether the tip is touching the surface
    pub tip_down: bool,
    /// The tip transition of this event
    pub state: TipState,
}

/// A button on a tablet tool was pressed or released
#[derive(Debug, Clone)]
pub struct TabletToolButtonEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Identity of the tool
    pub tool: TabletToolDescriptor,
    /// Button code
    pub button: u32,
    /// State of the button
    pub state: ButtonState,
}

/// A button on a tablet pad was pressed or released
#[derive(Debug, Clone)]
pub struct TabletPadButtonEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Index of the button on the pad
    pub button: u32,
    /// State of the button
    pub state: ButtonState,
}

/// Movement on a tablet pad ring
#[derive(Debug, Clone)]
pub struct TabletPadRingEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Index of the ring on the pad
    pub number: u32,
    /// Position in degrees, -1 when the interaction stopped
    pub position: f64,
    /// Whether the event was generated by a finger (as opposed to the ring itself)
    pub finger: bool,
}

/// Movement on a tablet pad strip
#[derive(Debug, Clone)]
pub struct TabletPadStripEvent {
    /// Source device
    pub device: DeviceHandle,
    /// Timestamp in microseconds
    pub time: u64,
    /// Index of the strip on the pad
    pub number: u32,
    /// Position in the range 0.0 to 1.0, -1 when the interaction stopped
    pub position: f64,
    /// Whether the event was generated by a finger (as opposed to the strip itself)
    pub finger: bool,
}

/// Different events that can be generated by an input source
#[derive(Debug, Clone)]
pub enum InputEvent {
    /// A new device has been added
    DeviceAdded {
        /// The added device
        device: DeviceHandle,
        /// Timestamp in microseconds
        time: u64,
    },
    /// A device has been removed
    DeviceRemoved {
        /// The removed device
        device: DeviceHandle,
        /// Timestamp in microseconds
        time: u64,
    },
    /// A keyboard event occurred
    Keyboard {
        /// The keyboard event
        event: KeyboardKeyEvent,
    },
    /// A relative pointer motion occurred
    PointerMotion {
        /// The pointer motion event
        event: PointerMotionEvent,
    },
    /// An absolute pointer motion occurred
    PointerMotionAbsolute {
        /// The absolute pointer motion event
        event: PointerMotionAbsoluteEvent,
    },
    /// A pointer button was pressed or released
    PointerButton {
        /// The pointer button event
        event: PointerButtonEvent,
    },
    /// A pointer axis was scrolled
    PointerAxis {
        /// The pointer axis event
        event: PointerAxisEvent,
    },
    /// A new touchpoint appeared
    TouchDown {
        /// The touch down event
        event: TouchDownEvent,
    },
    /// A touchpoint moved
    TouchMotion {
        /// The touch motion event
        event: TouchMotionEvent,
    },
    /// A touchpoint disappeared
    TouchUp {
        /// The touch up event
        event: TouchUpEvent,
    },
    /// All touchpoints of the device were cancelled
    TouchCancel {
        /// The touch cancel event
        event: TouchCancelEvent,
    },
    /// A set of touchpoints was committed
    TouchFrame {
        /// The touch frame event
        event: TouchFrameEvent,
    },
    /// A swipe gesture began
    GestureSwipeBegin {
        /// The gesture event
        event: GestureSwipeBeginEvent,
    },
    /// A swipe gesture was updated
    GestureSwipeUpdate {
        /// The gesture event
        event: GestureSwipeUpdateEvent,
    },
    /// A swipe gesture ended
    GestureSwipeEnd {
        /// The gesture event
        event: GestureSwipeEndEvent,
    },
    /// A pinch gesture began
    GesturePinchBegin {
        /// The gesture event
        event: GesturePinchBeginEvent,
    },
    /// A pinch gesture was updated
    GesturePinchUpdate {
        /// The gesture event
        event: GesturePinchUpdateEvent,
    },
    /// A pinch gesture ended
    GesturePinchEnd {
        /// The gesture event
        event: GesturePinchEndEvent,
    },
    /// A hold gesture began
    GestureHoldBegin {
        /// The gesture event
        event: GestureHoldBeginEvent,
    },
    /// A hold gesture ended
    GestureHoldEnd {
        /// The gesture event
        event: GestureHoldEndEvent,
    },
    /// A switch changed state
    SwitchToggle {
        /// The switch toggle event
        event: SwitchToggleEvent,
    },
    /// A tablet tool axis changed
    TabletToolAxis {
        /// The tablet tool event
        event: TabletToolAxisEvent,
    },
    /// A tablet tool entered or left detection range
    TabletToolProximity {
        /// The tablet tool event
        event: TabletToolProximityEvent,
    },
    /// The tip of a tablet tool touched or left the surface
    TabletToolTip {
        /// The tablet tool event
        event: TabletToolTipEvent,
    },
    /// A tablet tool button was pressed or released
    TabletToolButton {
        /// The tablet tool event
        event: TabletToolButtonEvent,
    },
    /// A tablet pad button was pressed or released
    TabletPadButton {
        /// The tablet pad event
        event: TabletPadButtonEvent,
    },
    /// A tablet pad ring moved
    TabletPadRing {
        /// The tablet pad event
        event: TabletPadRingEvent,
    },
    /// A tablet pad strip moved
    TabletPadStrip {
        /// The tablet pad event
        event: TabletPadStripEvent,
    },
}

impl InputEvent {
    /// The device this event originates from
    pub fn device(&self) -> &DeviceHandle {
        match self {
            InputEvent::DeviceAdded { device, .. } => device,
            InputEvent::DeviceRemoved { device, .. } => device,
            InputEvent::Keyboard { event } => &event.device,
            InputEvent::PointerMotion { event } => &event.device,
            InputEvent::PointerMotionAbsolute { event } => &event.device,
            InputEvent::PointerButton { event } => &event.device,
            InputEvent::PointerAxis { event } => &event.device,
            InputEvent::TouchDown { event } => &event.device,
            InputEvent::TouchMotion { event } => &event.device,
            InputEvent::TouchUp { event } => &event.device,
            InputEvent::TouchCancel { event } => &event.device,
            InputEvent::TouchFrame { event } => &event.device,
            InputEvent::GestureSwipeBegin { event } => &event.device,
            InputEvent::GestureSwipeUpdate { event } => &event.device,
            InputEvent::GestureSwipeEnd { event } => &event.device,
            InputEvent::GesturePinchBegin { event } => &event.device,
            InputEvent::GesturePinchUpdate { event } => &event.device,
            InputEvent::GesturePinchEnd { event } => &event.device,
            InputEvent::GestureHoldBegin { event } => &event.device,
            InputEvent::GestureHoldEnd { event } => &event.device,
            InputEvent::SwitchToggle { event } => &event.device,
            InputEvent::TabletToolAxis { event } => &event.device,
            InputEvent::TabletToolProximity { event } => &event.device,
            InputEvent::TabletToolTip { event } => &event.device,
            InputEvent::TabletToolButton { event } => &event.device,
            InputEvent::TabletPadButton { event } => &event.device,
            InputEvent::TabletPadRing { event } => &event.device,
            InputEvent::TabletPadStrip { event } => &event.device,
        }
    }

    /// The timestamp of this event in microseconds
    pub fn time(&self) -> u64 {
        match self {
            InputEvent::DeviceAdded { time, .. } => *time,
            InputEvent::DeviceRemoved { time, .. } => *time,
            InputEvent::Keyboard { event } => event.time,
            InputEvent::PointerMotion { event } => event.time,
            InputEvent::PointerMotionAbsolute { event } => event.time,
            InputEvent::PointerButton { event } => event.time,
            InputEvent::PointerAxis { event } => event.time,
            InputEvent::TouchDown { event } => event.time,
            InputEvent::TouchMotion { event } => event.time,
            InputEvent::TouchUp { event } => event.time,
            InputEvent::TouchCancel { event } => event.time,
            InputEvent::TouchFrame { event } => event.time,
            InputEvent::GestureSwipeBegin { event } => event.time,
            InputEvent::GestureSwipeUpdate { event } => event.time,
            InputEvent::GestureSwipeEnd { event } => event.time,
            InputEvent::GesturePinchBegin { event } => event.time,
            InputEvent::GesturePinchUpdate { event } => event.time,
            InputEvent::GesturePinchEnd { event } => event.time,
            InputEvent::GestureHoldBegin { event } => event.time,
            InputEvent::GestureHoldEnd { event } => event.time,
            InputEvent::SwitchToggle { event } => event.time,
            InputEvent::TabletToolAxis { event } => event.time,
            InputEvent::TabletToolProximity { event } => event.time,
            InputEvent::TabletToolTip { event } => event.time,
            InputEvent::TabletToolButton { event } => event.time,
            InputEvent::TabletPadButton { event } => event.time,
            InputEvent::TabletPadRing { event } => event.time,
            InputEvent::TabletPadStrip { event } => event.time,
        }
    }
}
