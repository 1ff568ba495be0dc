//! Tablet tool identity.

/// Type of a tablet tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabletToolType {
    /// A generic pen
    Pen,
    /// Eraser
    Eraser,
    /// A paintbrush-like tool
    Brush,
    /// Physical drawing tool, e.g. Wacom Inking Pen
    Pencil,
    /// An airbrush-like tool
    Airbrush,
    /// A mouse bound to the tablet
    Mouse,
    /// A mouse tool with a lens
    Lens,
    /// A rotary device with positional and rotation data
    Totem,
    /// Tool of an unknown type
    Unknown,
}

bitflags::bitflags! {
    /// Additional axes a tablet tool can report
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TabletToolCapabilities: u32 {
        /// Tilt axes
        const TILT = 1;
        /// Pressure axis
        const PRESSURE = 2;
        /// Distance axis
        const DISTANCE = 4;
        /// Z-rotation axis
        const ROTATION = 16;
        /// Slider axis
        const SLIDER = 32;
        /// Wheel axis
        const WHEEL = 64;
    }
}

/// Identity of one physical tablet tool.
///
/// Stable across proximity cycles: the same stylus re-entering proximity of the same
/// tablet yields an equal descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TabletToolDescriptor {
    /// System name of the tablet device the tool was seen on
    pub device_sysname: String,
    /// Type of the tool
    pub tool_type: TabletToolType,
    /// Axes the tool reports
    pub capabilities: TabletToolCapabilities,
    /// Hardware serial of the tool, 0 if the hardware does not report one
    pub hardware_serial: u64,
    /// Hardware-specific tool id
    pub hardware_id: u64,
    /// Group key of the tablet device (shared with its pad sub-device)
    pub group: u64,
    /// Human readable name of the tablet device
    pub device_name: String,
}
