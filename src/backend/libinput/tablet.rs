//! Tablet tool translation helpers.

use input::event::tablet_tool::{self, TabletToolEventTrait};

use crate::input::device::DeviceHandle;
use crate::input::event::TabletToolAxes;
use crate::input::tablet::{TabletToolCapabilities, TabletToolDescriptor, TabletToolType};

pub(super) fn descriptor(device: &DeviceHandle, tool: &tablet_tool::TabletTool) -> TabletToolDescriptor {
    let tool_type = match tool.tool_type() {
        Some(tablet_tool::TabletToolType::Pen) => TabletToolType::Pen,
        Some(tablet_tool::TabletToolType::Eraser) => TabletToolType::Eraser,
        Some(tablet_tool::TabletToolType::Brush) => TabletToolType::Brush,
        Some(tablet_tool::TabletToolType::Pencil) => TabletToolType::Pencil,
        Some(tablet_tool::TabletToolType::Airbrush) => TabletToolType::Airbrush,
        Some(tablet_tool::TabletToolType::Mouse) => TabletToolType::Mouse,
        Some(tablet_tool::TabletToolType::Lens) => TabletToolType::Lens,
        Some(tablet_tool::TabletToolType::Totem) => TabletToolType::Totem,
        _ => TabletToolType::Unknown,
    };

    let mut capabilities = TabletToolCapabilities::empty();
    capabilities.set(TabletToolCapabilities::TILT, tool.has_tilt());
    capabilities.set(TabletToolCapabilities::PRESSURE, tool.has_pressure());
    capabilities.set(TabletToolCapabilities::DISTANCE, tool.has_distance());
    capabilities.set(TabletToolCapabilities::ROTATION, tool.has_rotation());
    capabilities.set(TabletToolCapabilities::SLIDER, tool.has_slider());
    capabilities.set(TabletToolCapabilities::WHEEL, tool.has_wheel());

    TabletToolDescriptor {
        device_sysname: device.sysname().to_owned(),
        tool_type,
        capabilities,
        hardware_serial: tool.serial(),
        hardware_id: tool.tool_id(),
        group: device.group(),
        device_name: device.name().to_owned(),
    }
}

pub(super) fn axes<E: TabletToolEventTrait>(event: &E) -> TabletToolAxes {
    TabletToolAxes {
        pressure: event.pressure(),
        distance: event.distance(),
        tilt: (event.tilt_x(), event.tilt_y()),
        rotation: event.rotation(),
        slider: event.slider_position(),
        wheel_delta: event.wheel_delta(),
    }
}
