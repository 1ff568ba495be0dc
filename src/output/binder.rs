//! Assignment of absolute-coordinate devices to outputs.
//!
//! Touch screens and tablets report coordinates in their own device space; before such an
//! event makes sense to the compositor it needs an output to land on. The binder keeps
//! that assignment up to date and performs the coordinate mapping.

use tracing::{debug, trace};

use crate::input::device::DeviceHandle;
use crate::output::Output;
use crate::utils::{Logical, Normalized, Point, Rectangle};

/// Assigns touch and tablet devices to outputs and maps their coordinates.
///
/// The binder holds plain handles; it owns neither the devices nor the outputs.
#[derive(Debug, Default)]
pub struct OutputBinder {
    outputs: Vec<Output>,
    devices: Vec<DeviceHandle>,
}

impl OutputBinder {
    /// Create a binder without outputs
    pub fn new() -> Self {
        Default::default()
    }

    /// Replace the set of outputs and recompute every device assignment
    pub fn set_outputs(&mut self, outputs: &[Output]) {
        self.outputs = outputs.to_vec();
        for device in self.devices.clone() {
            self.assign(&device);
        }
    }

    /// The outputs currently known to the binder
    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// Start tracking a device and assign it an output if it needs one
    pub fn register_device(&mut self, device: &DeviceHandle) {
        if !(device.is_touch() || device.is_tablet_tool()) {
            return;
        }
        self.devices.push(device.clone());
        self.assign(device);
    }

    /// Stop tracking a removed device
    pub fn unregister_device(&mut self, device: &DeviceHandle) {
        self.devices.retain(|other| !std::sync::Arc::ptr_eq(other, device));
    }

    /// Recompute the assignment of a single device, e.g. after its preferred output
    /// name changed
    pub fn assign(&self, device: &DeviceHandle) {
        let selected = self.select(device);
        match &selected {
            Some(output) => debug!(
                device = device.name(),
                output = output.name(),
                "Assigning device to output"
            ),
            None => debug!(device = device.name(), "No output for device"),
        }
        device.set_output(selected.as_ref());
    }

    /// The output selection heuristic.
    ///
    /// Explicit name match first, then size heuristics preferring the internal panel,
    /// then the internal panel outright, then the first enabled output.
    fn select(&self, device: &DeviceHandle) -> Option<Output> {
        let enabled: Vec<&Output> = self.outputs.iter().filter(|o| o.is_enabled()).collect();

        if let Some(name) = device.output_name() {
            if let Some(output) = enabled.iter().find(|o| o.name() == name) {
                return Some((*output).clone());
            }
        }

        let internal = enabled.iter().find(|o| o.is_internal());
        let matches_device_size = |output: &Output| -> bool {
            let Some(size) = device.physical_size() else {
                return false;
            };
            let screen = output.physical_size();
            size.w.round() as i32 == screen.w && size.h.round() as i32 == screen.h
        };

        if device.is_touch() {
            if let Some(output) = internal.filter(|o| matches_device_size(o)) {
                return Some((*output).clone());
            }
        }
        if let Some(output) = enabled.iter().find(|o| matches_device_size(o)) {
            return Some((*output).clone());
        }
        if let Some(output) = internal {
            return Some((*output).clone());
        }
        enabled.first().map(|output| (*output).clone())
    }

    /// Map a device-local position (normalized to the unit square) of the given device
    /// into the global space.
    ///
    /// Returns `None` when the device has no resolvable output (the event must be
    /// dropped) or the output has no mode yet.
    pub fn map_to_output(
        &self,
        device: &DeviceHandle,
        position: Point<f64, Normalized>,
    ) -> Option<Point<f64, Logical>> {
        let output = device.output().filter(Output::is_enabled)?;
        let mode = output.current_mode()?;

        let position = match device.output_area() {
            Some(area) => Point::from((
                area.loc.x + position.x * area.size.w,
                area.loc.y + position.y * area.size.h,
            )),
            None => position,
        };

        let mode_size = mode.size.to_f64();
        let device_point = Point::from((position.x * mode_size.w, position.y * mode_size.h));
        let transformed = output.transform().transform_point_in(device_point, &mode_size);
        let global = output.location().to_f64() + retype(transformed.downscale(output.scale()));
        trace!(
            device = device.name(),
            x = global.x,
            y = global.y,
            "Mapped device position"
        );
        Some(global)
    }

    /// Map a position normalized to the combined extents of all enabled outputs (used
    /// for absolute pointer motion) into the global space
    pub fn map_to_screen(&self, position: Point<f64, Normalized>) -> Point<f64, Logical> {
        let extents = self.global_extents();
        let size = extents.size.to_f64();
        extents.loc.to_f64() + Point::from((position.x * size.w, position.y * size.h))
    }

    /// Bounding box of all enabled outputs in the global space
    pub fn global_extents(&self) -> Rectangle<i32, Logical> {
        self.outputs
            .iter()
            .filter(|output| output.is_enabled())
            .map(Output::geometry)
            .reduce(Rectangle::merge)
            .unwrap_or_default()
    }
}

fn retype<Kind, Other>(point: Point<f64, Kind>) -> Point<f64, Other> {
    (point.x, point.y).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::device::{DeviceCapabilities, InputDevice};
    use crate::output::{Mode, PhysicalProperties};
    use crate::utils::{Size, Transform};

    fn output(name: &str, size_mm: (i32, i32), internal: bool) -> Output {
        let output = Output::new(
            name.into(),
            PhysicalProperties {
                size: size_mm.into(),
                internal,
                make: "Screens Inc".into(),
                model: "Monitor Ultra".into(),
            },
        );
        output.change_current_state(
            Some(Mode {
                size: (1920, 1080).into(),
                refresh: 60_000,
            }),
            None,
            None,
            None,
        );
        output
    }

    fn touch(size_mm: Option<(f64, f64)>) -> DeviceHandle {
        InputDevice::new(
            "event7",
            "test touch",
            (0x1234, 0x5678),
            DeviceCapabilities {
                touch: true,
                ..Default::default()
            },
            size_mm.map(Size::from),
        )
    }

    #[test]
    fn explicit_name_wins() {
        let mut binder = OutputBinder::new();
        binder.set_outputs(&[output("eDP-1", (310, 170), true), output("HDMI-1", (530, 300), false)]);

        let device = touch(Some((530.0, 300.0)));
        device.set_output_name(Some("eDP-1".into()));
        binder.register_device(&device);

        assert_eq!(device.output().unwrap().name(), "eDP-1");
    }

    #[test]
    fn size_match_prefers_internal_then_any() {
        let mut binder = OutputBinder::new();
        binder.set_outputs(&[output("eDP-1", (310, 170), true), output("HDMI-1", (530, 300), false)]);

        let internal_sized = touch(Some((310.0, 170.0)));
        binder.register_device(&internal_sized);
        assert_eq!(internal_sized.output().unwrap().name(), "eDP-1");

        let external_sized = touch(Some((530.0, 300.0)));
        binder.register_device(&external_sized);
        assert_eq!(external_sized.output().unwrap().name(), "HDMI-1");
    }

    #[test]
    fn falls_back_to_internal_then_first_enabled() {
        let mut binder = OutputBinder::new();
        let internal = output("eDP-1", (310, 170), true);
        let external = output("HDMI-1", (530, 300), false);
        binder.set_outputs(&[external.clone(), internal.clone()]);

        let device = touch(Some((999.0, 999.0)));
        binder.register_device(&device);
        assert_eq!(device.output().unwrap().name(), "eDP-1");

        internal.set_enabled(false);
        binder.set_outputs(&[external, internal]);
        assert_eq!(device.output().unwrap().name(), "HDMI-1");
    }

    #[test]
    fn no_enabled_output_means_no_assignment() {
        let mut binder = OutputBinder::new();
        let only = output("HDMI-1", (530, 300), false);
        only.set_enabled(false);
        binder.set_outputs(&[only]);

        let device = touch(None);
        binder.register_device(&device);
        assert!(device.output().is_none());
        assert!(binder.map_to_output(&device, (0.5, 0.5).into()).is_none());
    }

    #[test]
    fn rebinds_when_outputs_change() {
        let mut binder = OutputBinder::new();
        let internal = output("eDP-1", (310, 170), true);
        binder.set_outputs(&[internal.clone()]);

        let device = touch(Some((530.0, 300.0)));
        binder.register_device(&device);
        assert_eq!(device.output().unwrap().name(), "eDP-1");

        let external = output("HDMI-1", (530, 300), false);
        binder.set_outputs(&[internal, external]);
        assert_eq!(device.output().unwrap().name(), "HDMI-1");
    }

    #[test]
    fn maps_through_rotated_output() {
        let mut binder = OutputBinder::new();
        let rotated = output("DP-1", (530, 300), false);
        rotated.change_current_state(None, Some(Transform::Rotated270), Some(1.0), Some((0, 0).into()));
        binder.set_outputs(&[rotated]);

        let device = touch(Some((530.0, 300.0)));
        binder.register_device(&device);

        let mapped = binder.map_to_output(&device, (0.0, 0.0).into()).unwrap();
        assert_eq!(mapped, (0.0, 1920.0).into());
    }

    #[test]
    fn output_area_restricts_tablet_mapping() {
        let mut binder = OutputBinder::new();
        binder.set_outputs(&[output("DP-1", (530, 300), false)]);

        let device = InputDevice::new(
            "event9",
            "test tablet",
            (0x56a, 0x33),
            DeviceCapabilities {
                tablet_tool: true,
                ..Default::default()
            },
            Some((216.0, 135.0).into()),
        );
        device.set_output_area(Some(Rectangle::new(
            (0.5, 0.5).into(),
            (0.5, 0.5).into(),
        )));
        binder.register_device(&device);

        let mapped = binder.map_to_output(&device, (0.0, 0.0).into()).unwrap();
        assert_eq!(mapped, (960.0, 540.0).into());
    }
}
