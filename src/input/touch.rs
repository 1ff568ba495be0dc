//! Touchpoint lifecycle tracking.
//!
//! Touch contacts are keyed by their device-local slot id. The sequence of events for a
//! slot has to match `down · motion* · (up | cancel)`; anything else is the device (or a
//! misbehaving client) talking nonsense and is dropped before it reaches the compositor.

use std::collections::HashMap;
use std::sync::Arc;

use crate::input::device::DeviceHandle;
use crate::utils::{Logical, Point};

/// A live touch contact
#[derive(Debug, Clone)]
struct TouchPoint {
    // keeps the device alive for the duration of the contact
    device: DeviceHandle,
    position: Point<f64, Logical>,
}

/// Tracks the active touchpoints of all devices
#[derive(Debug, Default)]
pub struct TouchTracker {
    points: HashMap<(usize, u32), TouchPoint>,
}

fn key(device: &DeviceHandle, slot: u32) -> (usize, u32) {
    (Arc::as_ptr(device) as usize, slot)
}

impl TouchTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Default::default()
    }

    /// Record a new contact.
    ///
    /// Returns `false` if the slot is already active; the duplicate down must be dropped
    /// and the existing contact stays authoritative.
    pub fn down(&mut self, device: &DeviceHandle, slot: u32, position: Point<f64, Logical>) -> bool {
        let key = key(device, slot);
        if self.points.contains_key(&key) {
            return false;
        }
        self.points.insert(
            key,
            TouchPoint {
                device: device.clone(),
                position,
            },
        );
        true
    }

    /// Update the position of a contact.
    ///
    /// Returns `false` for a slot that never went down; such motion is dropped.
    pub fn motion(&mut self, device: &DeviceHandle, slot: u32, position: Point<f64, Logical>) -> bool {
        match self.points.get_mut(&key(device, slot)) {
            Some(point) => {
                point.position = position;
                true
            }
            None => false,
        }
    }

    /// End a contact.
    ///
    /// Returns `false` for a slot that never went down; such an up is dropped.
    pub fn up(&mut self, device: &DeviceHandle, slot: u32) -> bool {
        self.points.remove(&key(device, slot)).is_some()
    }

    /// Drop every contact of the given device
    pub fn cancel(&mut self, device: &DeviceHandle) {
        let device = Arc::as_ptr(device) as usize;
        self.points.retain(|(owner, _), _| *owner != device);
    }

    /// Last known position of a contact
    pub fn position(&self, device: &DeviceHandle, slot: u32) -> Option<Point<f64, Logical>> {
        self.points.get(&key(device, slot)).map(|point| point.position)
    }

    /// Number of contacts currently active across all devices
    pub fn active_count(&self) -> usize {
        self.points.len()
    }

    /// Forget all contacts of a removed device
    pub fn remove_device(&mut self, device: &DeviceHandle) {
        self.cancel(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::device::{DeviceCapabilities, InputDevice};

    fn touch_device() -> DeviceHandle {
        InputDevice::new_virtual(
            "test touch",
            DeviceCapabilities {
                touch: true,
                ..Default::default()
            },
        )
    }

    #[test]
    fn lifecycle() {
        let device = touch_device();
        let mut tracker = TouchTracker::new();

        assert!(tracker.down(&device, 0, (100.0, 100.0).into()));
        // duplicate down for an active slot is rejected, first contact stays
        assert!(!tracker.down(&device, 0, (50.0, 50.0).into()));
        assert_eq!(tracker.position(&device, 0), Some((100.0, 100.0).into()));

        assert!(tracker.motion(&device, 0, (110.0, 110.0).into()));
        assert_eq!(tracker.position(&device, 0), Some((110.0, 110.0).into()));

        // slot 1 never went down
        assert!(!tracker.motion(&device, 1, (0.0, 0.0).into()));

        assert!(tracker.up(&device, 0));
        assert!(!tracker.up(&device, 1));
        assert_eq!(tracker.active_count(), 0);
    }

    #[test]
    fn cancel_clears_only_this_device(){
        let first = touch_device();
        let second = touch_device();
        let mut tracker = TouchTracker::new();

        assert!(tracker.down(&first, 0, (1.0, 1.0).into()));
        assert!(tracker.down(&first, 1, (2.0, 2.0).into()));
        assert!(tracker.down(&second, 0, (3.0, 3.0).into()));

        tracker.cancel(&first);
        assert_eq!(tracker.active_count(), 1);
        assert!(!tracker.up(&first, 0));
        assert!(tracker.up(&second, 0));
    }

    #[test]
    fn down_after_up_is_a_new_contact() {
        let device = touch_device();
        let mut tracker = TouchTracker::new();

        assert!(tracker.down(&device, 3, (5.0, 5.0).into()));
        assert!(tracker.up(&device, 3));
        assert!(tracker.down(&device, 3, (6.0, 6.0).into()));
        assert_eq!(tracker.position(&device, 3), Some((6.0, 6.0).into()));
    }
}
