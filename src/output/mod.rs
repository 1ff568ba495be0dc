//! Output
//!
//! This module provides a type helping you to abstract over the
//! properties of one display surface of your compositor, as far as input routing is
//! concerned: its global position, pixel mode, physical dimensions, rotation/flip
//! transform and content scale.
//!
//! The [`binder`] submodule assigns absolute-coordinate input devices (touch screens,
//! tablets) to outputs and maps device coordinates into the global space.

use std::sync::{Arc, Mutex, Weak};

use tracing::info;

use crate::utils::{Logical, Physical, Point, Raw, Rectangle, Size, Transform};

pub mod binder;

pub use self::binder::OutputBinder;

/// An output mode
///
/// A possible combination of dimensions and refresh rate for an output.
///
/// This should only describe the characteristics of the video driver,
/// not taking into account any global scaling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Mode {
    /// The size of the mode, in pixels
    pub size: Size<i32, Physical>,
    /// The refresh rate in millihertz
    ///
    /// `1000` is one fps (frame per second), `2000` is 2 fps, etc...
    pub refresh: i32,
}

/// The static properties of an output
#[derive(Debug, Clone)]
pub struct PhysicalProperties {
    /// The size of the monitor, in millimeters
    pub size: Size<i32, Raw>,
    /// Whether this is a built-in panel (as opposed to an external monitor)
    pub internal: bool,
    /// Textual representation of the make
    pub make: String,
    /// Textual representation of the model
    pub model: String,
}

#[derive(Debug)]
struct Inner {
    name: String,
    physical: PhysicalProperties,
    enabled: bool,
    location: Point<i32, Logical>,
    transform: Transform,
    scale: f64,
    current_mode: Option<Mode>,
}

/// An abstract output.
///
/// This handle is cheap to clone and can be shared; all mutations go through interior
/// locking.
#[derive(Debug, Clone)]
pub struct Output {
    inner: Arc<Mutex<Inner>>,
}

/// Weak variant of an [`Output`].
///
/// Can be used to refer to a potentially already destroyed output.
#[derive(Debug, Clone)]
pub struct WeakOutput {
    inner: Weak<Mutex<Inner>>,
}

impl Output {
    /// Create a new output with given name and physical properties
    pub fn new(name: String, physical: PhysicalProperties) -> Output {
        info!(name, "Creating new Output");

        Output {
            inner: Arc::new(Mutex::new(Inner {
                name,
                physical,
                enabled: true,
                location: (0, 0).into(),
                transform: Transform::Normal,
                scale: 1.0,
                current_mode: None,
            })),
        }
    }

    /// Update the characteristics of the output.
    ///
    /// Arguments set to `None` are left unchanged.
    pub fn change_current_state(
        &self,
        new_mode: Option<Mode>,
        new_transform: Option<Transform>,
        new_scale: Option<f64>,
        new_location: Option<Point<i32, Logical>>,
    ) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(mode) = new_mode {
            inner.current_mode = Some(mode);
        }
        if let Some(transform) = new_transform {
            inner.transform = transform;
        }
        if let Some(scale) = new_scale {
            inner.scale = scale;
        }
        if let Some(location) = new_location {
            inner.location = location;
        }
    }

    /// Enable or disable the output for input routing purposes
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.lock().unwrap().enabled = enabled;
    }

    /// Whether the output participates in input routing
    pub fn is_enabled(&self) -> bool {
        self.inner.lock().unwrap().enabled
    }

    /// Name of the output (connector name, e.g. `eDP-1`)
    pub fn name(&self) -> String {
        self.inner.lock().unwrap().name.clone()
    }

    /// Whether this is a built-in panel
    pub fn is_internal(&self) -> bool {
        self.inner.lock().unwrap().physical.internal
    }

    /// Physical size in millimeters
    pub fn physical_size(&self) -> Size<i32, Raw> {
        self.inner.lock().unwrap().physical.size
    }

    /// The static properties of the output
    pub fn physical_properties(&self) -> PhysicalProperties {
        self.inner.lock().unwrap().physical.clone()
    }

    /// Current pixel mode, if one is set
    pub fn current_mode(&self) -> Option<Mode> {
        self.inner.lock().unwrap().current_mode
    }

    /// Current transform of the output
    pub fn transform(&self) -> Transform {
        self.inner.lock().unwrap().transform
    }

    /// Current content scale of the output
    pub fn scale(&self) -> f64 {
        self.inner.lock().unwrap().scale
    }

    /// Position of the output's top-left corner in the global space
    pub fn location(&self) -> Point<i32, Logical> {
        self.inner.lock().unwrap().location
    }

    /// The area this output covers in the global space.
    ///
    /// The size is the current mode, rotated by the output transform and divided by the
    /// content scale. Returns an empty rectangle while no mode is set.
    pub fn geometry(&self) -> Rectangle<i32, Logical> {
        let inner = self.inner.lock().unwrap();
        let size = inner
            .current_mode
            .map(|mode| {
                let size = inner.transform.transform_size(mode.size).to_f64();
                let scaled = size.downscale(inner.scale);
                Size::from((scaled.w.round() as i32, scaled.h.round() as i32))
            })
            .unwrap_or_default();
        Rectangle::new(inner.location, size)
    }

    /// Create a weak reference to this output
    pub fn downgrade(&self) -> WeakOutput {
        WeakOutput {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for Output {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Output {}

impl WeakOutput {
    /// Upgrade to a strong handle, if the output is still alive
    pub fn upgrade(&self) -> Option<Output> {
        self.inner.upgrade().map(|inner| Output { inner })
    }
}

impl PartialEq for WeakOutput {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}
