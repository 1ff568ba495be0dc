//! Reexports of crates, that are part of the public api, for convenience

pub use calloop;
#[cfg(feature = "backend_libinput")]
pub use input;
pub use rustix;
#[cfg(feature = "wayland_frontend")]
pub use wayland_protocols_plasma;
#[cfg(feature = "wayland_frontend")]
pub use wayland_server;
#[cfg(feature = "dbus")]
pub use zbus;
