//! Backend (rendering/input) helpers
//!
//! This module provides the operating-system facing helpers of the input stack:
//!
//! - [`session`] provides the privileged channel through which input device nodes are
//!   opened and tracks whether the session is in the foreground.
//! - [`libinput`] hosts the libinput context on a dedicated worker thread, enumerating
//!   devices and translating their events.

#[cfg(feature = "backend_libinput")]
pub mod libinput;
#[cfg(feature = "backend_session")]
pub mod session;
