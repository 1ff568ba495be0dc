//! Abstraction of session apis.
//!
//! Sessions provide a way for multiple graphical systems to run in parallel by providing
//! mechanisms to switch between and handle device access and permissions for every
//! running instance. They are crucial to allow unprivileged processes to use input
//! devices.
//!
//! The following implementation is provided:
//!   - [`libseat`](self::libseat), through the seatd/logind daemons

use std::os::unix::io::OwnedFd;
use std::path::Path;

use rustix::fs::OFlags;

#[cfg(feature = "backend_session_libseat")]
pub mod libseat;

/// General session interface.
///
/// Provides a way to open and close devices and change the active vt.
pub trait Session {
    /// Error type of the implementation
    type Error: AsErrno;

    /// Opens a device at the given path with the given flags.
    ///
    /// The privileged opener is not required to preserve the flags; implementations
    /// re-apply `O_NONBLOCK` and `O_CLOEXEC` to the returned descriptor.
    fn open(&mut self, path: &Path, flags: OFlags) -> Result<OwnedFd, Self::Error>;
    /// Close a previously opened file descriptor
    fn close(&mut self, fd: OwnedFd) -> Result<(), Self::Error>;

    /// Change the currently active virtual terminal
    fn change_vt(&mut self, vt: i32) -> Result<(), Self::Error>;

    /// Check if this session is currently active
    fn is_active(&self) -> bool;
    /// Which seat this session is on
    fn seat(&self) -> String;
}

/// Signals generated by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session has been paused: the process was moved to the background and devices
    /// must be suspended
    PauseSession,
    /// The session got active again and devices must be resumed
    ActivateSession,
}

/// Allows errors to be described by an error number
pub trait AsErrno: ::std::fmt::Debug {
    /// Returns the error number representing this error, if any
    fn as_errno(&self) -> Option<i32>;
}

impl AsErrno for () {
    fn as_errno(&self) -> Option<i32> {
        None
    }
}
