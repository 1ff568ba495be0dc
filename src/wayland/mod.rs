//! Protocol-facing helpers.
//!
//! This module contains the client-facing globals of the input stack, implemented on
//! top of [`wayland_server`]:
//!
//! - [`fake_input`] lets authorized clients synthesize input events that flow through
//!   the same queue as real input.
//! - [`idle`] lets clients subscribe to per-seat idle timeouts.

pub mod fake_input;
pub mod idle;
