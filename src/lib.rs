#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
// Allow acronyms like LED
#![allow(clippy::upper_case_acronyms)]

//! # Bellows: the input smithy
//!
//! This crate provides the input stack of a wayland compositor: opening input devices
//! through a privileged seat session, enumerating and configuring them, translating raw
//! kernel events into a typed event stream, and dispatching that stream, together with
//! synthetic input from clients, to the compositor in a single, ordered flow.
//!
//! ## Structure of the crate
//!
//! - [`backend`] contains the operating-system facing helpers: the seat [`backend::session`]
//!   used to open device nodes without privileges, and the libinput-backed
//!   [`backend::libinput`] device registry running on a dedicated worker thread.
//! - [`input`] contains the device and event model shared by real and virtual devices,
//!   the cross-thread [`input::queue::EventQueue`] and its motion coalescer.
//! - [`output`] models display outputs and assigns touch and tablet devices to them.
//! - [`dispatch`] is the single entry point draining the queue on the compositor thread.
//! - [`wayland`] contains the client-facing protocol globals: synthetic input
//!   ([`wayland::fake_input`]) and idle timeouts ([`wayland::idle`]).
//! - [`vsync`] provides a software vblank source for backends without a hardware signal.
//! - [`dbus`] publishes the device list on the session bus.
//!
//! ## The event loop and state handling
//!
//! Bellows is built around [`calloop`], a callback-oriented event loop. The worker thread
//! runs its own private loop blocking on the input backend; the compositor thread inserts
//! the wake source of the [`input::queue::EventQueue`] into its loop and drains the queue
//! from the callback. All protocol state (idle timers, fake input, vsync alarms) lives on
//! the compositor thread and is driven by the same loop.
//!
//! ## Logging
//!
//! Bellows makes extensive use of [`tracing`] for its internal logging.

pub mod backend;
#[cfg(all(feature = "dbus", feature = "backend_libinput"))]
pub mod dbus;
pub mod dispatch;
pub mod input;
pub mod output;
pub mod utils;
pub mod vsync;
#[cfg(feature = "wayland_frontend")]
pub mod wayland;

pub mod reexports;
