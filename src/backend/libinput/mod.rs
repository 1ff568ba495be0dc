//! libinput-backed device registry and event translation.
//!
//! [`Connection::spawn`] starts a dedicated worker thread hosting the seat session and
//! the libinput context. The worker enumerates devices, resolves their configuration,
//! translates every native event into a typed [`InputEvent`] and pushes it into the
//! shared [`EventQueue`], waking the compositor thread on the empty→non-empty edge.
//! The compositor side keeps a handle used to issue commands (suspend/resume,
//! configuration reloads, LED updates) which are applied on the worker.

use std::collections::HashMap;
use std::io;
use std::os::unix::io::{AsFd, OwnedFd};
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use calloop::{
    channel, EventLoop, EventSource, Interest, LoopSignal, Mode, Poll, PostAction, Readiness, Token,
    TokenFactory,
};
use indexmap::IndexMap;
use input as libinput;
use input::event;
use input::event::EventTrait;
use rustix::fs::OFlags;
use tracing::{debug, debug_span, error, info, trace, warn};

use crate::backend::session::libseat::LibSeatSession;
use crate::backend::session::{AsErrno, Session, SessionEvent};
use crate::input::device::{DeviceCapabilities, DeviceHandle, InputDevice, Leds};
use crate::input::event as events;
use crate::input::event::InputEvent;
use crate::input::queue::EventQueue;
use crate::utils::clock::{Clock, Monotonic};
use crate::utils::{Normalized, Point, Rectangle, Size};

mod config;
mod tablet;

pub use self::config::{ConfigError, DeviceConfigStore, DeviceProfile};

/// Notifications about the seat session, forwarded from the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionNotice {
    /// The session became active again and devices have been resumed
    Activated,
    /// The session was moved to the background and devices have been suspended
    Paused,
    /// The session channel was lost. This is fatal; the compositor is expected to log
    /// and exit.
    Lost,
}

/// Errors that can happen while bringing up the input backend.
///
/// All of these are fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// Starting the worker thread failed
    #[error("Failed to spawn the input thread")]
    Thread(#[source] io::Error),
    /// Opening the seat session failed
    #[error("Failed to open the seat session")]
    Session,
    /// The libinput context could not be bound to the seat
    #[error("Failed to assign seat {0} to the libinput context")]
    SeatAssign(String),
    /// The worker event loop could not be created
    #[error("Failed to create the input event loop")]
    EventLoop(#[source] calloop::Error),
}

#[derive(Debug)]
enum Command {
    Suspend,
    Resume,
    ReloadPointerConfig,
    UpdateLeds(Leds),
    SetDeviceEnabled { sysname: String, enabled: bool },
    SetTouchpadsEnabled(bool),
    ToggleTouchpads,
    Shutdown,
}

/// Compositor-side handle of the libinput worker thread.
///
/// Dropping the handle shuts the worker down and joins it.
#[derive(Debug)]
pub struct Connection {
    devices: Arc<Mutex<IndexMap<String, DeviceHandle>>>,
    commands: channel::Sender<Command>,
    seat_name: String,
    worker: Option<thread::JoinHandle<()>>,
}

impl Connection {
    /// Open the seat session and start the input worker.
    ///
    /// Translated events arrive in `queue`; its wake source drives the compositor-side
    /// drain. The returned channel delivers [`SessionNotice`]s and has to be inserted
    /// into the compositor event loop. Every error is fatal.
    pub fn spawn(
        config: DeviceConfigStore,
        queue: Arc<EventQueue>,
    ) -> Result<(Connection, channel::Channel<SessionNotice>), ConnectError> {
        let (commands, command_channel) = channel::channel();
        let (notices, notice_channel) = channel::channel();
        let (setup_tx, setup_rx) = mpsc::channel();
        let devices = Arc::new(Mutex::new(IndexMap::new()));

        let shared_devices = devices.clone();
        let worker = thread::Builder::new()
            .name("input-connection".into())
            .spawn(move || {
                worker_thread(config, queue, shared_devices, command_channel, notices, setup_tx)
            })
            .map_err(ConnectError::Thread)?;

        match setup_rx.recv() {
            Ok(Ok(seat_name)) => Ok((
                Connection {
                    devices,
                    commands,
                    seat_name,
                    worker: Some(worker),
                },
                notice_channel,
            )),
            Ok(Err(err)) => {
                let _ = worker.join();
                Err(err)
            }
            Err(_) => {
                let _ = worker.join();
                Err(ConnectError::Session)
            }
        }
    }

    /// Name of the seat the backend is bound to
    pub fn seat_name(&self) -> &str {
        &self.seat_name
    }

    #[cfg(feature = "dbus")]
    pub(crate) fn device_table(&self) -> Arc<Mutex<IndexMap<String, DeviceHandle>>> {
        self.devices.clone()
    }

    /// Look a device up by its system name
    pub fn device(&self, sysname: &str) -> Option<DeviceHandle> {
        self.devices.lock().unwrap().get(sysname).cloned()
    }

    /// All currently registered devices, in registration order
    pub fn devices(&self) -> Vec<DeviceHandle> {
        self.devices.lock().unwrap().values().cloned().collect()
    }

    /// System names of all currently registered devices, in registration order
    pub fn devices_sysnames(&self) -> Vec<String> {
        self.devices.lock().unwrap().keys().cloned().collect()
    }

    /// Suspend event processing, as if the session had been paused
    pub fn suspend(&self) {
        let _ = self.commands.send(Command::Suspend);
    }

    /// Resume event processing after [`suspend`](Self::suspend)
    pub fn resume(&self) {
        let _ = self.commands.send(Command::Resume);
    }

    /// Re-read the configuration store and re-apply it to all pointer devices.
    ///
    /// This is what the settings broadcast (change type 3, argument 0) triggers.
    pub fn reload_pointer_config(&self) {
        let _ = self.commands.send(Command::ReloadPointerConfig);
    }

    /// Push a new LED state to all keyboard devices
    pub fn update_leds(&self, leds: Leds) {
        let _ = self.commands.send(Command::UpdateLeds(leds));
    }

    /// Enable or disable event processing of one device
    pub fn set_device_enabled(&self, device: &DeviceHandle, enabled: bool) {
        let _ = self.commands.send(Command::SetDeviceEnabled {
            sysname: device.sysname().to_owned(),
            enabled,
        });
    }

    /// Enable all touchpad devices
    pub fn enable_touchpads(&self) {
        let _ = self.commands.send(Command::SetTouchpadsEnabled(true));
    }

    /// Disable all touchpad devices
    pub fn disable_touchpads(&self) {
        let _ = self.commands.send(Command::SetTouchpadsEnabled(false));
    }

    /// Flip the enabled state of all touchpad devices
    pub fn toggle_touchpads(&self) {
        let _ = self.commands.send(Command::ToggleTouchpads);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Input thread panicked during shutdown");
            }
        }
    }
}

/// Wrapper for types implementing the [`Session`] trait to provide
/// a [`libinput::LibinputInterface`] implementation.
#[derive(Debug)]
pub struct LibinputSessionInterface<S: Session>(S);

impl<S: Session> From<S> for LibinputSessionInterface<S> {
    fn from(session: S) -> LibinputSessionInterface<S> {
        LibinputSessionInterface(session)
    }
}

impl<S: Session> libinput::LibinputInterface for LibinputSessionInterface<S> {
    fn open_restricted(&mut self, path: &Path, flags: i32) -> Result<OwnedFd, i32> {
        self.0
            .open(path, OFlags::from_bits_truncate(flags as u32))
            .map_err(|err| err.as_errno().unwrap_or(1 /*Use EPERM by default*/))
    }

    fn close_restricted(&mut self, fd: OwnedFd) {
        let _ = self.0.close(fd);
    }
}

// Readiness source for the libinput fd. Dispatches the context and hands control to the
// worker, which pulls the pending events out of its own clone of the context.
#[derive(Debug)]
struct LibinputReadiness {
    context: libinput::Libinput,
    token: Option<Token>,
}

impl EventSource for LibinputReadiness {
    type Event = ();
    type Metadata = ();
    type Ret = ();
    type Error = io::Error;

    fn process_events<F>(&mut self, _: Readiness, token: Token, mut callback: F) -> io::Result<PostAction>
    where
        F: FnMut((), &mut ()),
    {
        if Some(token) == self.token {
            self.context.dispatch()?;
            callback((), &mut ());
        }
        Ok(PostAction::Continue)
    }

    fn register(&mut self, poll: &mut Poll, factory: &mut TokenFactory) -> calloop::Result<()> {
        self.token = Some(factory.token());
        // Safety: the fd cannot be closed while the source holds the context
        unsafe { poll.register(self.context.as_fd(), Interest::READ, Mode::Level, self.token.unwrap()) }
    }

    fn reregister(&mut self, poll: &mut Poll, factory: &mut TokenFactory) -> calloop::Result<()> {
        self.token = Some(factory.token());
        poll.reregister(self.context.as_fd(), Interest::READ, Mode::Level, self.token.unwrap())
    }

    fn unregister(&mut self, poll: &mut Poll) -> calloop::Result<()> {
        self.token = None;
        poll.unregister(self.context.as_fd())
    }
}

fn worker_thread(
    config: DeviceConfigStore,
    queue: Arc<EventQueue>,
    devices: Arc<Mutex<IndexMap<String, DeviceHandle>>>,
    command_channel: channel::Channel<Command>,
    notices: channel::Sender<SessionNotice>,
    setup: mpsc::Sender<Result<String, ConnectError>>,
) {
    let span = debug_span!("backend_libinput");
    let _guard = span.enter();

    bump_realtime_priority();

    let (session, notifier) = match LibSeatSession::new() {
        Ok(session) => session,
        Err(err) => {
            error!("Failed to open the seat session: {}", err);
            let _ = setup.send(Err(ConnectError::Session));
            return;
        }
    };
    let seat_name = session.seat();

    info!("Initializing a libinput backend");
    let mut context = libinput::Libinput::new_with_udev(LibinputSessionInterface::from(session));
    if context.udev_assign_seat(&seat_name).is_err() {
        error!("Failed to assign seat {} to libinput", seat_name);
        let _ = setup.send(Err(ConnectError::SeatAssign(seat_name)));
        return;
    }

    let mut event_loop: EventLoop<'_, Worker> = match EventLoop::try_new() {
        Ok(event_loop) => event_loop,
        Err(err) => {
            let _ = setup.send(Err(ConnectError::EventLoop(err)));
            return;
        }
    };

    let handle = event_loop.handle();
    let insertion: Result<(), calloop::Error> = (|| {
        handle
            .insert_source(notifier, |event, _, worker: &mut Worker| match event {
                SessionEvent::PauseSession => worker.suspend(),
                SessionEvent::ActivateSession => worker.resume(),
            })
            .map_err(|err| err.error)?;
        handle
            .insert_source(
                LibinputReadiness {
                    context: context.clone(),
                    token: None,
                },
                |_, _, worker: &mut Worker| worker.drain_context(),
            )
            .map_err(|err| err.error)?;
        handle
            .insert_source(command_channel, |message, _, worker: &mut Worker| {
                if let channel::Event::Msg(command) = message {
                    worker.handle_command(command);
                }
            })
            .map_err(|err| err.error)?;
        Ok(())
    })();
    if let Err(err) = insertion {
        error!("Failed to set up the input event loop: {}", err);
        let _ = setup.send(Err(ConnectError::EventLoop(err)));
        return;
    }

    let mut worker = Worker {
        queue,
        devices,
        native: HashMap::new(),
        tool_states: HashMap::new(),
        config,
        clock: Clock::new(),
        context,
        notices,
        signal: event_loop.get_signal(),
        leds: Leds::empty(),
        touchpads_enabled: true,
        suspended: false,
        pending: Vec::new(),
    };

    let _ = setup.send(Ok(seat_name));

    // pre-existing devices are already queued in the context at this point
    if let Err(err) = worker.context.dispatch() {
        warn!("Initial libinput dispatch failed: {}", err);
    }
    worker.drain_context();
    worker.flush();

    drop(_guard);
    let result = event_loop.run(None, &mut worker, |worker| worker.flush());
    if let Err(err) = result {
        let _guard = span.enter();
        error!("Input thread lost its event loop: {}", err);
        let _ = worker.notices.send(SessionNotice::Lost);
    }
}

// One-shot bump to a minimum realtime priority to keep input latency low even under
// load. Not being allowed to is fine.
fn bump_realtime_priority() {
    let min_priority = unsafe { libc::sched_get_priority_min(libc::SCHED_RR) };
    let param = libc::sched_param {
        sched_priority: min_priority,
    };
    let ret = unsafe {
        libc::sched_setscheduler(0, libc::SCHED_RR | libc::SCHED_RESET_ON_FORK, &param)
    };
    if ret == -1 {
        info!("No realtime priority for the input thread: {}", io::Error::last_os_error());
    }
}

struct Worker {
    queue: Arc<EventQueue>,
    devices: Arc<Mutex<IndexMap<String, DeviceHandle>>>,
    native: HashMap<String, libinput::Device>,
    tool_states: HashMap<(String, u64, u64), ToolState>,
    config: DeviceConfigStore,
    clock: Clock<Monotonic>,
    context: libinput::Libinput,
    notices: channel::Sender<SessionNotice>,
    signal: LoopSignal,
    leds: Leds,
    touchpads_enabled: bool,
    suspended: bool,
    pending: Vec<InputEvent>,
}

#[derive(Debug, Default, Clone, Copy)]
struct ToolState {
    in_proximity: bool,
    tip_down: bool,
}

impl Worker {
    fn flush(&mut self) {
        if !self.pending.is_empty() {
            self.queue.extend(self.pending.drain(..));
        }
    }

    fn drain_context(&mut self) {
        let mut context = self.context.clone();
        for event in &mut context {
            self.handle_event(event);
        }
    }

    fn suspend(&mut self) {
        if self.suspended {
            return;
        }
        debug!("Suspending input processing");
        self.context.suspend();
        self.suspended = true;
        // collect the device removals the suspend generated
        self.drain_context();
        let _ = self.notices.send(SessionNotice::Paused);
    }

    fn resume(&mut self) {
        if !self.suspended {
            return;
        }
        debug!("Resuming input processing");
        if self.context.resume().is_err() {
            error!("Failed to resume the libinput context");
            return;
        }
        self.suspended = false;
        if let Err(err) = self.context.dispatch() {
            warn!("libinput dispatch after resume failed: {}", err);
        }
        self.drain_context();
        let _ = self.notices.send(SessionNotice::Activated);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Suspend => self.suspend(),
            Command::Resume => self.resume(),
            Command::ReloadPointerConfig => self.reload_pointer_config(),
            Command::UpdateLeds(leds) => self.update_leds(leds),
            Command::SetDeviceEnabled { sysname, enabled } => {
                self.set_device_enabled(&sysname, enabled)
            }
            Command::SetTouchpadsEnabled(enabled) => self.set_touchpads_enabled(enabled),
            Command::ToggleTouchpads => self.set_touchpads_enabled(!self.touchpads_enabled),
            Command::Shutdown => {
                self.signal.stop();
                self.signal.wakeup();
            }
        }
    }

    fn reload_pointer_config(&mut self) {
        if let Err(err) = self.config.reload() {
            warn!("Not re-applying device configuration: {}", err);
            return;
        }
        let pointers: Vec<DeviceHandle> = self
            .devices
            .lock()
            .unwrap()
            .values()
            .filter(|device| device.is_pointer())
            .cloned()
            .collect();
        for record in pointers {
            if let Some(native) = self.native.get(record.sysname()) {
                let mut native = native.clone();
                let profile = self.config.profile_for(
                    record.capabilities(),
                    (record.vendor(), record.product()),
                    record.name(),
                );
                apply_profile(&mut native, &record, &profile);
            }
        }
    }

    fn update_leds(&mut self, leds: Leds) {
        if self.leds == leds {
            return;
        }
        self.leds = leds;
        let devices = self.devices.lock().unwrap();
        for (sysname, record) in devices.iter() {
            if record.is_keyboard() {
                if let Some(native) = self.native.get_mut(sysname) {
                    native.led_update(leds.into());
                }
                record.set_leds(leds);
            }
        }
    }

    fn set_device_enabled(&mut self, sysname: &str, enabled: bool) {
        let record = self.devices.lock().unwrap().get(sysname).cloned();
        if let (Some(record), Some(native)) = (record, self.native.get_mut(sysname)) {
            apply_send_events(native, &record, enabled);
        }
    }

    fn set_touchpads_enabled(&mut self, enabled: bool) {
        if self.touchpads_enabled == enabled {
            return;
        }
        self.touchpads_enabled = enabled;
        let touchpads: Vec<DeviceHandle> = self
            .devices
            .lock()
            .unwrap()
            .values()
            .filter(|device| device.is_touchpad())
            .cloned()
            .collect();
        for record in touchpads {
            if let Some(native) = self.native.get_mut(record.sysname()) {
                apply_send_events(native, &record, enabled);
            }
        }
    }

    fn device_for(&self, event: &impl EventTrait) -> Option<DeviceHandle> {
        let native = event.device();
        let record = self.devices.lock().unwrap().get(native.sysname()).cloned();
        if record.is_none() {
            trace!("Dropping event of unknown device {:?}", native.sysname());
        }
        record
    }

    fn device_added(&mut self, mut native: libinput::Device) {
        let sysname = native.sysname().to_owned();
        let capabilities = detect_capabilities(&native);
        let record = InputDevice::new(
            &sysname,
            native.name(),
            (native.id_vendor(), native.id_product()),
            capabilities,
            native.size().map(Size::from),
        );

        info!("New device {:?}", sysname);

        let profile =
            self.config
                .profile_for(record.capabilities(), (record.vendor(), record.product()), record.name());
        apply_profile(&mut native, &record, &profile);

        if record.is_keyboard() {
            native.led_update(self.leds.into());
            record.set_leds(self.leds);
        }
        if record.is_touchpad() && !self.touchpads_enabled {
            apply_send_events(&mut native, &record, false);
        }

        self.native.insert(sysname.clone(), native);
        self.devices.lock().unwrap().insert(sysname, record.clone());
        self.pending.push(InputEvent::DeviceAdded {
            device: record,
            time: self.clock.now().as_micros(),
        });
    }

    fn device_removed(&mut self, native: &libinput::Device) {
        let sysname = native.sysname();
        self.native.remove(sysname);
        self.tool_states.retain(|(owner, _, _), _| owner != sysname);
        let record = self.devices.lock().unwrap().shift_remove(sysname);
        let Some(record) = record else {
            // we don't know this device
            return;
        };

        info!("Removed device {:?}", sysname);

        self.pending.push(InputEvent::DeviceRemoved {
            device: record,
            time: self.clock.now().as_micros(),
        });
    }

    #[profiling::function]
    fn handle_event(&mut self, event: libinput::Event) {
        match event {
            libinput::Event::Device(device_event) => match device_event {
                event::DeviceEvent::Added(added) => {
                    self.device_added(EventTrait::device(&added));
                }
                event::DeviceEvent::Removed(removed) => {
                    self.device_removed(&EventTrait::device(&removed));
                }
                _ => {
                    trace!("Unknown libinput device event");
                }
            },
            libinput::Event::Keyboard(keyboard_event) => match keyboard_event {
                event::KeyboardEvent::Key(key_event) => self.on_keyboard_key(key_event),
                _ => {
                    trace!("Unknown libinput keyboard event");
                }
            },
            libinput::Event::Pointer(pointer_event) => match pointer_event {
                event::PointerEvent::Motion(motion) => self.on_pointer_motion(motion),
                event::PointerEvent::MotionAbsolute(motion) => {
                    self.on_pointer_motion_absolute(motion)
                }
                event::PointerEvent::Button(button) => self.on_pointer_button(button),
                event::PointerEvent::ScrollWheel(scroll) => self.on_scroll_wheel(scroll),
                event::PointerEvent::ScrollFinger(scroll) => self.on_scroll_finger(scroll),
                event::PointerEvent::ScrollContinuous(scroll) => self.on_scroll_continuous(scroll),
                _ => {
                    trace!("Unknown libinput pointer event");
                }
            },
            libinput::Event::Touch(touch_event) => self.on_touch(touch_event),
            libinput::Event::Gesture(gesture_event) => self.on_gesture(gesture_event),
            libinput::Event::Switch(switch_event) => match switch_event {
                event::SwitchEvent::Toggle(toggle) => self.on_switch_toggle(toggle),
                _ => {
                    trace!("Unknown libinput switch event");
                }
            },
            libinput::Event::Tablet(tablet_event) => self.on_tablet_tool(tablet_event),
            libinput::Event::TabletPad(pad_event) => self.on_tablet_pad(pad_event),
            _ => {
                trace!("Unknown libinput event");
            }
        }
    }

    fn on_keyboard_key(&mut self, key_event: event::keyboard::KeyboardKeyEvent) {
        use input::event::keyboard::KeyboardEventTrait;

        let Some(device) = self.device_for(&key_event) else {
            return;
        };
        self.pending.push(InputEvent::Keyboard {
            event: events::KeyboardKeyEvent {
                device,
                time: key_event.time_usec(),
                key_code: key_event.key(),
                state: key_event.key_state().into(),
            },
        });
    }

    fn on_pointer_motion(&mut self, motion: event::pointer::PointerMotionEvent) {
        use input::event::pointer::PointerEventTrait;

        let Some(device) = self.device_for(&motion) else {
            return;
        };
        self.pending.push(InputEvent::PointerMotion {
            event: events::PointerMotionEvent {
                device,
                time: motion.time_usec(),
                delta: (motion.dx(), motion.dy()).into(),
                delta_unaccel: (motion.dx_unaccelerated(), motion.dy_unaccelerated()).into(),
            },
        });
    }

    fn on_pointer_motion_absolute(&mut self, motion: event::pointer::PointerMotionAbsoluteEvent) {
        use input::event::pointer::PointerEventTrait;

        let Some(device) = self.device_for(&motion) else {
            return;
        };
        self.pending.push(InputEvent::PointerMotionAbsolute {
            event: events::PointerMotionAbsoluteEvent {
                device,
                time: motion.time_usec(),
                position: normalized(
                    motion.absolute_x_transformed(1),
                    motion.absolute_y_transformed(1),
                ),
            },
        });
    }

    fn on_pointer_button(&mut self, button: event::pointer::PointerButtonEvent) {
        use input::event::pointer::PointerEventTrait;

        let Some(device) = self.device_for(&button) else {
            return;
        };
        self.pending.push(InputEvent::PointerButton {
            event: events::PointerButtonEvent {
                device,
                time: button.time_usec(),
                button: button.button(),
                state: button.button_state().into(),
            },
        });
    }

    fn on_scroll_wheel(&mut self, scroll: event::pointer::PointerScrollWheelEvent) {
        use input::event::pointer::{PointerEventTrait, PointerScrollEvent};

        let Some(device) = self.device_for(&scroll) else {
            return;
        };
        let factor = device.scroll_factor();
        let time = scroll.time_usec();
        for axis in [event::pointer::Axis::Horizontal, event::pointer::Axis::Vertical] {
            if scroll.has_axis(axis) {
                self.pending.push(InputEvent::PointerAxis {
                    event: events::PointerAxisEvent {
                        device: device.clone(),
                        time,
                        axis: axis.into(),
                        source: events::AxisSource::Wheel,
                        value: scroll.scroll_value(axis) * factor,
                        value_v120: Some(scroll.scroll_value_v120(axis) * factor),
                    },
                });
            }
        }
    }

    fn on_scroll_finger(&mut self, scroll: event::pointer::PointerScrollFingerEvent) {
        use input::event::pointer::{PointerEventTrait, PointerScrollEvent};

        let Some(device) = self.device_for(&scroll) else {
            return;
        };
        let factor = device.scroll_factor();
        let time = scroll.time_usec();
        for axis in [event::pointer::Axis::Horizontal, event::pointer::Axis::Vertical] {
            if scroll.has_axis(axis) {
                self.pending.push(InputEvent::PointerAxis {
                    event: events::PointerAxisEvent {
                        device: device.clone(),
                        time,
                        axis: axis.into(),
                        source: events::AxisSource::Finger,
                        value: scroll.scroll_value(axis) * factor,
                        value_v120: None,
                    },
                });
            }
        }
    }

    fn on_scroll_continuous(&mut self, scroll: event::pointer::PointerScrollContinuousEvent) {
        use input::event::pointer::{PointerEventTrait, PointerScrollEvent};

        let Some(device) = self.device_for(&scroll) else {
            return;
        };
        let factor = device.scroll_factor();
        let time = scroll.time_usec();
        for axis in [event::pointer::Axis::Horizontal, event::pointer::Axis::Vertical] {
            if scroll.has_axis(axis) {
                self.pending.push(InputEvent::PointerAxis {
                    event: events::PointerAxisEvent {
                        device: device.clone(),
                        time,
                        axis: axis.into(),
                        source: events::AxisSource::Continuous,
                        value: scroll.scroll_value(axis) * factor,
                        value_v120: None,
                    },
                });
            }
        }
    }

    fn on_touch(&mut self, touch_event: event::TouchEvent) {
        use input::event::touch::{TouchEventPosition, TouchEventSlot, TouchEventTrait};

        match touch_event {
            event::TouchEvent::Down(down) => {
                let Some(device) = self.device_for(&down) else {
                    return;
                };
                self.pending.push(InputEvent::TouchDown {
                    event: events::TouchDownEvent {
                        device,
                        time: down.time_usec(),
                        slot: down.slot(),
                        position: normalized(down.x_transformed(1), down.y_transformed(1)),
                    },
                });
            }
            event::TouchEvent::Motion(motion) => {
                let Some(device) = self.device_for(&motion) else {
                    return;
                };
                self.pending.push(InputEvent::TouchMotion {
                    event: events::TouchMotionEvent {
                        device,
                        time: motion.time_usec(),
                        slot: motion.slot(),
                        position: normalized(motion.x_transformed(1), motion.y_transformed(1)),
                    },
                });
            }
            event::TouchEvent::Up(up) => {
                let Some(device) = self.device_for(&up) else {
                    return;
                };
                self.pending.push(InputEvent::TouchUp {
                    event: events::TouchUpEvent {
                        device,
                        time: up.time_usec(),
                        slot: up.slot(),
                    },
                });
            }
            event::TouchEvent::Cancel(cancel) => {
                let Some(device) = self.device_for(&cancel) else {
                    return;
                };
                self.pending.push(InputEvent::TouchCancel {
                    event: events::TouchCancelEvent {
                        device,
                        time: cancel.time_usec(),
                    },
                });
            }
            event::TouchEvent::Frame(frame) => {
                let Some(device) = self.device_for(&frame) else {
                    return;
                };
                self.pending.push(InputEvent::TouchFrame {
                    event: events::TouchFrameEvent {
                        device,
                        time: frame.time_usec(),
                    },
                });
            }
            _ => {
                trace!("Unknown libinput touch event");
            }
        }
    }

    fn on_gesture(&mut self, gesture_event: event::GestureEvent) {
        use input::event::gesture::{
            GestureEndEvent, GestureEventCoordinates, GestureEventTrait, GestureHoldEvent,
            GesturePinchEvent, GesturePinchEventTrait, GestureSwipeEvent,
        };

        match gesture_event {
            event::GestureEvent::Swipe(GestureSwipeEvent::Begin(begin)) => {
                let Some(device) = self.device_for(&begin) else {
                    return;
                };
                self.pending.push(InputEvent::GestureSwipeBegin {
                    event: events::GestureSwipeBeginEvent {
                        device,
                        time: begin.time_usec(),
                        fingers: begin.finger_count() as u32,
                    },
                });
            }
            event::GestureEvent::Swipe(GestureSwipeEvent::Update(update)) => {
                let Some(device) = self.device_for(&update) else {
                    return;
                };
                self.pending.push(InputEvent::GestureSwipeUpdate {
                    event: events::GestureSwipeUpdateEvent {
                        device,
                        time: update.time_usec(),
                        delta: (update.dx(), update.dy()).into(),
                    },
                });
            }
            event::GestureEvent::Swipe(GestureSwipeEvent::End(end)) => {
                let Some(device) = self.device_for(&end) else {
                    return;
                };
                self.pending.push(InputEvent::GestureSwipeEnd {
                    event: events::GestureSwipeEndEvent {
                        device,
                        time: end.time_usec(),
                        cancelled: end.cancelled(),
                    },
                });
            }
            event::GestureEvent::Pinch(GesturePinchEvent::Begin(begin)) => {
                let Some(device) = self.device_for(&begin) else {
                    return;
                };
                self.pending.push(InputEvent::GesturePinchBegin {
                    event: events::GesturePinchBeginEvent {
                        device,
                        time: begin.time_usec(),
                        fingers: begin.finger_count() as u32,
                    },
                });
            }
            event::GestureEvent::Pinch(GesturePinchEvent::Update(update)) => {
                let Some(device) = self.device_for(&update) else {
                    return;
                };
                self.pending.push(InputEvent::GesturePinchUpdate {
                    event: events::GesturePinchUpdateEvent {
                        device,
                        time: update.time_usec(),
                        delta: (update.dx(), update.dy()).into(),
                        scale: update.scale(),
                        rotation: update.angle_delta(),
                    },
                });
            }
            event::GestureEvent::Pinch(GesturePinchEvent::End(end)) => {
                let Some(device) = self.device_for(&end) else {
                    return;
                };
                self.pending.push(InputEvent::GesturePinchEnd {
                    event: events::GesturePinchEndEvent {
                        device,
                        time: end.time_usec(),
                        cancelled: end.cancelled(),
                    },
                });
            }
            event::GestureEvent::Hold(GestureHoldEvent::Begin(begin)) => {
                let Some(device) = self.device_for(&begin) else {
                    return;
                };
                self.pending.push(InputEvent::GestureHoldBegin {
                    event: events::GestureHoldBeginEvent {
                        device,
                        time: begin.time_usec(),
                        fingers: begin.finger_count() as u32,
                    },
                });
            }
            event::GestureEvent::Hold(GestureHoldEvent::End(end)) => {
                let Some(device) = self.device_for(&end) else {
                    return;
                };
                self.pending.push(InputEvent::GestureHoldEnd {
                    event: events::GestureHoldEndEvent {
                        device,
                        time: end.time_usec(),
                        cancelled: end.cancelled(),
                    },
                });
            }
            _ => {
                trace!("Unknown libinput gesture event");
            }
        }
    }

    fn on_switch_toggle(&mut self, toggle: event::switch::SwitchToggleEvent) {
        use input::event::switch::{Switch, SwitchEventTrait, SwitchState, SwitchToggleEvent};

        let Some(device) = self.device_for(&toggle) else {
            return;
        };
        let Some(switch) = SwitchToggleEvent::switch(&toggle) else {
            trace!("Toggle of an unknown switch");
            return;
        };
        let switch = match switch {
            Switch::Lid => events::Switch::Lid,
            Switch::TabletMode => events::Switch::TabletMode,
            _ => {
                trace!("Toggle of an unknown switch");
                return;
            }
        };
        self.pending.push(InputEvent::SwitchToggle {
            event: events::SwitchToggleEvent {
                device,
                time: SwitchEventTrait::time_usec(&toggle),
                switch,
                state: match toggle.switch_state() {
                    SwitchState::Off => events::SwitchState::Off,
                    SwitchState::On => events::SwitchState::On,
                },
            },
        });
    }

    fn on_tablet_tool(&mut self, tablet_event: event::TabletToolEvent) {
        use input::event::tablet_tool::{
            ProximityState, TabletToolEventTrait, TipState,
        };

        match tablet_event {
            event::TabletToolEvent::Axis(axis) => {
                let Some(device) = self.device_for(&axis) else {
                    return;
                };
                let tool = tablet::descriptor(&device, &axis.tool());
                let state = self.tool_state(&tool);
                self.pending.push(InputEvent::TabletToolAxis {
                    event: events::TabletToolAxisEvent {
                        device,
                        time: axis.time_usec(),
                        position: normalized(axis.x_transformed(1), axis.y_transformed(1)),
                        axes: tablet::axes(&axis),
                        in_proximity: state.in_proximity,
                        tip_down: state.tip_down,
                        tool,
                    },
                });
            }
            event::TabletToolEvent::Proximity(proximity) => {
                let Some(device) = self.device_for(&proximity) else {
                    return;
                };
                let tool = tablet::descriptor(&device, &proximity.tool());
                let in_proximity = matches!(proximity.proximity_state(), ProximityState::In);
                let state = self.update_tool_state(&tool, |state| {
                    state.in_proximity = in_proximity;
                    if !in_proximity {
                        state.tip_down = false;
                    }
                });
                self.pending.push(InputEvent::TabletToolProximity {
                    event: events::TabletToolProximityEvent {
                        device,
                        time: proximity.time_usec(),
                        position: normalized(proximity.x_transformed(1), proximity.y_transformed(1)),
                        axes: tablet::axes(&proximity),
                        in_proximity: state.in_proximity,
                        tip_down: state.tip_down,
                        state: if in_proximity {
                            events::ProximityState::In
                        } else {
                            events::ProximityState::Out
                        },
                        tool,
                    },
                });
            }
            event::TabletToolEvent::Tip(tip) => {
                let Some(device) = self.device_for(&tip) else {
                    return;
                };
                let tool = tablet::descriptor(&device, &tip.tool());
                let tip_down = matches!(tip.tip_state(), TipState::Down);
                let state = self.update_tool_state(&tool, |state| {
                    state.tip_down = tip_down;
                });
                self.pending.push(InputEvent::TabletToolTip {
                    event: events::TabletToolTipEvent {
                        device,
                        time: tip.time_usec(),
                        position: normalized(tip.x_transformed(1), tip.y_transformed(1)),
                        axes: tablet::axes(&tip),
                        in_proximity: state.in_proximity,
                        tip_down: state.tip_down,
                        state: if tip_down {
                            events::TipState::Down
                        } else {
                            events::TipState::Up
                        },
                        tool,
                    },
                });
            }
            event::TabletToolEvent::Button(button) => {
                let Some(device) = self.device_for(&button) else {
                    return;
                };
                let tool = tablet::descriptor(&device, &button.tool());
                self.pending.push(InputEvent::TabletToolButton {
                    event: events::TabletToolButtonEvent {
                        device,
                        time: button.time_usec(),
                        tool,
                        button: button.button(),
                        state: match button.button_state() {
                            event::tablet_tool::ButtonState::Pressed => events::ButtonState::Pressed,
                            event::tablet_tool::ButtonState::Released => events::ButtonState::Released,
                        },
                    },
                });
            }
            _ => {
                trace!("Unknown libinput tablet event");
            }
        }
    }

    fn on_tablet_pad(&mut self, pad_event: event::TabletPadEvent) {
        use input::event::tablet_pad::{
            RingAxisSource, StripAxisSource, TabletPadEventTrait,
        };

        match pad_event {
            event::TabletPadEvent::Button(button) => {
                let Some(device) = self.device_for(&button) else {
                    return;
                };
                self.pending.push(InputEvent::TabletPadButton {
                    event: events::TabletPadButtonEvent {
                        device,
                        time: button.time_usec(),
                        button: button.button_number(),
                        state: match button.button_state() {
                            event::tablet_pad::ButtonState::Pressed => events::ButtonState::Pressed,
                            event::tablet_pad::ButtonState::Released => events::ButtonState::Released,
                        },
                    },
                });
            }
            event::TabletPadEvent::Ring(ring) => {
                let Some(device) = self.device_for(&ring) else {
                    return;
                };
                self.pending.push(InputEvent::TabletPadRing {
                    event: events::TabletPadRingEvent {
                        device,
                        time: ring.time_usec(),
                        number: ring.number(),
                        position: ring.position(),
                        finger: matches!(ring.source(), RingAxisSource::Finger),
                    },
                });
            }
            event::TabletPadEvent::Strip(strip) => {
                let Some(device) = self.device_for(&strip) else {
                    return;
                };
                self.pending.push(InputEvent::TabletPadStrip {
                    event: events::TabletPadStripEvent {
                        device,
                        time: strip.time_usec(),
                        number: strip.number(),
                        position: strip.position(),
                        finger: matches!(strip.source(), StripAxisSource::Finger),
                    },
                });
            }
            _ => {
                trace!("Unknown libinput tablet pad event");
            }
        }
    }

    fn tool_state(&mut self, tool: &crate::input::tablet::TabletToolDescriptor) -> ToolState {
        *self
            .tool_states
            .entry((tool.device_sysname.clone(), tool.hardware_serial, tool.hardware_id))
            .or_default()
    }

    fn update_tool_state(
        &mut self,
        tool: &crate::input::tablet::TabletToolDescriptor,
        update: impl FnOnce(&mut ToolState),
    ) -> ToolState {
        let state = self
            .tool_states
            .entry((tool.device_sysname.clone(), tool.hardware_serial, tool.hardware_id))
            .or_default();
        update(state);
        *state
    }
}

fn normalized(x: f64, y: f64) -> Point<f64, Normalized> {
    (x, y).into()
}

impl From<event::keyboard::KeyState> for events::KeyState {
    fn from(libinput: event::keyboard::KeyState) -> Self {
        match libinput {
            event::keyboard::KeyState::Pressed => events::KeyState::Pressed,
            event::keyboard::KeyState::Released => events::KeyState::Released,
        }
    }
}

impl From<event::pointer::ButtonState> for events::ButtonState {
    fn from(libinput: event::pointer::ButtonState) -> Self {
        match libinput {
            event::pointer::ButtonState::Pressed => events::ButtonState::Pressed,
            event::pointer::ButtonState::Released => events::ButtonState::Released,
        }
    }
}

impl From<event::pointer::Axis> for events::Axis {
    fn from(libinput: event::pointer::Axis) -> Self {
        match libinput {
            event::pointer::Axis::Vertical => events::Axis::Vertical,
            event::pointer::Axis::Horizontal => events::Axis::Horizontal,
        }
    }
}

impl From<Leds> for libinput::Led {
    fn from(leds: Leds) -> Self {
        let mut led = libinput::Led::empty();
        if leds.contains(Leds::NUMLOCK) {
            led |= libinput::Led::NUMLOCK;
        }
        if leds.contains(Leds::CAPSLOCK) {
            led |= libinput::Led::CAPSLOCK;
        }
        if leds.contains(Leds::SCROLLLOCK) {
            led |= libinput::Led::SCROLLLOCK;
        }
        led
    }
}

fn detect_capabilities(native: &libinput::Device) -> DeviceCapabilities {
    use input::event::switch::Switch;
    use input::DeviceCapability as Cap;

    let keyboard = native.has_capability(Cap::Keyboard);
    let pointer = native.has_capability(Cap::Pointer);
    let has_switch = native.has_capability(Cap::Switch);
    DeviceCapabilities {
        keyboard,
        alphanumeric_keyboard: keyboard && has_alphanumeric_keys(native),
        pointer,
        touchpad: pointer
            && (native.config_tap_finger_count() > 0 || native.config_dwt_is_available()),
        touch: native.has_capability(Cap::Touch),
        tablet_tool: native.has_capability(Cap::TabletTool),
        tablet_pad: native.has_capability(Cap::TabletPad),
        tablet_mode_switch: has_switch
            && native.switch_has_switch(Switch::TabletMode).unwrap_or(false),
        lid_switch: has_switch && native.switch_has_switch(Switch::Lid).unwrap_or(false),
    }
}

fn has_alphanumeric_keys(native: &libinput::Device) -> bool {
    // KEY_1..=KEY_0, KEY_Q..=KEY_P, KEY_A..=KEY_L, KEY_Z..=KEY_M
    // per linux/input-event-codes.h
    let ranges = [2u32..=11, 16..=25, 30..=38, 44..=50];
    ranges
        .into_iter()
        .flatten()
        .all(|key| native.keyboard_has_key(key).unwrap_or(false))
}

fn apply_send_events(native: &mut libinput::Device, record: &DeviceHandle, enabled: bool) {
    let mode = if enabled {
        libinput::SendEventsMode::ENABLED
    } else {
        libinput::SendEventsMode::DISABLED
    };
    if native.config_send_events_set_mode(mode).is_err() {
        debug!("Device {:?} does not support toggling events", record.sysname());
        return;
    }
    record.set_enabled(enabled);
}

fn apply_profile(native: &mut libinput::Device, record: &DeviceHandle, profile: &DeviceProfile) {
    if let Some(enabled) = profile.enabled {
        apply_send_events(native, record, enabled);
    }
    if let Some(natural) = profile.natural_scroll {
        let _ = native.config_scroll_set_natural_scroll_enabled(natural);
    }
    if let Some(speed) = profile.accel_speed {
        let _ = native.config_accel_set_speed(speed.clamp(-1.0, 1.0));
    }
    if let Some(tap) = profile.tap_to_click {
        let _ = native.config_tap_set_enabled(tap);
    }
    if let Some(dwt) = profile.disable_while_typing {
        let _ = native.config_dwt_set_enabled(dwt);
    }
    if let Some(factor) = profile.scroll_factor {
        record.set_scroll_factor(factor);
    }
    record.set_output_name(
        profile
            .output_name
            .clone()
            .or_else(|| native.output_name().map(String::from)),
    );
    if let Some([x, y, w, h]) = profile.output_area {
        record.set_output_area(Some(Rectangle::new((x, y).into(), (w, h).into())));
    }
}
