//! Implementation of the [`Session`] trait through libseat.
//!
//! This requires libseat to be available on the system.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    io,
    os::unix::io::{AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd},
    path::Path,
    rc::{Rc, Weak},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use calloop::{EventSource, Interest, Mode, Poll, PostAction, Readiness, Token, TokenFactory};
use libseat::Seat;
use rustix::fs::{FdFlags, OFlags};
use tracing::{debug, debug_span, error, trace};

use crate::backend::session::{AsErrno, Session, SessionEvent};

#[derive(Debug)]
struct LibSeatSessionImpl {
    seat: RefCell<Seat>,
    active: Arc<AtomicBool>,
    devices: RefCell<HashMap<RawFd, i32>>,
    span: tracing::Span,
}

impl Drop for LibSeatSessionImpl {
    fn drop(&mut self) {
        let _guard = self.span.enter();
        debug!("Closing seat");
    }
}

/// [`Session`] via libseat
#[derive(Debug, Clone)]
pub struct LibSeatSession {
    internal: Weak<LibSeatSessionImpl>,
    seat_name: String,
}

/// Event source yielding the activate/pause edges of a [`LibSeatSession`].
///
/// Has to be inserted into the event loop of the thread driving the session, otherwise
/// no enable/disable notifications are ever delivered and the seat daemon will consider
/// the client stuck.
#[derive(Debug)]
pub struct LibSeatSessionNotifier {
    internal: Rc<LibSeatSessionImpl>,
    pending: Rc<RefCell<VecDeque<SessionEvent>>>,
    token: Option<Token>,
}

impl LibSeatSession {
    /// Tries to create a new session via libseat.
    pub fn new() -> Result<(LibSeatSession, LibSeatSessionNotifier), Error> {
        let span = debug_span!("backend_session", session_type = "libseat");
        let _guard = span.enter();

        let active = Arc::new(AtomicBool::new(false));
        let pending = Rc::new(RefCell::new(VecDeque::new()));

        let seat = {
            let enable = {
                let active = active.clone();
                let pending = pending.clone();
                move |_seat: &mut libseat::SeatRef| {
                    debug!("Enable callback called");
                    active.store(true, Ordering::SeqCst);
                    pending.borrow_mut().push_back(SessionEvent::ActivateSession);
                }
            };
            let disable = {
                let active = active.clone();
                let pending = pending.clone();
                move |seat: &mut libseat::SeatRef| {
                    debug!("Disable callback called");
                    active.store(false, Ordering::SeqCst);
                    if let Err(err) = seat.disable() {
                        error!("Failed to acknowledge seat disable: {:?}", err);
                    }
                    pending.borrow_mut().push_back(SessionEvent::PauseSession);
                }
            };

            Seat::open(enable, disable)
        };

        drop(_guard);
        seat.map_err(|_| Error::FailedToOpenSession)
            .and_then(|mut seat| {
                // In some cases the enable event is available right after startup,
                // dispatch it before anything else asks for the session state
                seat.dispatch(0).map_err(|_| Error::SessionLost)?;

                let seat_name = seat.name().to_owned();

                let internal = Rc::new(LibSeatSessionImpl {
                    seat: RefCell::new(seat),
                    active,
                    devices: RefCell::new(HashMap::new()),
                    span,
                });

                Ok((
                    LibSeatSession {
                        internal: Rc::downgrade(&internal),
                        seat_name,
                    },
                    LibSeatSessionNotifier {
                        internal,
                        pending,
                        token: None,
                    },
                ))
            })
    }
}

impl Session for LibSeatSession {
    type Error = Error;

    fn open(&mut self, path: &Path, flags: OFlags) -> Result<OwnedFd, Self::Error> {
        let session = self.internal.upgrade().ok_or(Error::SessionLost)?;
        let _guard = session.span.enter();

        debug!("Opening device: {:?}", path);
        let (id, fd) = session.seat.borrow_mut().open_device(&path).map_err(|err| {
            debug!("Failed to open {:?}: {:?}", path, err);
            Error::FailedToOpenDevice
        })?;

        // Safety: libseat transferred ownership of the descriptor to us
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        // The opener is not required to honor the flags the caller asked for,
        // re-apply the ones we rely on
        reapply_flags(&fd, flags).map_err(Error::DeviceFlags)?;

        session.devices.borrow_mut().insert(fd.as_raw_fd(), id);
        Ok(fd)
    }

    fn close(&mut self, fd: OwnedFd) -> Result<(), Self::Error> {
        let session = self.internal.upgrade().ok_or(Error::SessionLost)?;
        let _guard = session.span.enter();

        debug!("Closing device: {:?}", fd);
        let id = session.devices.borrow_mut().remove(&fd.as_raw_fd());
        if let Some(id) = id {
            if let Err(err) = session.seat.borrow_mut().close_device(id) {
                error!("Failed to close device {:?}: {:?}", fd, err);
            }
        }

        // dropping the fd closes it
        Ok(())
    }

    fn change_vt(&mut self, vt: i32) -> Result<(), Self::Error> {
        let session = self.internal.upgrade().ok_or(Error::SessionLost)?;
        let _guard = session.span.enter();

        debug!("Session switch: {:?}", vt);
        session
            .seat
            .borrow_mut()
            .switch_session(vt)
            .map_err(|_| Error::FailedVtSwitch)
    }

    fn is_active(&self) -> bool {
        if let Some(internal) = self.internal.upgrade() {
            internal.active.load(Ordering::SeqCst)
        } else {
            false
        }
    }

    fn seat(&self) -> String {
        self.seat_name.clone()
    }
}

fn reapply_flags(fd: &OwnedFd, flags: OFlags) -> rustix::io::Result<()> {
    if flags.contains(OFlags::NONBLOCK) {
        let current = rustix::fs::fcntl_getfl(fd)?;
        rustix::fs::fcntl_setfl(fd, current | OFlags::NONBLOCK)?;
    }
    if flags.contains(OFlags::CLOEXEC) {
        rustix::fs::fcntl_setfd(fd, FdFlags::CLOEXEC)?;
    }
    Ok(())
}

impl LibSeatSessionNotifier {
    /// Creates a new session handle belonging to this notifier
    pub fn session(&self) -> LibSeatSession {
        LibSeatSession {
            internal: Rc::downgrade(&self.internal),
            seat_name: self.internal.seat.borrow_mut().name().to_owned(),
        }
    }
}

impl EventSource for LibSeatSessionNotifier {
    type Event = SessionEvent;
    type Metadata = ();
    type Ret = ();
    type Error = io::Error;

    fn process_events<F>(&mut self, _: Readiness, token: Token, mut callback: F) -> io::Result<PostAction>
    where
        F: FnMut(SessionEvent, &mut ()) -> (),
    {
        if Some(token) == self.token {
            self.internal.seat.borrow_mut().dispatch(0).map_err(|err| {
                // Losing the seat connection is not recoverable
                io::Error::new(io::ErrorKind::Other, format!("lost seat connection: {err:?}"))
            })?;
            while let Some(event) = self.pending.borrow_mut().pop_front() {
                trace!("Session event: {:?}", event);
                callback(event, &mut ());
            }
        }
        Ok(PostAction::Continue)
    }

    fn register(&mut self, poll: &mut Poll, factory: &mut TokenFactory) -> calloop::Result<()> {
        self.token = Some(factory.token());
        let fd = self
            .internal
            .seat
            .borrow_mut()
            .get_fd()
            .map_err(|err| calloop::Error::OtherError(Box::new(io::Error::new(
                io::ErrorKind::Other,
                format!("no seat fd: {err:?}"),
            ))))?;
        // Safety: the seat outlives its registration, the notifier holds it alive
        unsafe { poll.register(BorrowedFd::borrow_raw(fd), Interest::READ, Mode::Level, self.token.unwrap()) }
    }

    fn reregister(&mut self, poll: &mut Poll, factory: &mut TokenFactory) -> calloop::Result<()> {
        self.token = Some(factory.token());
        let fd = self
            .internal
            .seat
            .borrow_mut()
            .get_fd()
            .map_err(|err| calloop::Error::OtherError(Box::new(io::Error::new(
                io::ErrorKind::Other,
                format!("no seat fd: {err:?}"),
            ))))?;
        poll.reregister(
            unsafe { BorrowedFd::borrow_raw(fd) },
            Interest::READ,
            Mode::Level,
            self.token.unwrap(),
        )
    }

    fn unregister(&mut self, poll: &mut Poll) -> calloop::Result<()> {
        self.token = None;
        let fd = self
            .internal
            .seat
            .borrow_mut()
            .get_fd()
            .map_err(|err| calloop::Error::OtherError(Box::new(io::Error::new(
                io::ErrorKind::Other,
                format!("no seat fd: {err:?}"),
            ))))?;
        poll.unregister(unsafe { BorrowedFd::borrow_raw(fd) })
    }
}

/// Errors related to libseat sessions
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Failed to open the session
    #[error("Failed to open session")]
    FailedToOpenSession,

    /// Session is already closed
    #[error("Session is already closed")]
    SessionLost,

    /// The seat refused to open the device
    #[error("Failed to open device")]
    FailedToOpenDevice,

    /// Re-applying the open flags on an opened device failed
    #[error("Failed to apply flags on the opened device")]
    DeviceFlags(#[source] rustix::io::Errno),

    /// The seat refused to switch the session
    #[error("Failed to switch virtual terminal")]
    FailedVtSwitch,
}

impl AsErrno for Error {
    fn as_errno(&self) -> Option<i32> {
        match self {
            Error::DeviceFlags(errno) => Some(errno.raw_os_error()),
            _ => None,
        }
    }
}
