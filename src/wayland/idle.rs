//! Per-seat idle timeouts for clients.
//!
//! This module implements the `org_kde_kwin_idle` global. Clients subscribe to a
//! timeout per seat; after the requested inactivity interval (clamped to a sane
//! minimum) the timeout object receives `idle`, and on the next activity `resumed`.
//! The compositor policy can suppress idling altogether with a refcounted
//! [inhibit](KdeIdleState::inhibit), and fake activity with
//! `simulate_user_activity` or [`KdeIdleState::simulate_user_activity`].
//!
//! ```no_run
//! # extern crate wayland_server;
//! use bellows::delegate_kde_idle;
//! use bellows::wayland::idle::{KdeIdleHandler, KdeIdleState};
//!
//! struct State { idle: KdeIdleState<Self> }
//! # let mut event_loop = calloop::EventLoop::<State>::try_new().unwrap();
//! # let mut display = wayland_server::Display::<State>::new().unwrap();
//! let state = State {
//!     idle: KdeIdleState::<State>::new(&display.handle(), event_loop.handle()),
//! };
//!
//! impl KdeIdleHandler for State {
//!     fn kde_idle_state(&mut self) -> &mut KdeIdleState<Self> {
//!         &mut self.idle
//!     }
//! }
//! delegate_kde_idle!(State);
//!
//! // on input you should notify the manager
//! // state.kde_idle_state().notify_activity(&seat);
//! ```

use std::collections::HashMap;
use std::sync::{
    atomic::{self, AtomicBool},
    Mutex,
};
use std::time::Duration;

use calloop::{timer::TimeoutAction, LoopHandle, RegistrationToken};
use tracing::{debug, warn};
use wayland_protocols_plasma::idle::server::{
    org_kde_kwin_idle::{self, OrgKdeKwinIdle},
    org_kde_kwin_idle_timeout::{self, OrgKdeKwinIdleTimeout},
};
use wayland_server::{
    backend::{ClientId, GlobalId},
    protocol::wl_seat::WlSeat,
    Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource,
};

const IDLE_VERSION: u32 = 1;

/// Timeouts below this are raised to it.
///
/// Clients asking for very short timeouts (including zero) would otherwise have the
/// compositor flip between idle and resumed on every event.
const MIN_IDLE_TIMEOUT: Duration = Duration::from_secs(5);

fn effective_timeout(timeout_ms: u32) -> Duration {
    std::cmp::max(Duration::from_millis(timeout_ms as u64), MIN_IDLE_TIMEOUT)
}

/// Handler trait for the idle-timeout global
pub trait KdeIdleHandler: Sized {
    /// [`KdeIdleState`] getter
    fn kde_idle_state(&mut self) -> &mut KdeIdleState<Self>;
}

/// User data of the [`OrgKdeKwinIdleTimeout`] resource
#[derive(Debug)]
pub struct IdleTimeoutUserData {
    seat: WlSeat,
    is_idle: AtomicBool,
    timeout: Duration,
    timer_token: Mutex<Option<RegistrationToken>>,
}

impl IdleTimeoutUserData {
    /// The inactivity interval of this subscription, after clamping
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn take_timer_token(&self) -> Option<RegistrationToken> {
        self.timer_token.lock().unwrap().take()
    }

    fn set_timer_token(&self, token: Option<RegistrationToken>) {
        *self.timer_token.lock().unwrap() = token;
    }

    fn set_idle(&self, idle: bool) {
        self.is_idle.store(idle, atomic::Ordering::Release);
    }

    fn is_idle(&self) -> bool {
        self.is_idle.load(atomic::Ordering::Acquire)
    }
}

/// State of the idle-timeout global
#[derive(Debug)]
pub struct KdeIdleState<D> {
    global: GlobalId,
    timeouts: HashMap<WlSeat, Vec<OrgKdeKwinIdleTimeout>>,
    loop_handle: LoopHandle<'static, D>,
    inhibit_count: u32,
}

impl<D: KdeIdleHandler + 'static> KdeIdleState<D> {
    /// Create a new `org_kde_kwin_idle` global
    pub fn new(display: &DisplayHandle, loop_handle: LoopHandle<'static, D>) -> Self
    where
        D: GlobalDispatch<OrgKdeKwinIdle, ()>,
        D: Dispatch<OrgKdeKwinIdle, ()>,
        D: Dispatch<OrgKdeKwinIdleTimeout, IdleTimeoutUserData>,
    {
        let global = display.create_global::<D, OrgKdeKwinIdle, _>(IDLE_VERSION, ());
        Self {
            global,
            timeouts: HashMap::new(),
            loop_handle,
            inhibit_count: 0,
        }
    }

    /// Returns the [`OrgKdeKwinIdle`] global
    pub fn global(&self) -> GlobalId {
        self.global.clone()
    }

    /// Suppress idle notifications.
    ///
    /// While the inhibition is held no `idle` is ever sent; subscribers that were
    /// already idle receive `resumed` immediately. Every call has to be balanced with
    /// [`uninhibit`](Self::uninhibit).
    pub fn inhibit(&mut self) {
        self.inhibit_count += 1;
        if self.inhibit_count > 1 {
            return;
        }
        debug!("Inhibiting idle timeouts");
        for timeout in self.timeouts.values().flatten() {
            let data = timeout.data::<IdleTimeoutUserData>().unwrap();
            if data.is_idle() {
                timeout.resumed();
                data.set_idle(false);
            }
            if let Some(token) = data.take_timer_token() {
                self.loop_handle.remove(token);
            }
        }
    }

    /// Drop one inhibition; on the last one all timers restart
    pub fn uninhibit(&mut self) {
        match self.inhibit_count.checked_sub(1) {
            Some(count) => self.inhibit_count = count,
            None => {
                warn!("Unbalanced idle uninhibit");
                return;
            }
        }
        if self.inhibit_count > 0 {
            return;
        }
        debug!("Resuming idle timeouts");
        let timeouts: Vec<_> = self.timeouts.values().flatten().cloned().collect();
        for timeout in timeouts {
            self.reinsert_timer(&timeout);
        }
    }

    /// Whether idle notifications are currently inhibited
    pub fn is_inhibited(&self) -> bool {
        self.inhibit_count > 0
    }

    /// Should be called whenever user activity occurs on a seat
    pub fn notify_activity(&mut self, seat: &WlSeat) {
        let Some(timeouts) = self.timeouts.get(seat) else {
            return;
        };
        for timeout in timeouts.clone() {
            let data = timeout.data::<IdleTimeoutUserData>().unwrap();
            if data.is_idle() {
                timeout.resumed();
                data.set_idle(false);
            }
            self.reinsert_timer(&timeout);
        }
    }

    /// Treat this moment as user activity on every seat, without any input having
    /// occurred
    pub fn simulate_user_activity(&mut self) {
        let seats: Vec<_> = self.timeouts.keys().cloned().collect();
        for seat in seats {
            self.notify_activity(&seat);
        }
    }

    fn reinsert_timer(&self, timeout: &OrgKdeKwinIdleTimeout) {
        let data = timeout.data::<IdleTimeoutUserData>().unwrap();

        if let Some(token) = data.take_timer_token() {
            self.loop_handle.remove(token);
        }

        if self.is_inhibited() {
            return;
        }

        let token = self
            .loop_handle
            .insert_source(calloop::timer::Timer::from_duration(data.timeout), {
                let timeout = timeout.clone();
                move |_, _, state| {
                    let data = timeout.data::<IdleTimeoutUserData>().unwrap();

                    if !state.kde_idle_state().is_inhibited() && !data.is_idle() {
                        timeout.idle();
                        data.set_idle(true);
                    }

                    data.set_timer_token(None);
                    TimeoutAction::Drop
                }
            });

        data.set_timer_token(token.ok());
    }
}

impl<D> GlobalDispatch<OrgKdeKwinIdle, (), D> for KdeIdleState<D>
where
    D: GlobalDispatch<OrgKdeKwinIdle, ()>,
    D: Dispatch<OrgKdeKwinIdle, ()>,
    D: Dispatch<OrgKdeKwinIdleTimeout, IdleTimeoutUserData>,
    D: KdeIdleHandler,
    D: 'static,
{
    fn bind(
        _state: &mut D,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<OrgKdeKwinIdle>,
        _global_data: &(),
        data_init: &mut DataInit<'_, D>,
    ) {
        data_init.init(resource, ());
    }
}

impl<D> Dispatch<OrgKdeKwinIdle, (), D> for KdeIdleState<D>
where
    D: GlobalDispatch<OrgKdeKwinIdle, ()>,
    D: Dispatch<OrgKdeKwinIdle, ()>,
    D: Dispatch<OrgKdeKwinIdleTimeout, IdleTimeoutUserData>,
    D: KdeIdleHandler,
    D: 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &OrgKdeKwinIdle,
        request: org_kde_kwin_idle::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            org_kde_kwin_idle::Request::GetIdleTimeout { id, seat, timeout } => {
                let timeout = data_init.init(
                    id,
                    IdleTimeoutUserData {
                        seat: seat.clone(),
                        is_idle: AtomicBool::new(false),
                        timeout: effective_timeout(timeout),
                        timer_token: Mutex::new(None),
                    },
                );

                let idle_state = state.kde_idle_state();
                idle_state.reinsert_timer(&timeout);
                idle_state.timeouts.entry(seat).or_default().push(timeout);
            }
            _ => unreachable!(),
        }
    }
}

impl<D> Dispatch<OrgKdeKwinIdleTimeout, IdleTimeoutUserData, D> for KdeIdleState<D>
where
    D: Dispatch<OrgKdeKwinIdleTimeout, IdleTimeoutUserData>,
    D: KdeIdleHandler,
    D: 'static,
{
    fn request(
        state: &mut D,
        _client: &Client,
        _resource: &OrgKdeKwinIdleTimeout,
        request: org_kde_kwin_idle_timeout::Request,
        data: &IdleTimeoutUserData,
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, D>,
    ) {
        match request {
            org_kde_kwin_idle_timeout::Request::SimulateUserActivity => {
                // activity is seat wide, not per subscription
                state.kde_idle_state().notify_activity(&data.seat);
            }
            org_kde_kwin_idle_timeout::Request::Release => {}
            _ => unreachable!(),
        }
    }

    fn destroyed(
        state: &mut D,
        _client: ClientId,
        timeout: &OrgKdeKwinIdleTimeout,
        data: &IdleTimeoutUserData,
    ) {
        let idle_state = state.kde_idle_state();
        if let Some(token) = data.take_timer_token() {
            idle_state.loop_handle.remove(token);
        }
        if let Some(timeouts) = idle_state.timeouts.get_mut(&data.seat) {
            timeouts.retain(|other| other != timeout);
        }
        idle_state
            .timeouts
            .retain(|seat, timeouts| !timeouts.is_empty() && seat.is_alive());
    }
}

/// Macro to delegate implementation of the kde idle protocol
#[macro_export]
macro_rules! delegate_kde_idle {
    ($(@<$( $lt:tt $( : $clt:tt $(+ $dlt:tt )* )? ),+>)? $ty: ty) => {
        type __OrgKdeKwinIdle =
            $crate::reexports::wayland_protocols_plasma::idle::server::org_kde_kwin_idle::OrgKdeKwinIdle;
        type __OrgKdeKwinIdleTimeout =
            $crate::reexports::wayland_protocols_plasma::idle::server::org_kde_kwin_idle_timeout::OrgKdeKwinIdleTimeout;

        $crate::reexports::wayland_server::delegate_global_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty:
            [
                __OrgKdeKwinIdle: ()
            ] => $crate::wayland::idle::KdeIdleState<$ty>
        );

        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty:
            [
                __OrgKdeKwinIdle: ()
            ] => $crate::wayland::idle::KdeIdleState<$ty>
        );

        $crate::reexports::wayland_server::delegate_dispatch!($(@< $( $lt $( : $clt $(+ $dlt )* )? ),+ >)? $ty:
            [
                __OrgKdeKwinIdleTimeout: $crate::wayland::idle::IdleTimeoutUserData
            ] => $crate::wayland::idle::KdeIdleState<$ty>
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_timeouts_clamp_to_the_minimum() {
        assert_eq!(effective_timeout(0), Duration::from_millis(5000));
        assert_eq!(effective_timeout(1), Duration::from_millis(5000));
        assert_eq!(effective_timeout(4999), Duration::from_millis(5000));
        assert_eq!(effective_timeout(5000), Duration::from_millis(5000));
        assert_eq!(effective_timeout(10_000), Duration::from_millis(10_000));
    }
}
