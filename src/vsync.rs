//! Software vblank source.
//!
//! Render backends without a hardware vblank signal (nested outputs, virtual outputs,
//! headless tests) still need a frame cadence. The monitor produces synthetic vblank
//! timestamps aligned to multiples of the refresh interval on the monotonic clock, so
//! the reported timestamps are evenly spaced even when `arm()` is called at arbitrary
//! points of the frame.

use std::num::NonZeroU32;
use std::time::Duration;

use calloop::timer::{TimeoutAction, Timer};
use calloop::{LoopHandle, RegistrationToken};
use tracing::{trace, warn};

use crate::utils::clock::{Clock, Monotonic};

/// Handler trait for the vsync monitor
pub trait VsyncHandler: Sized {
    /// [`SoftwareVsyncMonitor`] getter
    fn vsync_monitor(&mut self) -> &mut SoftwareVsyncMonitor<Self>;

    /// A synthetic vblank occurred.
    ///
    /// `timestamp` is the predicted presentation time on the monotonic clock, not the
    /// time the timer actually fired.
    fn vblank(&mut self, timestamp: Duration);
}

/// Produces aligned synthetic vblank events at a declared refresh rate.
#[derive(Debug)]
pub struct SoftwareVsyncMonitor<D> {
    loop_handle: LoopHandle<'static, D>,
    clock: Clock<Monotonic>,
    refresh: NonZeroU32,
    pending: Option<RegistrationToken>,
    last_vblank: Option<u64>,
    next_vblank: Option<Duration>,
}

impl<D: VsyncHandler + 'static> SoftwareVsyncMonitor<D> {
    /// Create a monitor ticking at the given refresh rate in millihertz
    pub fn new(loop_handle: LoopHandle<'static, D>, refresh: NonZeroU32) -> Self {
        SoftwareVsyncMonitor {
            loop_handle,
            clock: Clock::new(),
            refresh,
            pending: None,
            last_vblank: None,
            next_vblank: None,
        }
    }

    /// Declared refresh rate in millihertz
    pub fn refresh_rate(&self) -> NonZeroU32 {
        self.refresh
    }

    /// Change the declared refresh rate in millihertz.
    ///
    /// An already pending alarm is not rescheduled.
    pub fn set_refresh_rate(&mut self, refresh: NonZeroU32) {
        self.refresh = refresh;
    }

    /// Whether an alarm is currently pending
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// The timestamp the pending alarm will report, if one is pending
    pub fn predicted_vblank(&self) -> Option<Duration> {
        self.next_vblank
    }

    /// Schedule the next synthetic vblank.
    ///
    /// No-op while an alarm is already pending. The vblank timestamp is the next
    /// multiple of the refresh interval at or after the current time, and always at
    /// least one interval after the previously reported vblank.
    pub fn arm(&mut self) {
        if self.pending.is_some() {
            return;
        }

        let interval = interval_ns(self.refresh);
        let now = self.clock.now().as_nanos();
        let next = next_vblank(now, interval, self.last_vblank);
        let timestamp = Duration::from_nanos(next);
        trace!(?timestamp, "Arming software vsync");

        let timer = Timer::from_duration(Duration::from_nanos(next - now));
        let token = self.loop_handle.insert_source(timer, move |_, _, state: &mut D| {
            let monitor = state.vsync_monitor();
            monitor.pending = None;
            monitor.next_vblank = None;
            monitor.last_vblank = Some(next);
            state.vblank(timestamp);
            TimeoutAction::Drop
        });
        match token {
            Ok(token) => {
                self.pending = Some(token);
                self.next_vblank = Some(timestamp);
            }
            Err(err) => warn!("Failed to arm the vsync timer: {}", err),
        }
    }
}

fn interval_ns(refresh: NonZeroU32) -> u64 {
    // refresh is in millihertz
    1_000_000_000_000u64 / refresh.get() as u64
}

// Align up to a multiple of the interval from the clock epoch, with a zero offset when
// already aligned. The alignment is best effort across restarts; the spacing to the
// previous vblank is what is guaranteed.
fn next_vblank(now: u64, interval: u64, last_vblank: Option<u64>) -> u64 {
    let aligned = now + ((interval - (now % interval)) % interval);
    match last_vblank {
        Some(last) if aligned < last + interval => last + interval,
        _ => aligned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL_60HZ: u64 = interval_ns_for_test(60_000);

    const fn interval_ns_for_test(refresh_mhz: u32) -> u64 {
        1_000_000_000_000u64 / refresh_mhz as u64
    }

    #[test]
    fn sixty_hertz_interval() {
        assert_eq!(INTERVAL_60HZ, 16_666_666);
    }

    #[test]
    fn aligned_time_is_kept() {
        let now = 5 * INTERVAL_60HZ;
        assert_eq!(next_vblank(now, INTERVAL_60HZ, None), now);
    }

    #[test]
    fn unaligned_time_rounds_up() {
        let now = 5 * INTERVAL_60HZ + 123;
        assert_eq!(next_vblank(now, INTERVAL_60HZ, None), 6 * INTERVAL_60HZ);
    }

    #[test]
    fn consecutive_vblanks_are_at_least_one_interval_apart() {
        let first = next_vblank(5 * INTERVAL_60HZ, INTERVAL_60HZ, None);
        // re-armed immediately after the fire, the clock barely moved
        let second = next_vblank(first + 1, INTERVAL_60HZ, Some(first));
        assert!(second >= first + INTERVAL_60HZ);

        // even with a clock that did not move at all
        let stuck = next_vblank(first, INTERVAL_60HZ, Some(first));
        assert_eq!(stuck, first + INTERVAL_60HZ);
    }

    #[test]
    fn fires_with_spaced_timestamps() {
        struct State {
            monitor: Option<SoftwareVsyncMonitor<State>>,
            fired: Vec<Duration>,
        }

        impl VsyncHandler for State {
            fn vsync_monitor(&mut self) -> &mut SoftwareVsyncMonitor<Self> {
                self.monitor.as_mut().unwrap()
            }

            fn vblank(&mut self, timestamp: Duration) {
                self.fired.push(timestamp);
            }
        }

        let mut event_loop: calloop::EventLoop<'static, State> =
            calloop::EventLoop::try_new().unwrap();
        // 1 kHz to keep the test fast
        let monitor = SoftwareVsyncMonitor::new(
            event_loop.handle(),
            NonZeroU32::new(1_000_000).unwrap(),
        );
        let mut state = State {
            monitor: Some(monitor),
            fired: Vec::new(),
        };

        state.vsync_monitor().arm();
        state.vsync_monitor().arm(); // pending alarm, no-op
        while state.fired.is_empty() {
            event_loop
                .dispatch(Some(Duration::from_millis(10)), &mut state)
                .unwrap();
        }
        assert_eq!(state.fired.len(), 1);

        state.vsync_monitor().arm();
        while state.fired.len() < 2 {
            event_loop
                .dispatch(Some(Duration::from_millis(10)), &mut state)
                .unwrap();
        }

        let interval = Duration::from_nanos(interval_ns_for_test(1_000_000));
        assert!(state.fired[1] >= state.fired[0] + interval);
    }
}
