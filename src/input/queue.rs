//! The queue between the input worker and the compositor thread.
//!
//! The worker pushes translated events under the queue mutex and wakes the compositor
//! loop through a [`Ping`], only on the transition from empty to non-empty. The
//! compositor drains until the queue is empty; the mutex is held for individual pushes
//! and pops only, never across a callback.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use calloop::ping::{make_ping, Ping, PingSource};

use crate::input::event::InputEvent;

/// Queue of translated input events crossing the worker boundary.
///
/// Cheap to share: the producing worker and the draining compositor thread both hold an
/// `Arc` of it.
#[derive(Debug)]
pub struct EventQueue {
    events: Mutex<VecDeque<InputEvent>>,
    ping: Ping,
}

impl EventQueue {
    /// Create a new queue.
    ///
    /// The returned [`PingSource`] has to be inserted into the compositor's event loop;
    /// it fires whenever the queue becomes non-empty and the callback is expected to
    /// [drain](Self::dispatch) the queue completely.
    pub fn new() -> io::Result<(Arc<EventQueue>, PingSource)> {
        let (ping, source) = make_ping()?;
        Ok((
            Arc::new(EventQueue {
                events: Mutex::new(VecDeque::new()),
                ping,
            }),
            source,
        ))
    }

    /// Append a single event
    pub fn push(&self, event: InputEvent) {
        self.extend(std::iter::once(event));
    }

    /// Append a batch of events, waking the consumer once
    pub fn extend(&self, events: impl IntoIterator<Item = InputEvent>) {
        let wake = {
            let mut queue = self.events.lock().unwrap();
            let was_empty = queue.is_empty();
            queue.extend(events);
            was_empty && !queue.is_empty()
        };
        if wake {
            self.ping.ping();
        }
    }

    /// Whether the queue currently holds no events
    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }

    /// Number of queued events
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Drain the queue, invoking `callback` for every event, until it is empty.
    ///
    /// Consecutive relative pointer-motion events at the head of the queue are folded
    /// into a single event: the accelerated and unaccelerated deltas are summed and the
    /// timestamp advances to the one of the last folded event. Motion of *any* device
    /// folds into the running event; any other event type stops the folding. No other
    /// event type is ever coalesced.
    #[profiling::function]
    pub fn dispatch(&self, mut callback: impl FnMut(InputEvent)) {
        loop {
            let event = {
                let mut queue = self.events.lock().unwrap();
                match queue.pop_front() {
                    None => break,
                    Some(InputEvent::PointerMotion { mut event }) => {
                        while let Some(InputEvent::PointerMotion { .. }) = queue.front() {
                            let Some(InputEvent::PointerMotion { event: next }) = queue.pop_front()
                            else {
                                break;
                            };
                            event.delta += next.delta;
                            event.delta_unaccel += next.delta_unaccel;
                            event.time = next.time;
                        }
                        InputEvent::PointerMotion { event }
                    }
                    Some(event) => event,
                }
            };
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::EventQueue;
    use crate::input::device::{DeviceCapabilities, DeviceHandle, InputDevice};
    use crate::input::event::{InputEvent, PointerButtonEvent, PointerMotionEvent, ButtonState};

    fn pointer() -> DeviceHandle {
        InputDevice::new_virtual(
            "test pointer",
            DeviceCapabilities {
                pointer: true,
                ..Default::default()
            },
        )
    }

    fn motion(device: &DeviceHandle, time: u64, dx: f64, dy: f64) -> InputEvent {
        InputEvent::PointerMotion {
            event: PointerMotionEvent {
                device: device.clone(),
                time,
                delta: (dx, dy).into(),
                delta_unaccel: (dx, dy).into(),
            },
        }
    }

    fn button(device: &DeviceHandle, time: u64) -> InputEvent {
        InputEvent::PointerButton {
            event: PointerButtonEvent {
                device: device.clone(),
                time,
                button: 0x110,
                state: ButtonState::Pressed,
            },
        }
    }

    #[test]
    fn consecutive_motion_coalesces() {
        let (queue, _source) = EventQueue::new().unwrap();
        let device = pointer();
        queue.extend([
            motion(&device, 1, 1.0, 0.0),
            motion(&device, 2, 2.0, 0.0),
            motion(&device, 3, 0.0, 1.0),
            motion(&device, 4, 1.0, 1.0),
            motion(&device, 5, -1.0, 0.0),
        ]);

        let mut seen = Vec::new();
        queue.dispatch(|event| seen.push(event));

        assert_eq!(seen.len(), 1);
        let InputEvent::PointerMotion { event } = &seen[0] else {
            panic!("expected a motion event");
        };
        assert_eq!(event.delta, (3.0, 2.0).into());
        assert_eq!(event.delta_unaccel, (3.0, 2.0).into());
        assert_eq!(event.time, 5);
    }

    #[test]
    fn coalesces_across_devices() {
        // motion of any device folds; the folded event keeps the first device
        let (queue, _source) = EventQueue::new().unwrap();
        let first = pointer();
        let second = pointer();
        queue.extend([motion(&first, 1, 1.0, 1.0), motion(&second, 2, 2.0, 2.0)]);

        let mut seen = Vec::new();
        queue.dispatch(|event| seen.push(event));

        assert_eq!(seen.len(), 1);
        let InputEvent::PointerMotion { event } = &seen[0] else {
            panic!("expected a motion event");
        };
        assert_eq!(event.delta, (3.0, 3.0).into());
        assert!(Arc::ptr_eq(&event.device, &first));
    }

    #[test]
    fn non_motion_stops_folding() {
        let (queue, _source) = EventQueue::new().unwrap();
        let device = pointer();
        queue.extend([
            motion(&device, 1, 1.0, 0.0),
            button(&device, 2),
            motion(&device, 3, 5.0, 0.0),
            motion(&device, 4, 5.0, 0.0),
        ]);

        let mut kinds = Vec::new();
        queue.dispatch(|event| {
            kinds.push(match event {
                InputEvent::PointerMotion { event } => ("motion", event.delta.x as i32),
                InputEvent::PointerButton { .. } => ("button", 0),
                _ => ("other", 0),
            })
        });

        assert_eq!(kinds, vec![("motion", 1), ("button", 0), ("motion", 10)]);
    }

    #[test]
    fn wake_fires_on_empty_to_non_empty_edge_only() {
        let mut event_loop: calloop::EventLoop<'_, u32> = calloop::EventLoop::try_new().unwrap();
        let (queue, source) = EventQueue::new().unwrap();
        event_loop
            .handle()
            .insert_source(source, |_, _, wakeups| *wakeups += 1)
            .unwrap();

        let device = pointer();
        let mut wakeups = 0;

        queue.push(motion(&device, 1, 1.0, 0.0));
        queue.push(motion(&device, 2, 1.0, 0.0)); // queue already non-empty, no second wake
        event_loop
            .dispatch(Some(Duration::from_millis(100)), &mut wakeups)
            .unwrap();
        assert_eq!(wakeups, 1);

        queue.dispatch(|_| {});
        queue.push(motion(&device, 3, 1.0, 0.0));
        event_loop
            .dispatch(Some(Duration::from_millis(100)), &mut wakeups)
            .unwrap();
        assert_eq!(wakeups, 2);
    }
}
