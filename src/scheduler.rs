// BLE Energy - Radio energy accounting for simulated BLE devices
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Simulated time and event scheduling
//!
//! The energy model only needs a clock and the ability to schedule and
//! cancel future callbacks; [`Scheduler`] is that seam. [`Simulator`] is a
//! single-threaded discrete-event implementation of it, and [`Timer`] wraps
//! a scheduler into a slot holding at most one outstanding event.

use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::error::Result;

/// Callback run by the scheduler at its due time
pub type Event = Box<dyn FnOnce() -> Result<()>>;

/// Handle to a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    /// Wrap a raw id issued by a [`Scheduler`] implementation
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Source of simulated time and future callbacks
pub trait Scheduler {
    /// Current simulated time, measured from the start of the run
    fn now(&self) -> Duration;

    /// Run `event` once, `delay` after now
    fn schedule(&self, delay: Duration, event: Event) -> EventId;

    /// Drop a scheduled event. No-op if it already ran or was cancelled.
    fn cancel(&self, id: EventId);

    /// Check whether the event is still waiting to run
    fn is_pending(&self, id: EventId) -> bool;
}

/// Single-slot timer
///
/// Arming cancels whatever the slot held before, so at most one event of
/// this timer is ever outstanding. Dropping the timer cancels its event.
pub struct Timer {
    scheduler: Rc<dyn Scheduler>,
    slot: Cell<Option<EventId>>,
}

impl Timer {
    /// Create an empty timer on `scheduler`
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            slot: Cell::new(None),
        }
    }

    /// Cancel the outstanding event, then schedule `event` after `delay`
    pub fn arm(&self, delay: Duration, event: Event) {
        self.cancel();
        let id = self.scheduler.schedule(delay, event);
        self.slot.set(Some(id));
    }

    /// Cancel the outstanding event, if any
    pub fn cancel(&self) {
        if let Some(id) = self.slot.take() {
            self.scheduler.cancel(id);
        }
    }

    /// Check whether an armed event is still waiting to fire
    pub fn is_pending(&self) -> bool {
        self.slot
            .get()
            .map_or(false, |id| self.scheduler.is_pending(id))
    }

    /// Current simulated time of the underlying scheduler
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("slot", &self.slot.get())
            .field("pending", &self.is_pending())
            .finish()
    }
}

/// Discrete-event simulator
///
/// Events run in non-decreasing time order, ties in scheduling order.
/// An event returning an error stops the run and the error is handed back
/// to the caller of [`step`](Self::step) / [`run`](Self::run).
#[derive(Default)]
pub struct Simulator {
    now: Cell<Duration>,
    next_id: Cell<u64>,
    queue: RefCell<BinaryHeap<Reverse<(Duration, u64)>>>,
    events: RefCell<HashMap<u64, Event>>,
}

impl Simulator {
    /// Create a simulator at time zero
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Number of events still waiting to run
    pub fn pending_events(&self) -> usize {
        self.events.borrow().len()
    }

    /// Due time of the next live event
    pub fn next_event_time(&self) -> Option<Duration> {
        self.discard_cancelled();
        self.queue.borrow().peek().map(|Reverse((at, _))| *at)
    }

    /// Run the next event
    ///
    /// Returns `Ok(false)` when nothing is left to run.
    pub fn step(&self) -> Result<bool> {
        loop {
            let Some(Reverse((at, id))) = self.queue.borrow_mut().pop() else {
                return Ok(false);
            };
            let event = self.events.borrow_mut().remove(&id);
            if let Some(event) = event {
                self.now.set(at);
                event()?;
                return Ok(true);
            }
        }
    }

    /// Run until no event is left
    pub fn run(&self) -> Result<()> {
        while self.step()? {}
        Ok(())
    }

    /// Run every event due at or before `end`, then advance the clock to `end`
    pub fn run_until(&self, end: Duration) -> Result<()> {
        while let Some(at) = self.next_event_time() {
            if at > end {
                break;
            }
            self.step()?;
        }
        if end > self.now.get() {
            self.now.set(end);
        }
        Ok(())
    }

    /// Advance the clock by `delay`, running everything due on the way
    pub fn advance(&self, delay: Duration) -> Result<()> {
        self.run_until(self.now.get().saturating_add(delay))
    }

    fn discard_cancelled(&self) {
        let mut queue = self.queue.borrow_mut();
        let events = self.events.borrow();
        while let Some(Reverse((_, id))) = queue.peek() {
            if events.contains_key(id) {
                break;
            }
            queue.pop();
        }
    }
}

impl Scheduler for Simulator {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn schedule(&self, delay: Duration, event: Event) -> EventId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        match self.now.get().checked_add(delay) {
            Some(at) => {
                self.queue.borrow_mut().push(Reverse((at, id)));
                self.events.borrow_mut().insert(id, event);
            }
            None => log::debug!("event {} lies beyond the end of time, never fires", id),
        }
        EventId(id)
    }

    fn cancel(&self, id: EventId) {
        // Dropped after the borrow is released: the closure may own timers.
        let _cancelled = self.events.borrow_mut().remove(&id.0);
    }

    fn is_pending(&self, id: EventId) -> bool {
        self.events.borrow().contains_key(&id.0)
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("now", &self.now.get())
            .field("pending_events", &self.pending_events())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EnergyError;

    fn recorder() -> Rc<RefCell<Vec<(u32, Duration)>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn record(sim: &Rc<Simulator>, log: &Rc<RefCell<Vec<(u32, Duration)>>>, tag: u32) -> Event {
        let sim = Rc::clone(sim);
        let log = Rc::clone(log);
        Box::new(move || {
            log.borrow_mut().push((tag, sim.now()));
            Ok(())
        })
    }

    #[test]
    fn test_events_run_in_time_order() {
        let sim = Simulator::new();
        let log = recorder();
        sim.schedule(Duration::from_secs(3), record(&sim, &log, 3));
        sim.schedule(Duration::from_secs(1), record(&sim, &log, 1));
        sim.schedule(Duration::from_secs(2), record(&sim, &log, 2));
        sim.run().unwrap();

        let tags: Vec<u32> = log.borrow().iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![1, 2, 3]);
        assert_eq!(sim.now(), Duration::from_secs(3));
    }

    #[test]
    fn test_ties_run_in_scheduling_order() {
        let sim = Simulator::new();
        let log = recorder();
        for tag in 0..5 {
            sim.schedule(Duration::from_millis(10), record(&sim, &log, tag));
        }
        sim.run().unwrap();
        let tags: Vec<u32> = log.borrow().iter().map(|(t, _)| *t).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let sim = Simulator::new();
        let log = recorder();
        let id = sim.schedule(Duration::from_secs(1), record(&sim, &log, 1));
        assert!(sim.is_pending(id));
        sim.cancel(id);
        sim.cancel(id);
        assert!(!sim.is_pending(id));
        sim.run().unwrap();
        assert!(log.borrow().is_empty());
        // Cancelling an event that already ran is a no-op too
        let id = sim.schedule(Duration::ZERO, record(&sim, &log, 2));
        sim.run().unwrap();
        sim.cancel(id);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_run_until_stops_and_advances_clock() {
        let sim = Simulator::new();
        let log = recorder();
        sim.schedule(Duration::from_secs(1), record(&sim, &log, 1));
        sim.schedule(Duration::from_secs(5), record(&sim, &log, 5));
        sim.run_until(Duration::from_secs(3)).unwrap();
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(sim.now(), Duration::from_secs(3));
        assert_eq!(sim.pending_events(), 1);

        sim.advance(Duration::from_secs(2)).unwrap();
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(log.borrow()[1], (5, Duration::from_secs(5)));
    }

    #[test]
    fn test_failing_event_stops_run() {
        let sim = Simulator::new();
        let log = recorder();
        sim.schedule(
            Duration::from_secs(1),
            Box::new(|| Err(EnergyError::MissingCallback("test"))),
        );
        sim.schedule(Duration::from_secs(2), record(&sim, &log, 2));
        let err = sim.run().unwrap_err();
        assert_eq!(err, EnergyError::MissingCallback("test"));
        assert!(log.borrow().is_empty());
        assert_eq!(sim.now(), Duration::from_secs(1));
    }

    #[test]
    fn test_overflowing_delay_never_fires() {
        let sim = Simulator::new();
        sim.run_until(Duration::from_secs(1)).unwrap();
        let id = sim.schedule(Duration::MAX, Box::new(|| Ok(())));
        assert!(!sim.is_pending(id));
        assert_eq!(sim.pending_events(), 0);
    }

    #[test]
    fn test_timer_rearm_cancels_previous() {
        let sim = Simulator::new();
        let log = recorder();
        let timer = Timer::new(sim.clone());
        timer.arm(Duration::from_secs(1), record(&sim, &log, 1));
        timer.arm(Duration::from_secs(2), record(&sim, &log, 2));
        assert!(timer.is_pending());
        assert_eq!(sim.pending_events(), 1);
        sim.run().unwrap();
        assert_eq!(*log.borrow(), vec![(2, Duration::from_secs(2))]);
        assert!(!timer.is_pending());
    }

    #[test]
    fn test_timer_drop_cancels() {
        let sim = Simulator::new();
        let log = recorder();
        {
            let timer = Timer::new(sim.clone());
            timer.arm(Duration::from_secs(1), record(&sim, &log, 1));
        }
        assert_eq!(sim.pending_events(), 0);
        sim.run().unwrap();
        assert!(log.borrow().is_empty());
    }
}
