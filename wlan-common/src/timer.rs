// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Single-shot timers with invalidation by event id.
//!
//! Timers are never truly cancelled at the source: cancelling (or
//! superseding) a timer removes its id from the event map, so when the stale
//! firing arrives [`Timer::triggered`] resolves to `None` and the caller
//! treats it as a no-op.

use {
    crate::time::{Duration, Time},
    std::collections::HashMap,
};

#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone)]
pub struct EventId(pub u64);

/// The scheduling primitive the surrounding event loop provides. Requests to
/// fire at `deadline` return a unique id used to invalidate the request.
pub trait Scheduler {
    fn schedule(&mut self, deadline: Time) -> EventId;
    fn cancel(&mut self, id: EventId);
    /// Current time on the scheduler's monotonic clock.
    fn now(&self) -> Time;
}

/// Implemented by event types carrying their own timeout duration.
pub trait TimeoutDuration {
    fn timeout_duration(&self) -> Duration;
}

/// A timer to schedule and cancel timeouts and retrieve triggered events.
pub struct Timer<E> {
    events: HashMap<EventId, E>,
    scheduler: Box<dyn Scheduler>,
}

impl<E> Timer<E> {
    pub fn new(scheduler: Box<dyn Scheduler>) -> Self {
        Self { events: HashMap::default(), scheduler }
    }

    pub fn now(&self) -> Time {
        self.scheduler.now()
    }

    /// Resolves a fired event id to its event. A stale id (cancelled,
    /// superseded, or already consumed) resolves to `None`.
    pub fn triggered(&mut self, event_id: &EventId) -> Option<E> {
        self.events.remove(event_id)
    }

    pub fn schedule_event(&mut self, deadline: Time, event: E) -> EventId {
        let event_id = self.scheduler.schedule(deadline);
        self.events.insert(event_id, event);
        event_id
    }

    pub fn schedule_after(&mut self, duration: Duration, event: E) -> EventId {
        let deadline = self.scheduler.now() + duration;
        self.schedule_event(deadline, event)
    }

    pub fn schedule<T>(&mut self, event: T) -> EventId
    where
        T: TimeoutDuration + Into<E>,
    {
        let duration = event.timeout_duration();
        self.schedule_after(duration, event.into())
    }

    pub fn cancel_event(&mut self, event_id: EventId) {
        self.events.remove(&event_id);
        self.scheduler.cancel(event_id);
    }

    pub fn cancel_all(&mut self) {
        for (event_id, _event) in &self.events {
            self.scheduler.cancel(*event_id);
        }
        self.events.clear();
    }
}

pub use fake_scheduler::FakeScheduler;

/// Deterministic scheduler for tests: time only moves when told to.
pub mod fake_scheduler {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    #[derive(Default)]
    struct Inner {
        next_id: u64,
        now: Time,
        scheduled: Vec<(EventId, Time)>,
    }

    /// Cloning shares the underlying state, so a test can keep a handle while
    /// a `Timer` owns another.
    #[derive(Clone, Default)]
    pub struct FakeScheduler {
        inner: Rc<RefCell<Inner>>,
    }

    impl FakeScheduler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn as_scheduler(&self) -> Box<dyn Scheduler> {
            Box::new(self.clone())
        }

        pub fn set_time(&self, time: Time) {
            self.inner.borrow_mut().now = time;
        }

        pub fn increment_time(&self, duration: Duration) {
            let mut inner = self.inner.borrow_mut();
            let now = inner.now;
            inner.now = now + duration;
        }

        /// Removes and returns the earliest pending request, advancing the
        /// clock to its deadline.
        pub fn next_event(&self) -> Option<EventId> {
            let mut inner = self.inner.borrow_mut();
            let idx = inner
                .scheduled
                .iter()
                .enumerate()
                .min_by_key(|(_, (_, deadline))| *deadline)
                .map(|(idx, _)| idx)?;
            let (id, deadline) = inner.scheduled.remove(idx);
            if deadline > inner.now {
                inner.now = deadline;
            }
            Some(id)
        }

        pub fn pending(&self) -> usize {
            self.inner.borrow().scheduled.len()
        }
    }

    impl Scheduler for FakeScheduler {
        fn schedule(&mut self, deadline: Time) -> EventId {
            let mut inner = self.inner.borrow_mut();
            inner.next_id += 1;
            let id = EventId(inner.next_id);
            inner.scheduled.push((id, deadline));
            id
        }

        fn cancel(&mut self, id: EventId) {
            self.inner.borrow_mut().scheduled.retain(|(other, _)| *other != id);
        }

        fn now(&self) -> Time {
            self.inner.borrow().now
        }
    }
}
