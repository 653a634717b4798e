// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Timers used by tasks to wait for a fixed amount of simulated time.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures::future::FusedFuture;

use super::PS_PER_NS;

/// Shared state between futures using a [Timer] and the owner of time.
pub struct TimeState {
    now_ps: Cell<u64>,

    /// Tasks waiting for a point in time, keyed (and therefore sorted) by
    /// that time.
    waiting: RefCell<BTreeMap<u64, Vec<Waker>>>,
}

impl TimeState {
    pub(crate) fn new() -> Self {
        Self {
            now_ps: Cell::new(0),
            waiting: RefCell::new(BTreeMap::new()),
        }
    }

    pub(crate) fn now_ps(&self) -> u64 {
        self.now_ps.get()
    }

    fn schedule(&self, until_ps: u64, cx: &mut Context<'_>) {
        self.waiting
            .borrow_mut()
            .entry(until_ps)
            .or_default()
            .push(cx.waker().clone());
    }

    /// Remove the earliest group of waiting tasks and move time to match.
    pub(crate) fn pop_next(&self) -> Option<(u64, Vec<Waker>)> {
        let (time_ps, wakers) = self.waiting.borrow_mut().pop_first()?;
        assert!(time_ps >= self.now_ps.get(), "Time moving backwards");
        self.now_ps.set(time_ps);
        Some((time_ps, wakers))
    }

    pub(crate) fn num_pending(&self) -> usize {
        self.waiting.borrow().values().map(Vec::len).sum()
    }
}

/// Handle used by tasks to read the current time and to wait.
#[derive(Clone)]
pub struct Timer {
    state: Rc<TimeState>,
}

impl Timer {
    pub(crate) fn new(state: Rc<TimeState>) -> Self {
        Self { state }
    }

    /// Returns the current time in `ps`.
    #[must_use]
    pub fn now_ps(&self) -> u64 {
        self.state.now_ps()
    }

    /// Returns the current time in `ns`.
    #[must_use]
    pub fn now_ns(&self) -> f64 {
        self.state.now_ps() as f64 / PS_PER_NS as f64
    }

    /// Returns a [Delay] future which must be `await`ed to delay the
    /// specified number of picoseconds. Delays past the end of time wait
    /// until the end of time.
    #[must_use = "Futures do nothing unless you `.await` or otherwise use them"]
    pub fn wait_ps(&self, delay_ps: u64) -> Delay {
        self.wait_until_ps(self.now_ps().saturating_add(delay_ps))
    }

    /// Returns a [Delay] future which must be `await`ed to delay the
    /// specified number of nanoseconds.
    #[must_use = "Futures do nothing unless you `.await` or otherwise use them"]
    pub fn wait_ns(&self, delay_ns: u64) -> Delay {
        self.wait_ps(delay_ns.saturating_mul(PS_PER_NS))
    }

    /// Returns a [Delay] future which completes at the absolute time given.
    ///
    /// A time in the past completes immediately.
    #[must_use = "Futures do nothing unless you `.await` or otherwise use them"]
    pub fn wait_until_ps(&self, until_ps: u64) -> Delay {
        Delay {
            state: self.state.clone(),
            until_ps,
            scheduled: false,
        }
    }
}

/// Future returned by a [Timer] to manage advancing time using async
/// functions.
///
/// Completion is decided by comparing against the current time so a spurious
/// poll can never complete it early.
pub struct Delay {
    state: Rc<TimeState>,
    until_ps: u64,
    scheduled: bool,
}

impl Future for Delay {
    type Output = ();
    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.state.now_ps() >= self.until_ps {
            self.scheduled = false;
            // Mark as complete for `is_terminated`.
            self.until_ps = 0;
            return Poll::Ready(());
        }
        if !self.scheduled {
            self.state.schedule(self.until_ps, cx);
            self.scheduled = true;
        }
        Poll::Pending
    }
}

impl FusedFuture for Delay {
    fn is_terminated(&self) -> bool {
        !self.scheduled && self.until_ps == 0
    }
}
