// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Wires and buses shared between the testbench and the models.
//!
//! A [`Signal`] holds an unsigned value of up to 64 bits. Writes made with
//! [`Signal::set`] are not visible until the end of the current delta cycle,
//! so every task that samples a signal on a clock edge sees the value from
//! before the edge regardless of the order in which tasks run. When several
//! writes are made to the same signal in one delta cycle the last one wins.
//!
//! Edge detection (`rising_edge`/`falling_edge`) looks at bit 0 only.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use futures::future::FusedFuture;
use rgtb_track::entity::Entity;
use rgtb_track::trace;

use crate::traits::{Resolve, Resolver};

/// Which change of a signal a task is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Any,
}

struct SignalState {
    entity: Arc<Entity>,
    width: u32,
    value: Cell<u64>,
    pending: Cell<Option<u64>>,
    registered: Cell<bool>,
    waiting: RefCell<Vec<Waker>>,
    rises: Cell<u64>,
    falls: Cell<u64>,
    changes: Cell<u64>,
}

impl SignalState {
    fn mask(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    fn count(&self, edge: Edge) -> u64 {
        match edge {
            Edge::Rising => self.rises.get(),
            Edge::Falling => self.falls.get(),
            Edge::Any => self.changes.get(),
        }
    }

    fn apply(&self, new_value: u64) {
        let old_value = self.value.get();
        if new_value == old_value {
            return;
        }
        trace!(self.entity ; "{old_value:#x} -> {new_value:#x}");
        self.value.set(new_value);
        self.changes.set(self.changes.get() + 1);
        match (old_value & 1, new_value & 1) {
            (0, 1) => self.rises.set(self.rises.get() + 1),
            (1, 0) => self.falls.set(self.falls.get() + 1),
            _ => {}
        }
        let waiting: Vec<_> = self.waiting.borrow_mut().drain(..).collect();
        for waker in waiting {
            waker.wake();
        }
    }
}

impl Resolve for SignalState {
    fn resolve(&self) {
        self.registered.set(false);
        if let Some(value) = self.pending.take() {
            self.apply(value);
        }
    }
}

/// A named, fixed-width signal.
#[derive(Clone)]
pub struct Signal {
    state: Rc<SignalState>,
    resolver: Rc<dyn Resolver>,
}

impl Signal {
    /// Create a signal with an initial value of 0.
    ///
    /// # Panics
    ///
    /// If `width` is zero or greater than 64.
    #[must_use]
    pub fn new(parent: &Arc<Entity>, name: &str, width: u32, resolver: Rc<dyn Resolver>) -> Self {
        assert!(
            (1..=64).contains(&width),
            "Signal width must be 1 to 64 bits, not {width}"
        );
        Self {
            state: Rc::new(SignalState {
                entity: Arc::new(Entity::new(parent, name)),
                width,
                value: Cell::new(0),
                pending: Cell::new(None),
                registered: Cell::new(false),
                waiting: RefCell::new(Vec::new()),
                rises: Cell::new(0),
                falls: Cell::new(0),
                changes: Cell::new(0),
            }),
            resolver,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.state.entity.name
    }

    #[must_use]
    pub fn entity(&self) -> &Arc<Entity> {
        &self.state.entity
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.state.width
    }

    /// The current (resolved) value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.state.value.get()
    }

    #[must_use]
    pub fn bit(&self, index: u32) -> bool {
        index < self.state.width && (self.value() >> index) & 1 == 1
    }

    /// Schedule a new value. It becomes visible at the end of the current
    /// delta cycle. Bits above the width of the signal are dropped.
    pub fn set(&self, value: u64) {
        self.state.pending.set(Some(value & self.state.mask()));
        if !self.state.registered.replace(true) {
            self.resolver.add_resolve(self.state.clone());
        }
    }

    /// Change the value now. Intended for setting up initial conditions
    /// before the simulation starts.
    pub fn set_immediate(&self, value: u64) {
        self.state.apply(value & self.state.mask());
    }

    /// Number of rising edges seen on bit 0 so far.
    #[must_use]
    pub fn num_rising_edges(&self) -> u64 {
        self.state.rises.get()
    }

    /// Number of falling edges seen on bit 0 so far.
    #[must_use]
    pub fn num_falling_edges(&self) -> u64 {
        self.state.falls.get()
    }

    /// Returns a future that completes on the next 0 to 1 transition of bit 0.
    #[must_use = "Futures do nothing unless you `.await` or otherwise use them"]
    pub fn rising_edge(&self) -> SignalFuture {
        self.wait_for(Edge::Rising)
    }

    /// Returns a future that completes on the next 1 to 0 transition of bit 0.
    #[must_use = "Futures do nothing unless you `.await` or otherwise use them"]
    pub fn falling_edge(&self) -> SignalFuture {
        self.wait_for(Edge::Falling)
    }

    /// Returns a future that completes the next time the value changes.
    #[must_use = "Futures do nothing unless you `.await` or otherwise use them"]
    pub fn changed(&self) -> SignalFuture {
        self.wait_for(Edge::Any)
    }

    /// Returns a future that completes on the next edge of the given type.
    #[must_use = "Futures do nothing unless you `.await` or otherwise use them"]
    pub fn wait_for(&self, edge: Edge) -> SignalFuture {
        SignalFuture {
            state: self.state.clone(),
            edge,
            target: None,
            done: false,
        }
    }
}

/// Future returned when waiting for a [`Signal`] to change.
///
/// The number of edges of the requested type is captured when the future is
/// first polled and it completes once that count has increased.
pub struct SignalFuture {
    state: Rc<SignalState>,
    edge: Edge,
    target: Option<u64>,
    done: bool,
}

impl Future for SignalFuture {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let count = self.state.count(self.edge);
        match self.target {
            Some(target) if count >= target => {
                self.done = true;
                return Poll::Ready(());
            }
            Some(_) => {}
            None => self.target = Some(count + 1),
        }
        self.state.waiting.borrow_mut().push(cx.waker().clone());
        Poll::Pending
    }
}

impl FusedFuture for SignalFuture {
    fn is_terminated(&self) -> bool {
        self.done
    }
}
