// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! An event that can be triggered multiple times. The event allows
//! the notifier to pass a custom result to its listeners on each
//! notification, using the `notify_result()` method. Alternatively,
//! the last set result will be provided to the listeners.

use std::cell::{Cell, RefCell};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures::Future;
use futures::future::FusedFuture;

use crate::traits::{BoxFuture, Event};
use crate::types::SimResult;

struct RepeatedState<T>
where
    T: Copy,
{
    listen_waiting: RefCell<Vec<Waker>>,
    result: Cell<T>,

    /// Incremented on every notification.
    generation: Cell<u64>,
}

#[derive(Clone)]
pub struct Repeated<T>
where
    T: Copy,
{
    state: Rc<RepeatedState<T>>,
}

/// Completes on the first notification after it is first polled.
pub struct RepeatedFuture<T>
where
    T: Copy,
{
    state: Rc<RepeatedState<T>>,
    wait_for: Option<u64>,
    done: bool,
}

impl<T> FusedFuture for RepeatedFuture<T>
where
    T: Copy,
{
    fn is_terminated(&self) -> bool {
        self.done
    }
}

impl<T> Repeated<T>
where
    T: Copy,
{
    pub fn new(value: T) -> Self {
        Self {
            state: Rc::new(RepeatedState {
                listen_waiting: RefCell::new(Vec::new()),
                result: Cell::new(value),
                generation: Cell::new(0),
            }),
        }
    }

    pub fn notify(&self) -> SimResult {
        self.state.generation.set(self.state.generation.get() + 1);
        for waker in self.state.listen_waiting.borrow_mut().drain(..) {
            waker.wake();
        }
        Ok(())
    }

    pub fn notify_result(&self, result: T) -> SimResult {
        self.state.result.set(result);
        self.notify()
    }

    /// Number of times the event has been notified.
    #[must_use]
    pub fn num_notified(&self) -> u64 {
        self.state.generation.get()
    }
}

impl Default for Repeated<()> {
    fn default() -> Self {
        Self::new(())
    }
}

impl<T> Event<T> for Repeated<T>
where
    T: Copy + 'static,
{
    fn listen(&self) -> BoxFuture<'static, T> {
        Box::pin(RepeatedFuture {
            state: self.state.clone(),
            wait_for: None,
            done: false,
        })
    }

    /// Allow cloning of Boxed elements of vector
    fn clone_dyn(&self) -> Box<dyn Event<T>> {
        Box::new(self.clone())
    }
}

impl<T> Future for RepeatedFuture<T>
where
    T: Copy,
{
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let generation = self.state.generation.get();
        match self.wait_for {
            Some(target) if generation >= target => {
                self.done = true;
                return Poll::Ready(self.state.result.get());
            }
            Some(_) => {}
            None => self.wait_for = Some(generation + 1),
        }
        self.state
            .listen_waiting
            .borrow_mut()
            .push(cx.waker().clone());
        Poll::Pending
    }
}
