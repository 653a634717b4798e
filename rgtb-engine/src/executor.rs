// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Single-threaded executor for the simulation tasks.
//!
//! Each call to [`Executor::step`] polls every task that has been woken and
//! then resolves all signal writes made by those tasks. This delta cycle is
//! repeated until no task is runnable, at which point time is advanced to the
//! next pending timer.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::iter;
use std::mem::{self, ManuallyDrop};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

use rgtb_track::entity::Entity;
use rgtb_track::trace;

use crate::time::simtime::SimTime;
use crate::traits::{Resolve, Resolver};
use crate::types::SimResult;

static VTABLE: RawWakerVTable = RawWakerVTable::new(
    clone_raw_waker,
    wake_task,
    wake_task_by_ref,
    drop_raw_waker,
);

fn waker_for_task(task: Rc<Task>) -> Waker {
    let ptr = Rc::into_raw(task) as *const ();
    unsafe { Waker::from_raw(RawWaker::new(ptr, &VTABLE)) }
}

unsafe fn clone_raw_waker(data: *const ()) -> RawWaker {
    unsafe {
        // Tasks are always wrapped in a reference counter to allow them to be shared
        // read-only.
        Rc::increment_strong_count(data as *const Task);
    }
    RawWaker::new(data, &VTABLE)
}

unsafe fn wake_task(data: *const ()) {
    let task = unsafe { Rc::from_raw(data as *const Task) };
    Task::schedule(&task);
}

unsafe fn wake_task_by_ref(data: *const ()) {
    let task = ManuallyDrop::new(unsafe { Rc::from_raw(data as *const Task) });
    Task::schedule(&task);
}

unsafe fn drop_raw_waker(data: *const ()) {
    unsafe { drop(Rc::from_raw(data as *const Task)) };
}

struct Task {
    /// Set to `None` once the future has completed.
    future: RefCell<Option<Pin<Box<dyn Future<Output = SimResult>>>>>,
    queued: Cell<bool>,
    done: Cell<bool>,
    executor_state: Rc<ExecutorState>,
}

impl Task {
    fn new(
        future: impl Future<Output = SimResult> + 'static,
        executor_state: Rc<ExecutorState>,
    ) -> Task {
        Task {
            future: RefCell::new(Some(Box::pin(future))),
            queued: Cell::new(false),
            done: Cell::new(false),
            executor_state,
        }
    }

    /// Add the task to the run queue unless it is already there.
    fn schedule(task: &Rc<Task>) {
        if task.done.get() || task.queued.get() {
            return;
        }
        task.queued.set(true);
        task.executor_state
            .new_tasks
            .borrow_mut()
            .push(task.clone());
    }

    fn poll(&self, context: &mut Context) -> Poll<SimResult> {
        self.queued.set(false);
        let mut slot = self.future.borrow_mut();
        let Some(future) = slot.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let result = future.as_mut().poll(context);
        if result.is_ready() {
            *slot = None;
            self.done.set(true);
        }
        result
    }
}

/// Signal writes that are waiting to be applied at the end of the current
/// delta cycle.
#[derive(Default)]
pub struct DeltaQueue {
    pending: RefCell<Vec<Rc<dyn Resolve>>>,
}

impl DeltaQueue {
    /// Apply all pending updates. Returns the number applied.
    pub fn resolve_all(&self) -> usize {
        let pending: Vec<_> = self.pending.borrow_mut().drain(..).collect();
        for update in &pending {
            update.resolve();
        }
        pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.borrow().is_empty()
    }
}

impl Resolver for DeltaQueue {
    fn add_resolve(&self, resolve: Rc<dyn Resolve + 'static>) {
        self.pending.borrow_mut().push(resolve);
    }
}

struct ExecutorState {
    new_tasks: RefCell<Vec<Rc<Task>>>,
    time: SimTime,
    updates: Rc<DeltaQueue>,
}

impl ExecutorState {
    fn new(top: &Arc<Entity>) -> Self {
        Self {
            new_tasks: RefCell::new(Vec::new()),
            time: SimTime::new(top),
            updates: Rc::new(DeltaQueue::default()),
        }
    }

    fn spawn(self: &Rc<Self>, future: impl Future<Output = SimResult> + 'static) {
        let task = Rc::new(Task::new(future, self.clone()));
        Task::schedule(&task);
    }
}

/// Single-threaded executor
///
/// This is a thin-wrapper (using [`Rc`]) around the real executor, so that this
/// struct can be cloned and passed around.
#[derive(Clone)]
pub struct Executor {
    pub entity: Arc<Entity>,
    state: Rc<ExecutorState>,
}

impl Executor {
    pub fn spawn(&self, future: impl Future<Output = SimResult> + 'static) {
        self.state.spawn(future);
    }

    /// Run until `finished` is set or there is nothing left to do.
    pub fn run(&self, finished: &Rc<Cell<bool>>) -> SimResult {
        loop {
            self.step(finished)?;
            if finished.get() {
                break;
            }

            if self.state.new_tasks.borrow().is_empty() {
                if let Some(wakers) = self.state.time.advance_time() {
                    for waker in wakers {
                        waker.wake();
                    }
                } else {
                    trace!(self.entity ; "no runnable tasks and no pending timers");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Poll all runnable tasks and then resolve the writes they made.
    ///
    /// Tasks not polled because the run finished or failed stay runnable for
    /// a later run.
    pub fn step(&self, finished: &Rc<Cell<bool>>) -> SimResult {
        let runnable: Vec<_> = self.state.new_tasks.borrow_mut().drain(..).collect();
        let mut runnable = runnable.into_iter();

        while let Some(task) = runnable.next() {
            if finished.get() {
                self.requeue(iter::once(task).chain(runnable));
                break;
            }

            let waker = waker_for_task(task.clone());
            let mut context = Context::from_waker(&waker);

            match task.poll(&mut context) {
                Poll::Ready(Err(e)) => {
                    // Error - return early
                    self.requeue(runnable);
                    return Err(e);
                }
                Poll::Ready(Ok(())) => {
                    // Otherwise, drop task as it is complete
                }
                Poll::Pending => {
                    // Task will have parked itself waiting somewhere
                }
            }
        }
        self.state.updates.resolve_all();
        Ok(())
    }

    /// Put tasks that were never polled back at the front of the run queue.
    fn requeue(&self, unpolled: impl Iterator<Item = Rc<Task>>) {
        let mut new_tasks = self.state.new_tasks.borrow_mut();
        let woken_since = mem::take(&mut *new_tasks);
        new_tasks.extend(unpolled);
        new_tasks.extend(woken_since);
    }

    #[must_use]
    pub fn time(&self) -> &SimTime {
        &self.state.time
    }

    #[must_use]
    pub fn updates(&self) -> Rc<DeltaQueue> {
        self.state.updates.clone()
    }

    #[must_use]
    pub fn time_now_ns(&self) -> f64 {
        self.state.time.time_now_ns()
    }
}

/// `Spawner` spawns new futures into the executor.
#[derive(Clone)]
pub struct Spawner {
    state: Rc<ExecutorState>,
}

impl Spawner {
    pub fn spawn(&self, future: impl Future<Output = SimResult> + 'static) {
        self.state.spawn(future);
    }
}

pub fn new_executor_and_spawner(top: &Arc<Entity>) -> (Executor, Spawner) {
    let state = Rc::new(ExecutorState::new(top));
    let entity = Arc::new(Entity::new(top, "executor"));
    (
        Executor {
            entity,
            state: state.clone(),
        },
        Spawner { state },
    )
}
