// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The [`Engine`] owns the executor, the timeline and the top-level entity
//! of a simulation.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::sync::Arc;

use rgtb_track::entity::{Entity, toplevel};
use rgtb_track::tracker::stdout_tracker;
use rgtb_track::{Tracker, trace};

use crate::executor::{self, Executor, Spawner};
use crate::signal::Signal;
use crate::sim_error;
use crate::time::timer::Timer;
use crate::types::{Component, Eventable, SimResult};

/// Components waiting to be spawned when the simulation starts.
pub struct Registry {
    pub entity: Arc<Entity>,
    components: RefCell<Vec<Component>>,
}

impl Registry {
    fn new(parent: &Arc<Entity>) -> Self {
        Self {
            entity: Arc::new(Entity::new(parent, "registry")),
            components: RefCell::new(Vec::new()),
        }
    }

    pub fn spawn_components(&self, spawner: &Spawner) {
        let mut guard = self.components.borrow_mut();

        trace!(self.entity ; "Spawning {} components", guard.len());

        for component in guard.drain(..) {
            spawner.spawn(async move { component.run().await });
        }
    }

    pub fn register(&self, component: Component) {
        self.components.borrow_mut().push(component);
    }
}

pub struct Engine {
    pub executor: Executor,
    pub spawner: Spawner,
    toplevel: Arc<Entity>,
    tracker: Tracker,
    registry: Registry,
}

impl Engine {
    /// Create a standalone engine.
    pub fn new(tracker: &Tracker) -> Self {
        let toplevel = toplevel(tracker, "top");
        let (executor, spawner) = executor::new_executor_and_spawner(&toplevel);
        let registry = Registry::new(&toplevel);
        Self {
            executor,
            spawner,
            toplevel,
            tracker: tracker.clone(),
            registry,
        }
    }

    /// Add a component whose `run()` is spawned when the simulation starts.
    pub fn register(&self, component: Component) {
        self.registry.register(component);
    }

    /// Run until no task can make progress and no timers are pending.
    pub fn run(&mut self) -> SimResult {
        self.registry.spawn_components(&self.spawner);

        // Pass a flag that will never be set
        let finished = Rc::new(Cell::new(false));
        self.executor.run(&finished)
    }

    /// Run until the event fires.
    ///
    /// Tasks that are still waiting when the event fires are abandoned. It is
    /// an error for the simulation to run out of work before the event fires.
    pub fn run_until<T: Copy + 'static>(&mut self, event: Eventable<T>) -> SimResult {
        self.registry.spawn_components(&self.spawner);

        let finished = Rc::new(Cell::new(false));
        {
            let finished = finished.clone();
            self.executor.spawn(async move {
                event.listen().await;
                finished.set(true);
                Ok(())
            });
        }

        self.executor.run(&finished)?;
        if !finished.get() {
            return sim_error!(format!(
                "simulation stalled at {:.3}ns before completion",
                self.time_now_ns()
            ));
        }
        Ok(())
    }

    pub fn spawn(&self, future: impl Future<Output = SimResult> + 'static) {
        self.executor.spawn(future);
    }

    #[must_use]
    pub fn timer(&self) -> Timer {
        self.executor.time().timer()
    }

    /// Create a signal whose writes are resolved by this engine.
    #[must_use]
    pub fn signal(&self, parent: &Arc<Entity>, name: &str, width: u32) -> Signal {
        Signal::new(parent, name, width, self.executor.updates())
    }

    #[must_use]
    pub fn time_now_ps(&self) -> u64 {
        self.executor.time().time_now_ps()
    }

    #[must_use]
    pub fn time_now_ns(&self) -> f64 {
        self.executor.time_now_ns()
    }

    #[must_use]
    pub fn top(&self) -> &Arc<Entity> {
        &self.toplevel
    }

    #[must_use]
    pub fn tracker(&self) -> Tracker {
        self.tracker.clone()
    }

    #[must_use]
    pub fn spawner(&self) -> Spawner {
        self.spawner.clone()
    }
}

/// Create a default engine that sends [`Track`](rgtb_track::Track) events to
/// stdout.
impl Default for Engine {
    fn default() -> Self {
        let tracker = stdout_tracker();
        Self::new(&tracker)
    }
}
