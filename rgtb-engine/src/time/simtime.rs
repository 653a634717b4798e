// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The owner of time within a simulation.

use std::rc::Rc;
use std::sync::Arc;
use std::task::Waker;

use rgtb_track::entity::Entity;
use rgtb_track::set_time;

use super::PS_PER_NS;
use super::timer::{TimeState, Timer};

/// The overall owner of time within a simulation.
///
/// Holds the shared timeline that all [`Timer`]s are created from.
#[derive(Clone)]
pub struct SimTime {
    pub entity: Arc<Entity>,
    state: Rc<TimeState>,
}

impl SimTime {
    #[must_use]
    pub fn new(parent: &Arc<Entity>) -> Self {
        Self {
            entity: Arc::new(Entity::new(parent, "time")),
            state: Rc::new(TimeState::new()),
        }
    }

    #[must_use]
    pub fn timer(&self) -> Timer {
        Timer::new(self.state.clone())
    }

    /// Move time to the next point at which a task is waiting and return the
    /// associated Wakers.
    pub fn advance_time(&self) -> Option<Vec<Waker>> {
        let before_ps = self.state.now_ps();
        let (next_ps, wakers) = self.state.pop_next()?;
        if next_ps != before_ps {
            set_time!(self.entity ; next_ps as f64 / PS_PER_NS as f64);
        }
        Some(wakers)
    }

    #[must_use]
    pub fn time_now_ps(&self) -> u64 {
        self.state.now_ps()
    }

    #[must_use]
    pub fn time_now_ns(&self) -> f64 {
        self.state.now_ps() as f64 / PS_PER_NS as f64
    }

    /// Number of tasks currently waiting on a timer.
    #[must_use]
    pub fn num_waiting(&self) -> usize {
        self.state.num_pending()
    }
}

#[cfg(test)]
mod tests {
    use rgtb_track::entity::toplevel;

    use super::*;
    use crate::test_helpers::create_tracker;

    #[test]
    fn timers_share_timeline() {
        let tracker = create_tracker(file!());
        let top = toplevel(&tracker, "top");

        let time = SimTime::new(&top);
        let timer_a = time.timer();
        let timer_b = time.timer();
        assert_eq!(timer_a.now_ps(), timer_b.now_ps());
        assert!(time.advance_time().is_none());
        assert_eq!(time.time_now_ns(), 0.0);
    }
}
