// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Clock and reset generation for the device under test.
//!
//! Two clocks of the same period are generated, `clk90` lagging `clk` by a
//! quarter period. Reset is released, asserted for a fixed number of cycles
//! and then released for the rest of the simulation.

use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use rgtb_engine::engine::Engine;
use rgtb_engine::signal::Signal;
use rgtb_engine::time::timer::Timer;
use rgtb_engine::traits::Runnable;
use rgtb_engine::types::SimResult;
use rgtb_track::entity::Entity;
use rgtb_track::{debug, info};

/// 125 MHz
pub const DEFAULT_CLK_PERIOD_PS: u64 = 8000;

/// Number of `clk` rising edges spent in each phase of the reset sequence.
pub const RESET_CYCLES: usize = 10;

pub struct ClockResetSequencer {
    pub entity: Arc<Entity>,
    timer: Timer,
    clk: Signal,
    clk90: Signal,
    rst: Signal,
    quarter_ps: u64,
}

impl ClockResetSequencer {
    /// Create the sequencer and register the clock generator with the engine.
    ///
    /// # Panics
    ///
    /// If the period is not a multiple of four picoseconds.
    pub fn new_and_register(
        engine: &Engine,
        parent: &Arc<Entity>,
        clk: &Signal,
        clk90: &Signal,
        rst: &Signal,
        period_ps: u64,
    ) -> Rc<Self> {
        assert!(
            period_ps > 0 && period_ps % 4 == 0,
            "Clock period {period_ps}ps must be a non-zero multiple of 4ps"
        );
        let rc_self = Rc::new(Self {
            entity: Arc::new(Entity::new(parent, "clock_reset")),
            timer: engine.timer(),
            clk: clk.clone(),
            clk90: clk90.clone(),
            rst: rst.clone(),
            quarter_ps: period_ps / 4,
        });
        engine.register(rc_self.clone());
        rc_self
    }

    #[must_use]
    pub fn period_ps(&self) -> u64 {
        self.quarter_ps * 4
    }

    /// Drive reset low, high for [`RESET_CYCLES`] and low again.
    pub async fn sequence_reset(&self) -> SimResult {
        self.rst.set(0);
        for _ in 0..RESET_CYCLES {
            self.clk.rising_edge().await;
        }
        info!(self.entity ; "reset asserted");
        self.rst.set(1);
        for _ in 0..RESET_CYCLES {
            self.clk.rising_edge().await;
        }
        self.rst.set(0);
        info!(self.entity ; "reset released");
        Ok(())
    }
}

#[async_trait(?Send)]
impl Runnable for ClockResetSequencer {
    async fn run(&self) -> SimResult {
        debug!(self.entity ; "clock period {}ps", self.period_ps());
        loop {
            self.clk.set(1);
            self.timer.wait_ps(self.quarter_ps).await;
            self.clk90.set(1);
            self.timer.wait_ps(self.quarter_ps).await;
            self.clk.set(0);
            self.timer.wait_ps(self.quarter_ps).await;
            self.clk90.set(0);
            self.timer.wait_ps(self.quarter_ps).await;
        }
    }
}
