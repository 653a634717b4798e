// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Drives frames onto an RGMII bus.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use rgtb_engine::engine::Engine;
use rgtb_engine::events::repeated::Repeated;
use rgtb_engine::signal::Signal;
use rgtb_engine::time::timer::Timer;
use rgtb_engine::traits::{Event, Runnable};
use rgtb_engine::types::SimResult;
use rgtb_protocols::gmii::GmiiFrame;
use rgtb_track::entity::Entity;
use rgtb_track::{debug, trace};

use super::encoding::{Cycle, encode_frame};
use super::{RgmiiBus, Speed};

/// How the source times the bus.
#[derive(Clone)]
pub enum Clocking {
    /// The source generates the bus clock at the line rate and changes data a
    /// quarter period before each edge.
    Internal,

    /// Data is launched on the edges of `launch` and the bus clock follows
    /// `forward`, which must lag `launch` so that data is stable at each
    /// edge of the bus clock.
    Forwarded { launch: Signal, forward: Signal },
}

struct SourceState {
    queue: VecDeque<GmiiFrame>,
    current: VecDeque<Cycle>,
    sending: bool,
    frames_sent: usize,
}

pub struct RgmiiSource {
    pub entity: Arc<Entity>,
    bus: RgmiiBus,
    speed: Speed,
    clocking: Clocking,
    timer: Timer,
    state: RefCell<SourceState>,
    frame_done: Repeated<()>,
}

impl RgmiiSource {
    pub fn new_and_register(
        engine: &Engine,
        parent: &Arc<Entity>,
        name: &str,
        bus: RgmiiBus,
        speed: Speed,
        clocking: Clocking,
    ) -> Rc<Self> {
        let rc_self = Rc::new(Self {
            entity: Arc::new(Entity::new(parent, name)),
            bus,
            speed,
            clocking,
            timer: engine.timer(),
            state: RefCell::new(SourceState {
                queue: VecDeque::new(),
                current: VecDeque::new(),
                sending: false,
                frames_sent: 0,
            }),
            frame_done: Repeated::default(),
        });
        engine.register(rc_self.clone());
        rc_self
    }

    /// Queue a frame for transmission. Frames are sent in order.
    pub fn send(&self, frame: GmiiFrame) {
        debug!(self.entity ; "queued frame of {} bytes", frame.len());
        self.state.borrow_mut().queue.push_back(frame);
    }

    /// Number of frames waiting behind the one being sent.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.state.borrow().queue.len()
    }

    /// True when nothing is queued or being sent.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let state = self.state.borrow();
        state.queue.is_empty() && !state.sending
    }

    #[must_use]
    pub fn frames_sent(&self) -> usize {
        self.state.borrow().frames_sent
    }

    /// Wait until all queued frames and their inter-frame gaps are sent.
    pub async fn wait_idle(&self) {
        while !self.is_idle() {
            self.frame_done.listen().await;
        }
    }

    #[must_use]
    pub fn speed(&self) -> Speed {
        self.speed
    }

    /// The values for the next clock cycle, starting the next queued frame
    /// if the previous one is complete.
    fn take_cycle(&self) -> Cycle {
        let mut state = self.state.borrow_mut();
        if state.current.is_empty() {
            if let Some(frame) = state.queue.pop_front() {
                trace!(self.entity ; "start frame of {} bytes", frame.len());
                state.current = encode_frame(&frame, self.speed).into();
                state.sending = true;
            }
        }
        state.current.pop_front().unwrap_or(Cycle::IDLE)
    }

    fn cycle_complete(&self) -> SimResult {
        let done = {
            let mut state = self.state.borrow_mut();
            let done = state.sending && state.current.is_empty();
            if done {
                state.sending = false;
                state.frames_sent += 1;
            }
            done
        };
        if done {
            debug!(self.entity ; "frame sent");
            self.frame_done.notify()?;
        }
        Ok(())
    }

    fn drive(&self, data: u8, ctl: bool) {
        self.bus.data.set(u64::from(data));
        self.bus.ctl.set(u64::from(ctl));
    }

    async fn run_internal_clock(&self) -> SimResult {
        let quarter_ps = self.speed.clock_period_ps() / 4;
        loop {
            let cycle = self.take_cycle();
            self.drive(cycle.rise_data, cycle.rise_ctl);
            self.timer.wait_ps(quarter_ps).await;
            self.bus.clk.set(1);
            self.timer.wait_ps(quarter_ps).await;
            self.drive(cycle.fall_data, cycle.fall_ctl);
            self.timer.wait_ps(quarter_ps).await;
            self.bus.clk.set(0);
            self.timer.wait_ps(quarter_ps).await;
            self.cycle_complete()?;
        }
    }

    async fn run_launched(&self, launch: &Signal) -> SimResult {
        loop {
            launch.rising_edge().await;
            let cycle = self.take_cycle();
            self.drive(cycle.rise_data, cycle.rise_ctl);
            launch.falling_edge().await;
            self.drive(cycle.fall_data, cycle.fall_ctl);
            self.cycle_complete()?;
        }
    }

    async fn forward_clock(&self, forward: &Signal) -> SimResult {
        loop {
            forward.changed().await;
            self.bus.clk.set(forward.value());
        }
    }
}

#[async_trait(?Send)]
impl Runnable for RgmiiSource {
    async fn run(&self) -> SimResult {
        match &self.clocking {
            Clocking::Internal => self.run_internal_clock().await,
            Clocking::Forwarded { launch, forward } => {
                futures::future::try_join(self.run_launched(launch), self.forward_clock(forward))
                    .await?;
                Ok(())
            }
        }
    }
}
