// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Collects frames from an RGMII bus.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{Either, select};
use rgtb_engine::engine::Engine;
use rgtb_engine::events::repeated::Repeated;
use rgtb_engine::sim_error;
use rgtb_engine::time::timer::Timer;
use rgtb_engine::traits::{Event, Runnable};
use rgtb_engine::types::{SimError, SimResult};
use rgtb_protocols::gmii::GmiiFrame;
use rgtb_track::entity::Entity;
use rgtb_track::{debug, warn};

use super::encoding::{Cycle, Decoder};
use super::{RgmiiBus, Speed};

pub struct RgmiiSink {
    pub entity: Arc<Entity>,
    bus: RgmiiBus,
    speed: Speed,
    received: RefCell<VecDeque<GmiiFrame>>,
    frame_ready: Repeated<()>,
    frames_received: Cell<usize>,
    recv_active: Cell<bool>,
}

/// Clears the single-receiver flag however the receive ends.
struct RecvGuard<'a>(&'a Cell<bool>);

impl Drop for RecvGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl RgmiiSink {
    pub fn new_and_register(
        engine: &Engine,
        parent: &Arc<Entity>,
        name: &str,
        bus: RgmiiBus,
        speed: Speed,
    ) -> Rc<Self> {
        let rc_self = Rc::new(Self {
            entity: Arc::new(Entity::new(parent, name)),
            bus,
            speed,
            received: RefCell::new(VecDeque::new()),
            frame_ready: Repeated::default(),
            frames_received: Cell::new(0),
            recv_active: Cell::new(false),
        });
        engine.register(rc_self.clone());
        rc_self
    }

    /// Wait for the next frame.
    ///
    /// Only one receive may be outstanding at a time.
    pub async fn recv(&self) -> Result<GmiiFrame, SimError> {
        if self.recv_active.replace(true) {
            return sim_error!(format!("{}: concurrent recv", self.entity));
        }
        let _guard = RecvGuard(&self.recv_active);
        loop {
            if let Some(frame) = self.received.borrow_mut().pop_front() {
                return Ok(frame);
            }
            self.frame_ready.listen().await;
        }
    }

    /// Wait for the next frame for at most `timeout_ps`. Returns `None` if
    /// no frame arrived in time.
    pub async fn recv_timeout(
        &self,
        timer: &Timer,
        timeout_ps: u64,
    ) -> Result<Option<GmiiFrame>, SimError> {
        let recv = Box::pin(self.recv());
        match select(recv, timer.wait_ps(timeout_ps)).await {
            Either::Left((result, _)) => result.map(Some),
            Either::Right(((), _)) => {
                debug!(self.entity ; "no frame within {timeout_ps}ps");
                Ok(None)
            }
        }
    }

    /// Remove a frame if one has been received.
    pub fn try_recv(&self) -> Option<GmiiFrame> {
        self.received.borrow_mut().pop_front()
    }

    /// Number of received frames not yet taken.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.received.borrow().len()
    }

    /// Total number of frames received.
    #[must_use]
    pub fn frames_received(&self) -> usize {
        self.frames_received.get()
    }

    fn sample(&self) -> (u8, bool) {
        (self.bus.data.value() as u8, self.bus.ctl.value() == 1)
    }

    fn frame_complete(&self, frame: GmiiFrame) -> SimResult {
        match frame.error {
            Some(offset) => {
                warn!(self.entity ; "frame of {} bytes with error at byte {offset}", frame.len());
            }
            None => {
                debug!(self.entity ; "received frame of {} bytes", frame.len());
            }
        }
        self.frames_received.set(self.frames_received.get() + 1);
        self.received.borrow_mut().push_back(frame);
        self.frame_ready.notify()
    }
}

#[async_trait(?Send)]
impl Runnable for RgmiiSink {
    async fn run(&self) -> SimResult {
        let mut decoder = Decoder::new(self.speed);
        loop {
            self.bus.clk.rising_edge().await;
            let (rise_data, rise_ctl) = self.sample();
            self.bus.clk.falling_edge().await;
            let (fall_data, fall_ctl) = self.sample();

            let cycle = Cycle {
                rise_data,
                rise_ctl,
                fall_data,
                fall_ctl,
            };
            if let Some(frame) = decoder.push(cycle) {
                self.frame_complete(frame)?;
            }
        }
    }
}
