// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Signal-level model of an RGMII Ethernet PHY.
//!
//! A PHY has two independent directions:
//!
//!  - an [`RgmiiSource`](source::RgmiiSource) which serialises frames onto the
//!    receive pins of the device under test,
//!  - an [`RgmiiSink`](sink::RgmiiSink) which reconstructs frames from the
//!    device's transmit pins.
//!
//! At 1000 Mb/s a byte is transferred every clock cycle, the low nibble with
//! `ctl = DV` on the rising edge and the high nibble with `ctl = DV ^ ER` on
//! the falling edge. At 10 and 100 Mb/s one nibble is transferred per clock
//! cycle, low nibble first.

pub mod encoding;
pub mod sink;
pub mod source;

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use rgtb_engine::engine::Engine;
use rgtb_engine::signal::Signal;
use rgtb_engine::types::SimError;
use rgtb_track::entity::Entity;

use self::sink::RgmiiSink;
use self::source::{Clocking, RgmiiSource};

/// Line rate of a PHY.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Speed {
    Mbps10,
    Mbps100,
    Mbps1000,
}

impl Speed {
    pub fn from_mbps(mbps: u32) -> Result<Self, SimError> {
        match mbps {
            10 => Ok(Self::Mbps10),
            100 => Ok(Self::Mbps100),
            1000 => Ok(Self::Mbps1000),
            other => Err(SimError(format!(
                "unsupported line rate {other} Mb/s (expected 10, 100 or 1000)"
            ))),
        }
    }

    #[must_use]
    pub fn mbps(self) -> u32 {
        match self {
            Self::Mbps10 => 10,
            Self::Mbps100 => 100,
            Self::Mbps1000 => 1000,
        }
    }

    /// Period of the interface clock: 2.5 MHz, 25 MHz or 125 MHz.
    #[must_use]
    pub fn clock_period_ps(self) -> u64 {
        match self {
            Self::Mbps10 => 400_000,
            Self::Mbps100 => 40_000,
            Self::Mbps1000 => 8_000,
        }
    }

    /// Whether data is transferred on both clock edges.
    #[must_use]
    pub fn is_ddr(self) -> bool {
        self == Self::Mbps1000
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} Mb/s", self.mbps())
    }
}

/// The three signals of one direction of an RGMII interface.
#[derive(Clone)]
pub struct RgmiiBus {
    pub data: Signal,
    pub ctl: Signal,
    pub clk: Signal,
}

impl RgmiiBus {
    /// Check the widths of the signals.
    pub fn new(data: &Signal, ctl: &Signal, clk: &Signal) -> Result<Self, SimError> {
        for (signal, width) in [(data, 4), (ctl, 1), (clk, 1)] {
            if signal.width() != width {
                return Err(SimError(format!(
                    "{} is {} bits wide, expected {width}",
                    signal.entity(),
                    signal.width()
                )));
            }
        }
        Ok(Self {
            data: data.clone(),
            ctl: ctl.clone(),
            clk: clk.clone(),
        })
    }
}

/// A PHY attached to the device: frames sent through `source` arrive on the
/// device's receive pins and frames transmitted by the device are collected
/// by `sink`.
pub struct RgmiiPhy {
    pub entity: Arc<Entity>,
    pub source: Rc<RgmiiSource>,
    pub sink: Rc<RgmiiSink>,
}

impl RgmiiPhy {
    /// Create a PHY. `tx` are the device's transmit pins (sampled) and `rx`
    /// the device's receive pins (driven, including the clock).
    pub fn new_and_register(
        engine: &Engine,
        parent: &Arc<Entity>,
        name: &str,
        tx: RgmiiBus,
        rx: RgmiiBus,
        speed: Speed,
    ) -> Self {
        let entity = Arc::new(Entity::new(parent, name));
        let source =
            RgmiiSource::new_and_register(engine, &entity, "rx", rx, speed, Clocking::Internal);
        let sink = RgmiiSink::new_and_register(engine, &entity, "tx", tx, speed);
        Self {
            entity,
            source,
            sink,
        }
    }
}
