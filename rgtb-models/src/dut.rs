// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! The signal-level boundary of the device under test.

use std::sync::Arc;

use rgtb_engine::engine::Engine;
use rgtb_engine::signal::Signal;
use rgtb_engine::types::SimError;
use rgtb_track::entity::Entity;

use crate::rgmii::RgmiiBus;

/// The pins of one PHY interface, named from the device's point of view.
#[derive(Clone)]
pub struct PhyPins {
    pub txd: Signal,
    pub tx_ctl: Signal,
    pub tx_clk: Signal,
    pub rxd: Signal,
    pub rx_ctl: Signal,
    pub rx_clk: Signal,
    pub int_n: Signal,
}

impl PhyPins {
    fn new(engine: &Engine, parent: &Arc<Entity>, prefix: &str) -> Self {
        let signal = |name: &str, width| engine.signal(parent, &format!("{prefix}_{name}"), width);
        Self {
            txd: signal("txd", 4),
            tx_ctl: signal("tx_ctl", 1),
            tx_clk: signal("tx_clk", 1),
            rxd: signal("rxd", 4),
            rx_ctl: signal("rx_ctl", 1),
            rx_clk: signal("rx_clk", 1),
            int_n: signal("int_n", 1),
        }
    }

    /// The transmit direction (device outputs).
    pub fn tx_bus(&self) -> Result<RgmiiBus, SimError> {
        RgmiiBus::new(&self.txd, &self.tx_ctl, &self.tx_clk)
    }

    /// The receive direction (device inputs).
    pub fn rx_bus(&self) -> Result<RgmiiBus, SimError> {
        RgmiiBus::new(&self.rxd, &self.rx_ctl, &self.rx_clk)
    }

    fn all(&self) -> [&Signal; 7] {
        [
            &self.txd,
            &self.tx_ctl,
            &self.tx_clk,
            &self.rxd,
            &self.rx_ctl,
            &self.rx_clk,
            &self.int_n,
        ]
    }
}

/// All top-level ports of the device.
#[derive(Clone)]
pub struct DutPorts {
    pub entity: Arc<Entity>,
    pub clk: Signal,
    pub clk90: Signal,
    pub rst: Signal,
    pub btn: Signal,
    pub sw: Signal,
    pub phy0: PhyPins,
    pub phy1: PhyPins,
}

impl DutPorts {
    pub fn new(engine: &Engine, parent: &Arc<Entity>) -> Self {
        let entity = Arc::new(Entity::new(parent, "dut"));
        Self {
            clk: engine.signal(&entity, "clk", 1),
            clk90: engine.signal(&entity, "clk90", 1),
            rst: engine.signal(&entity, "rst", 1),
            btn: engine.signal(&entity, "btn", 4),
            sw: engine.signal(&entity, "sw", 4),
            phy0: PhyPins::new(engine, &entity, "phy0"),
            phy1: PhyPins::new(engine, &entity, "phy1"),
            entity,
        }
    }

    /// Put the inputs the testbench does not otherwise drive into their
    /// inactive state.
    pub fn set_idle_inputs(&self) {
        self.phy0.int_n.set_immediate(1);
        self.phy1.int_n.set_immediate(1);
        self.btn.set_immediate(0);
        self.sw.set_immediate(0);
        self.clk.set_immediate(0);
        self.clk90.set_immediate(0);
    }

    #[must_use]
    pub fn phy(&self, index: usize) -> Option<&PhyPins> {
        match index {
            0 => Some(&self.phy0),
            1 => Some(&self.phy1),
            _ => None,
        }
    }

    /// Look up a port by name, e.g. `phy0_txd` or `clk90`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Signal> {
        [&self.clk, &self.clk90, &self.rst, &self.btn, &self.sw]
            .into_iter()
            .chain(self.phy0.all())
            .chain(self.phy1.all())
            .find(|signal| signal.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use rgtb_engine::test_helpers::start_test;

    use super::*;

    #[test]
    fn lookup_by_name() {
        let engine = start_test(file!());
        let ports = DutPorts::new(&engine, engine.top());
        assert_eq!(ports.by_name("phy1_rx_clk").unwrap().width(), 1);
        assert_eq!(ports.by_name("phy0_txd").unwrap().width(), 4);
        assert_eq!(ports.by_name("sw").unwrap().width(), 4);
        assert!(ports.by_name("phy2_txd").is_none());
    }

    #[test]
    fn idle_inputs() {
        let engine = start_test(file!());
        let ports = DutPorts::new(&engine, engine.top());
        ports.set_idle_inputs();
        assert_eq!(ports.phy0.int_n.value(), 1);
        assert_eq!(ports.phy1.int_n.value(), 1);
        assert_eq!(ports.btn.value(), 0);
        assert!(ports.phy0.tx_bus().is_ok());
        assert!(ports.phy1.rx_bus().is_ok());
    }
}
