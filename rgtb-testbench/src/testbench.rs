// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Everything around the device under test.

use std::rc::Rc;
use std::sync::Arc;

use rgtb_engine::engine::Engine;
use rgtb_engine::types::SimError;
use rgtb_models::clock_reset::ClockResetSequencer;
use rgtb_models::dut::DutPorts;
use rgtb_models::fpga_core::{Fault, FpgaCore, FpgaCoreConfig};
use rgtb_models::rgmii::RgmiiPhy;
use rgtb_track::entity::Entity;
use rgtb_track::{error, info, warn};

use crate::config::TestbenchConfig;
use crate::failure::TbFailure;
use crate::scenario::{ConvScenario, Report};

/// The device pins, the clock and reset generator, a PHY on each Ethernet
/// interface and the scenario. Only PHY 0 carries traffic.
pub struct Testbench {
    pub entity: Arc<Entity>,
    pub engine: Engine,
    pub ports: DutPorts,
    pub sequencer: Rc<ClockResetSequencer>,
    pub phys: Vec<RgmiiPhy>,
    pub scenario: Rc<ConvScenario>,
    config: TestbenchConfig,
}

impl Testbench {
    pub fn new(engine: Engine, config: TestbenchConfig) -> Result<Self, SimError> {
        let top = engine.top().clone();
        let entity = Arc::new(Entity::new(&top, "tb"));

        let ports = DutPorts::new(&engine, &top);
        ports.set_idle_inputs();

        let sequencer = ClockResetSequencer::new_and_register(
            &engine,
            &entity,
            &ports.clk,
            &ports.clk90,
            &ports.rst,
            config.clk_period_ps,
        );

        let phys = [&ports.phy0, &ports.phy1]
            .into_iter()
            .enumerate()
            .map(|(i, pins)| -> Result<RgmiiPhy, SimError> {
                Ok(RgmiiPhy::new_and_register(
                    &engine,
                    &entity,
                    &format!("phy{i}"),
                    pins.tx_bus()?,
                    pins.rx_bus()?,
                    config.speed,
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let scenario = ConvScenario::new_and_register(
            &engine,
            &entity,
            config.clone(),
            &ports.clk,
            sequencer.clone(),
            &phys[0],
        )?;

        info!(entity ; "seed {} at {}", config.seed, config.speed);
        Ok(Self {
            entity,
            engine,
            ports,
            sequencer,
            phys,
            scenario,
            config,
        })
    }

    /// Connect the behavioural model of the device to the pins, addressed as
    /// the testbench expects.
    pub fn attach_fpga_core(&self, fault: Fault) -> Result<Rc<FpgaCore>, SimError> {
        let device = &self.config.device;
        let config = FpgaCoreConfig {
            mac: device.mac,
            ip: device.ip,
            port: device.port,
            speed: self.config.speed,
            fault,
        };
        FpgaCore::new_and_register(&self.engine, self.engine.top(), &self.ports, config)
    }

    #[must_use]
    pub fn config(&self) -> &TestbenchConfig {
        &self.config
    }

    /// Run the scenario to completion. The capture is written whether or not
    /// the device passes.
    pub fn run(&mut self) -> Result<Report, TbFailure> {
        let result = self.engine.run_until(Box::new(self.scenario.done()));

        let verdict = match (self.scenario.take_verdict(), result) {
            (Some(verdict), _) => verdict,
            (None, Err(e)) => {
                // Something other than the scenario stopped the simulation
                if let Err(capture_failure) = self.scenario.write_capture() {
                    warn!(self.entity ; "{capture_failure}");
                }
                Err(TbFailure::Simulation(e.0))
            }
            (None, Ok(())) => Err(TbFailure::Simulation(
                "simulation finished without a verdict".to_string(),
            )),
        };

        match &verdict {
            Ok(_) => {
                info!(self.entity ; "PASS at {:.3}ns", self.engine.time_now_ns());
            }
            Err(failure) => {
                error!(self.entity ; "FAIL ({}) at {:.3}ns", failure.kind(), self.engine.time_now_ns());
            }
        }
        verdict
    }
}
