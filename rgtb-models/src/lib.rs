// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

#![doc(test(attr(warn(unused))))]

//! Signal-level models used to exercise the correlation offload device.
//!
//! - [`clock_reset`] generates the device clocks and its reset pulse.
//! - [`rgmii`] models the Ethernet PHYs attached to the device.
//! - [`dut`] declares the device's pins.
//! - [`fpga_core`] is a behavioural model of the device itself.
//! - [`golden`] computes the results the device should return.
//!
//! # Example
//!
//! ```rust
//! use rgtb_engine::engine::Engine;
//! use rgtb_models::clock_reset::{ClockResetSequencer, DEFAULT_CLK_PERIOD_PS};
//! use rgtb_models::dut::DutPorts;
//!
//! let mut engine = Engine::default();
//! let ports = DutPorts::new(&engine, engine.top());
//! ports.set_idle_inputs();
//! let sequencer = ClockResetSequencer::new_and_register(
//!     &engine,
//!     engine.top(),
//!     &ports.clk,
//!     &ports.clk90,
//!     &ports.rst,
//!     DEFAULT_CLK_PERIOD_PS,
//! );
//!
//! let done = rgtb_engine::events::once::Once::default();
//! {
//!     let done = done.clone();
//!     engine.spawn(async move {
//!         sequencer.sequence_reset().await?;
//!         done.notify()
//!     });
//! }
//! engine.run_until(Box::new(done)).unwrap();
//! assert_eq!(ports.clk.num_rising_edges(), 20);
//! assert_eq!(ports.rst.value(), 0);
//! ```

pub mod clock_reset;
pub mod dut;
pub mod fpga_core;
pub mod golden;
pub mod rgmii;
