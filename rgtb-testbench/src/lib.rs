// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

#![doc(test(attr(warn(unused))))]

//! Testbench for the correlation offload device.
//!
//! The device receives a UDP request holding a 3x3 kernel followed by every
//! 3x3 window of a 12x12 matrix. It resolves the requester's MAC address
//! with ARP and replies with the 10x10 correlation of matrix and kernel,
//! each cell truncated to a byte.
//!
//! The [`testbench`] builds the clocks, reset and PHY models around the
//! device's pins and the [`scenario`] drives the exchange, checks every
//! field of the frames returned and compares the result against the golden
//! model. Every frame is recorded in a [`packet_log`] and written to a
//! capture file.
//!
//! # Example
//!
//! ```rust
//! use rgtb_engine::engine::Engine;
//! use rgtb_models::fpga_core::Fault;
//! use rgtb_testbench::config::TestbenchConfig;
//! use rgtb_testbench::testbench::Testbench;
//! use rgtb_track::tracker::dev_null_tracker;
//!
//! let engine = Engine::new(&dev_null_tracker());
//! let mut testbench = Testbench::new(engine, TestbenchConfig::default()).unwrap();
//! testbench.attach_fpga_core(Fault::None).unwrap();
//! let report = testbench.run().unwrap();
//! assert_eq!(report.frames_sent, 3);
//! assert_eq!(report.frames_received, 3);
//! ```

pub mod config;
pub mod failure;
pub mod packet_log;
pub mod scenario;
pub mod testbench;
