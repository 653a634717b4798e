// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Simulation time.
//!
//! Time is a single integer timeline measured in picoseconds. The
//! [`SimTime`](simtime::SimTime) owned by the executor advances the timeline
//! and the [`Timer`](timer::Timer) handle lets tasks suspend for a number of
//! time units.

pub mod simtime;
pub mod timer;

/// Number of picoseconds in one nanosecond.
pub const PS_PER_NS: u64 = 1000;
