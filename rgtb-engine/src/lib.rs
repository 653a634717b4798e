// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

#![doc(test(attr(warn(unused))))]

//! Discrete-event engine for driving signal-level models.
//!
//! The [engine](crate::engine::Engine) runs `async` tasks on a single thread.
//! Tasks communicate through [signals](crate::signal::Signal) and
//! [events](crate::events) and wait for simulated time to pass using a
//! [timer](crate::time::timer::Timer).
//!
//! Time is measured in picoseconds. Signal writes are applied at the end of
//! each delta cycle so that a task sampling on a clock edge always sees the
//! values from before the edge.
//!
//! # Simple Application
//!
//! ```rust
//! use rgtb_engine::engine::Engine;
//! use rgtb_engine::run_simulation;
//!
//! let mut engine = Engine::default();
//! let clk = engine.signal(engine.top(), "clk", 1);
//! let timer = engine.timer();
//! {
//!     let clk = clk.clone();
//!     engine.spawn(async move {
//!         for _ in 0..4 {
//!             timer.wait_ps(2000).await;
//!             clk.set(clk.value() ^ 1);
//!         }
//!         Ok(())
//!     });
//! }
//! run_simulation!(engine);
//! assert_eq!(clk.num_rising_edges(), 2);
//! assert_eq!(engine.time_now_ps(), 8000);
//! ```

pub mod engine;
pub mod events;
pub mod executor;
pub mod signal;
pub mod test_helpers;
pub mod time;
pub mod traits;
pub mod types;

#[macro_export]
/// Run the simulation and check how it completes.
///
/// With only an engine the run must succeed. When an expected message is given
/// the run must fail with exactly that error text.
macro_rules! run_simulation {
    ($engine:ident) => {
        $engine.run().unwrap();
    };
    ($engine:ident, $expect:expr) => {
        match $engine.run() {
            Ok(()) => panic!("Expected an error!"),
            Err(e) => assert_eq!(format!("{e}").as_str(), $expect),
        }
    };
}
