// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Run the correlation offload test against the behavioural device.
//!
//! See `lib.rs` for details.

use rgtb_engine::engine::Engine;
use rgtb_engine::types::SimError;
use rgtb_testbench::config::Config;
use rgtb_testbench::testbench::Testbench;
use rgtb_track::builder::setup_trackers;

fn main() -> Result<(), SimError> {
    let config = Config::parse_all_sources()?;
    let tracker = setup_trackers(&config.trackers_config()?).map_err(|e| SimError(e.0))?;

    let engine = Engine::new(&tracker);
    let mut testbench = Testbench::new(engine, config.testbench_config()?)?;
    testbench.attach_fpga_core(config.fault()?)?;

    let verdict = testbench.run();
    tracker.shutdown();

    match verdict {
        Ok(report) => {
            println!("{report}");
            Ok(())
        }
        Err(failure) => {
            eprintln!("FAIL ({}): {failure}", failure.kind());
            Err(failure.into())
        }
    }
}
