// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Helpers for setting up an engine within tests.

use std::fs;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;

use rgtb_track::tracker::{EntityManager, TextTracker};
use rgtb_track::{Tracker, Writer};

use crate::engine::Engine;

/// Create a tracker that writes all `Debug` and above messages to a log file
/// named after the test source file.
///
/// # Panics
///
/// If the `traces` folder or log file cannot be created.
#[must_use]
pub fn create_tracker(full_filepath: &str) -> Tracker {
    // Place all trace files in one folder
    const FOLDER: &str = "traces";

    // Create that folder if it doesn't exist yet
    fs::create_dir_all(FOLDER).unwrap();

    let filename_only = Path::new(full_filepath)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap();

    let log_writer: Writer = Box::new(BufWriter::new(
        fs::File::create(format!("{FOLDER}/{filename_only}.log")).unwrap(),
    ));

    let entity_manager = EntityManager::new(log::Level::Debug);
    let tracker: Tracker = Arc::new(TextTracker::new(entity_manager, log_writer));
    tracker
}

#[must_use]
pub fn start_test(full_filepath: &str) -> Engine {
    Engine::new(&create_tracker(full_filepath))
}
