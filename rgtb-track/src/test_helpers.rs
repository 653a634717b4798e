// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! This module provides helper functions for testing tracked output
//!
//! The aim of this module is to provide commonly-used functions that enable
//! the testing of the output that should appear from the tracking macros.

use core::sync::atomic::Ordering;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;

use regex::Regex;

use crate::{Tag, Track};

/// A tracker that keeps track events in memory.
pub struct TestTracker {
    events: Mutex<Vec<String>>,

    unique_tag: AtomicU64,
}

impl TestTracker {
    /// Create a new [`Tracker`](crate::Tracker) for the tests.
    ///
    /// This keeps the track events in memory for checking later.
    #[must_use]
    pub fn new(initial_tag: u64) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            unique_tag: AtomicU64::new(initial_tag),
        }
    }

    fn add_event(&self, event: String) {
        println!("{event}");
        let mut events = self.events.lock().unwrap();
        events.push(event);
    }

    /// Return a copy of the events recorded so far.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Track for TestTracker {
    fn unique_tag(&self) -> Tag {
        let tag = self.unique_tag.fetch_add(1, Ordering::SeqCst);
        Tag(tag)
    }

    fn is_entity_enabled(&self, _tag: Tag, _level: log::Level) -> bool {
        true
    }

    fn add_entity(&self, _tag: Tag, _entity_name: &str) {
        // Do nothing
    }

    fn create(&self, created_by: Tag, created: Tag, name: &str) {
        self.add_event(format!("{created_by}: created {created}, {name}"));
    }

    fn destroy(&self, destroyed_by: Tag, destroyed: Tag) {
        self.add_event(format!("{destroyed_by}: destroyed {destroyed}"));
    }

    fn log(&self, msg_by: Tag, level: log::Level, msg: std::fmt::Arguments) {
        self.add_event(format!("{msg_by}:{level}: {msg}"));
    }

    fn time(&self, _set_by: Tag, _time_ns: f64) {
        // Time updates are too frequent to be useful in test output
    }

    fn shutdown(&self) {
        // Do nothing
    }
}

/// Create a [`TestTracker`] and the [`Tracker`](crate::Tracker) handle to it.
///
/// # Arguments
///
/// * `start_tag` - The tag value to be allocated first
///
/// # Examples
///
/// ```
/// use rgtb_track::test_helpers;
///
/// let (test_tracker, tracker) = rgtb_track::test_init!(10);
/// let top = rgtb_track::entity::toplevel(&tracker, "top");
/// test_helpers::check_and_clear(&test_tracker, &["0: created 10, top"]);
/// ```
#[macro_export]
macro_rules! test_init {
    ($start_tag:expr) => {{
        let test_tracker = std::sync::Arc::new($crate::test_helpers::TestTracker::new($start_tag));
        let tracker: $crate::Tracker = test_tracker.clone();
        (test_tracker, tracker)
    }};
}

/// Check and clear the _trace_ and _log_ output
///
/// This function asserts that the output lines seen since the start or the
/// last time this function was called match the `expected` regular
/// expressions, in order. It then clears the recorded output.
pub fn check_and_clear(tracker: &TestTracker, expected: &[&str]) {
    let mut log_contents_ref = tracker.events.lock().unwrap();

    println!("Checking {:?} matches {:?}", expected, *log_contents_ref);

    // Check that there are the same number of strings produced as expected
    assert_eq!(expected.len(), log_contents_ref.len());

    for (i, (log_expect, actual)) in expected.iter().zip(log_contents_ref.iter()).enumerate() {
        let re = Regex::new(log_expect).unwrap();
        println!("Checking {i}: {log_expect:?} matches {actual:?}");
        assert!(re.is_match(actual));
    }

    log_contents_ref.clear();
}
