// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Define the [`Track`] trait and a number of [`Tracker`]s.

/// Include the /dev/null tracker.
pub mod dev_null;
/// Include the multi-tracker.
pub mod multi_tracker;
/// Include the text-based tracker.
pub mod text;

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

pub use dev_null::DevNullTracker;
pub use multi_tracker::MultiTracker;
use regex::Regex;
pub use text::TextTracker;

use crate::{ROOT, Tag};

/// This is the interface that is supported by all [`Tracker`]s.
pub trait Track {
    /// Allocate a new global tag
    fn unique_tag(&self) -> Tag;

    /// Determine whether the entity with the given tag should emit events at
    /// the given level.
    fn is_entity_enabled(&self, tag: Tag, level: log::Level) -> bool;

    /// Register the full name of an entity against its tag.
    fn add_entity(&self, tag: Tag, entity_name: &str);

    /// Track when an entity with the given tag is created.
    fn create(&self, created_by: Tag, created: Tag, name: &str);

    /// Track when an entity with the given tag is destroyed.
    fn destroy(&self, destroyed_by: Tag, destroyed: Tag);

    /// Track a log message of the given level.
    fn log(&self, msg_by: Tag, level: log::Level, msg: fmt::Arguments);

    /// Advance the time to the time specified in `ns`.
    fn time(&self, set_by: Tag, time_ns: f64);

    /// Flush any buffered output. Called once at the end of a run.
    fn shutdown(&self);
}

/// The type of a [`Tracker`] that is shared across entities.
pub type Tracker = Arc<dyn Track + Send + Sync>;

/// Error returned when a tracker cannot be configured as requested.
#[derive(Debug)]
pub struct TrackConfigError(pub String);

impl fmt::Display for TrackConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {}", self.0)
    }
}

impl std::error::Error for TrackConfigError {}

/// Create a [`Tracker`] that prints all log events at `Warn` and above to
/// `stdout`.
pub fn stdout_tracker() -> Tracker {
    let entity_manager = EntityManager::new(log::Level::Warn);
    let stdout_writer = Box::new(io::BufWriter::new(io::stdout()));
    let tracker: Tracker = Arc::new(TextTracker::new(entity_manager, stdout_writer));
    tracker
}

/// Create a [`Tracker`] that suppresses all track events.
pub fn dev_null_tracker() -> Tracker {
    let tracker: Tracker = Arc::new(DevNullTracker {});
    tracker
}

/// The [`EntityManager`] is responsible for determining entity log levels.
///
/// It is shared by the text-based trackers and also allocates unique
/// [`Tag`] values and remembers the current simulation time.
pub struct EntityManager {
    /// Level of _log_ events to output for entities matching no filter.
    default_log_level: log::Level,

    /// List of regular expressions mapping entity names to log levels.
    regex_to_log_level: Vec<(Regex, log::Level)>,

    /// Resolved level and full name of every registered entity.
    entities: Mutex<HashMap<Tag, (log::Level, String)>>,

    /// Used to assign unique tags.
    unique_tag: AtomicU64,

    /// Keep track of the current time.
    current_time_ns: Mutex<f64>,
}

impl EntityManager {
    /// Constructor with the default [`log::Level`]
    #[must_use]
    pub fn new(default_log_level: log::Level) -> Self {
        Self {
            default_log_level,
            regex_to_log_level: Vec::new(),
            entities: Mutex::new(HashMap::new()),
            unique_tag: AtomicU64::new(ROOT.0 + 1),
            current_time_ns: Mutex::new(0.0),
        }
    }

    /// Add a log filter regular expression.
    ///
    /// Filters are checked in the order they are added and the first match
    /// wins. Filters only apply to entities registered after the filter.
    ///
    /// # Example
    ///
    /// ```rust
    /// use rgtb_track::tracker::EntityManager;
    /// let mut manager = EntityManager::new(log::Level::Warn);
    /// manager.add_entity_level_filter(".*phy0.*", log::Level::Trace).unwrap();
    /// ```
    pub fn add_entity_level_filter(
        &mut self,
        regex_str: &str,
        level: log::Level,
    ) -> Result<(), TrackConfigError> {
        match Regex::new(regex_str) {
            Ok(regex) => {
                self.regex_to_log_level.push((regex, level));
                Ok(())
            }
            Err(e) => Err(TrackConfigError(format!(
                "Failed to parse regex {regex_str}:\n{e}\n"
            ))),
        }
    }

    pub(crate) fn unique_tag(&self) -> Tag {
        let tag = self.unique_tag.fetch_add(1, Ordering::SeqCst);
        Tag(tag)
    }

    fn log_level_for(&self, entity_name: &str) -> log::Level {
        for (regex, level) in self.regex_to_log_level.iter() {
            if regex.is_match(entity_name) {
                return *level;
            }
        }
        self.default_log_level
    }

    pub(crate) fn add_entity(&self, tag: Tag, entity_name: &str) {
        let level = self.log_level_for(entity_name);
        if let Ok(mut entities) = self.entities.lock() {
            entities.insert(tag, (level, entity_name.to_owned()));
        }
    }

    pub(crate) fn is_enabled(&self, tag: Tag, level: log::Level) -> bool {
        let max_level = match self.entities.lock() {
            Ok(entities) => entities
                .get(&tag)
                .map_or(self.default_log_level, |(level, _)| *level),
            Err(_) => self.default_log_level,
        };
        level <= max_level
    }

    pub(crate) fn entity_name(&self, tag: Tag) -> String {
        match self.entities.lock() {
            Ok(entities) => entities
                .get(&tag)
                .map_or_else(|| tag.to_string(), |(_, name)| name.clone()),
            Err(_) => tag.to_string(),
        }
    }

    pub(crate) fn time(&self) -> f64 {
        self.current_time_ns.lock().map_or(0.0, |time| *time)
    }

    pub(crate) fn set_time(&self, new_time_ns: f64) {
        if let Ok(mut time_guard) = self.current_time_ns.lock() {
            assert!(new_time_ns >= *time_guard, "Time moving backwards");
            *time_guard = new_time_ns;
        }
    }
}
