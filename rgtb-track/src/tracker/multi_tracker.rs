// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use crate::Tag;
use crate::tracker::{EntityManager, Track, Tracker};

/// Container for multiple [`Tracker`]s
///
/// Tags are allocated here so that every contained tracker sees the same tag
/// for the same entity.
pub struct MultiTracker {
    entity_manager: EntityManager,
    trackers: Vec<Tracker>,
}

impl MultiTracker {
    /// Add a new tracker
    pub fn add_tracker(&mut self, tracker: Tracker) {
        self.trackers.push(tracker);
    }
}

impl Default for MultiTracker {
    fn default() -> Self {
        Self {
            // Create a local entity_manager that will just be used for handling tags
            entity_manager: EntityManager::new(log::Level::Error),
            trackers: Vec::new(),
        }
    }
}

impl Track for MultiTracker {
    fn unique_tag(&self) -> Tag {
        self.entity_manager.unique_tag()
    }

    fn is_entity_enabled(&self, tag: Tag, level: log::Level) -> bool {
        self.trackers
            .iter()
            .any(|tracker| tracker.is_entity_enabled(tag, level))
    }

    fn add_entity(&self, tag: Tag, entity_name: &str) {
        for tracker in &self.trackers {
            tracker.add_entity(tag, entity_name);
        }
    }

    fn create(&self, created_by: Tag, created: Tag, name: &str) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(created, log::Level::Trace) {
                tracker.create(created_by, created, name);
            }
        }
    }

    fn destroy(&self, destroyed_by: Tag, destroyed: Tag) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(destroyed, log::Level::Trace) {
                tracker.destroy(destroyed_by, destroyed);
            }
        }
    }

    fn log(&self, msg_by: Tag, level: log::Level, msg: std::fmt::Arguments) {
        for tracker in &self.trackers {
            if tracker.is_entity_enabled(msg_by, level) {
                tracker.log(msg_by, level, msg);
            }
        }
    }

    fn time(&self, set_by: Tag, time_ns: f64) {
        for tracker in &self.trackers {
            tracker.time(set_by, time_ns);
        }
    }

    fn shutdown(&self) {
        for tracker in &self.trackers {
            tracker.shutdown();
        }
    }
}
