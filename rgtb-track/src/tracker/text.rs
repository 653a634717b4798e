// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::tracker::{EntityManager, Track};
use crate::{SharedWriter, Tag, Writer};

/// A simple text tracker to output messages to a Writer.
///
/// Every line is prefixed with the current simulation time and the full
/// name of the entity that emitted it.
pub struct TextTracker {
    entity_manager: EntityManager,

    /// Writer to which all _log_ events will be written.
    writer: SharedWriter,
}

impl TextTracker {
    /// Create a new [`TextTracker`] with an [`EntityManager`].
    pub fn new(entity_manager: EntityManager, writer: Writer) -> Self {
        Self {
            entity_manager,
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    fn write_line(&self, line: std::fmt::Arguments) {
        if let Ok(mut writer) = self.writer.lock() {
            // A failing log sink must not abort the simulation.
            let _ = writeln!(writer, "{:>12.3}ns {}", self.entity_manager.time(), line);
        }
    }
}

/// Implementation for each [`Track`] event
impl Track for TextTracker {
    fn unique_tag(&self) -> Tag {
        self.entity_manager.unique_tag()
    }

    fn is_entity_enabled(&self, tag: Tag, level: log::Level) -> bool {
        self.entity_manager.is_enabled(tag, level)
    }

    fn add_entity(&self, tag: Tag, entity_name: &str) {
        self.entity_manager.add_entity(tag, entity_name);
    }

    fn create(&self, created_by: Tag, created: Tag, name: &str) {
        self.write_line(format_args!("{created_by}: created {created}, {name}"));
    }

    fn destroy(&self, destroyed_by: Tag, destroyed: Tag) {
        self.write_line(format_args!("{destroyed_by}: destroyed {destroyed}"));
    }

    fn log(&self, msg_by: Tag, level: log::Level, msg: std::fmt::Arguments) {
        let name = self.entity_manager.entity_name(msg_by);
        self.write_line(format_args!("{name} {level}: {msg}"));
    }

    fn time(&self, _set_by: Tag, time_ns: f64) {
        self.entity_manager.set_time(time_ns);
    }

    fn shutdown(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::Arc;

    use super::*;
    use crate::Tracker;
    use crate::entity::{Entity, toplevel};
    use crate::{info, trace};

    #[test]
    fn lines_carry_time_and_name() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let writer: Writer = Box::new(file.reopen().unwrap());

        let manager = EntityManager::new(log::Level::Info);
        let tracker: Tracker = Arc::new(TextTracker::new(manager, writer));

        let top = toplevel(&tracker, "top");
        let phy = Entity::new(&top, "phy0");
        tracker.time(top.tag, 12.5);
        info!(phy ; "frame {} sent", 3);
        trace!(phy ; "not emitted");
        tracker.shutdown();

        let mut contents = String::new();
        file.read_to_string(&mut contents).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("12.500ns top::phy0 INFO: frame 3 sent"));
    }
}
