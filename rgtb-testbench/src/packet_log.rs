// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Every frame exchanged with the device, in order.

use std::fmt;
use std::path::Path;

use rgtb_protocols::pcap::PcapWriter;

use crate::failure::TbFailure;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    ToDevice,
    FromDevice,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ToDevice => write!(f, "->"),
            Self::FromDevice => write!(f, "<-"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggedFrame {
    pub time_ps: u64,
    pub direction: Direction,
    pub data: Vec<u8>,
}

/// Append-only record of frames. Times must not decrease.
#[derive(Default)]
pub struct PacketLog {
    frames: Vec<LoggedFrame>,
}

impl PacketLog {
    /// # Panics
    ///
    /// If `time_ps` is earlier than the previous frame.
    pub fn record(&mut self, time_ps: u64, direction: Direction, data: &[u8]) {
        if let Some(last) = self.frames.last() {
            assert!(last.time_ps <= time_ps, "Packet log time moving backwards");
        }
        self.frames.push(LoggedFrame {
            time_ps,
            direction,
            data: data.to_vec(),
        });
    }

    #[must_use]
    pub fn frames(&self) -> &[LoggedFrame] {
        &self.frames
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of frames travelling in `direction`.
    #[must_use]
    pub fn count(&self, direction: Direction) -> usize {
        self.frames
            .iter()
            .filter(|frame| frame.direction == direction)
            .count()
    }

    /// Write all frames to a capture file and return how many were written.
    pub fn write_pcap(&self, path: &Path) -> Result<usize, TbFailure> {
        let to_failure = |e: std::io::Error| TbFailure::Capture(format!("{}: {e}", path.display()));

        let mut writer = PcapWriter::create(path).map_err(to_failure)?;
        for frame in &self.frames {
            writer
                .write_record(frame.time_ps, &frame.data)
                .map_err(to_failure)?;
        }
        let num_records = writer.num_records();
        writer.finish().map_err(to_failure)?;
        Ok(num_records)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use rgtb_protocols::pcap::read_records;

    use super::*;

    #[test]
    fn written_in_order() {
        let mut log = PacketLog::default();
        log.record(1000, Direction::ToDevice, &[1, 2, 3]);
        log.record(1000, Direction::FromDevice, &[4, 5]);
        log.record(5000, Direction::ToDevice, &[6]);
        assert_eq!(log.len(), 3);
        assert_eq!(log.count(Direction::ToDevice), 2);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.pcap");
        assert_eq!(log.write_pcap(&path).unwrap(), 3);

        let records = read_records(&fs::read(&path).unwrap()).unwrap();
        let data: Vec<Vec<u8>> = records.iter().map(|r| r.data.clone()).collect();
        assert_eq!(data, vec![vec![1, 2, 3], vec![4, 5], vec![6]]);
        assert_eq!(records[2].time_ps, 5000);
    }

    #[test]
    fn unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let log = PacketLog::default();
        let failure = log.write_pcap(&dir.path().join("missing").join("log.pcap"));
        assert!(matches!(failure, Err(TbFailure::Capture(_))));
    }

    #[test]
    #[should_panic(expected = "Packet log time moving backwards")]
    fn time_must_not_decrease() {
        let mut log = PacketLog::default();
        log.record(2000, Direction::ToDevice, &[1]);
        log.record(1000, Direction::ToDevice, &[1]);
    }
}
