// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Classic libpcap capture files with nanosecond timestamps.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::CodecError;

/// Magic number identifying a little-endian file with nanosecond timestamps.
pub const PCAP_MAGIC_NS: u32 = 0xa1b2_3c4d;
pub const LINKTYPE_ETHERNET: u32 = 1;
pub const SNAPLEN: u32 = 65535;

const PS_PER_SEC: u64 = 1_000_000_000_000;
const PS_PER_NS: u64 = 1000;
const GLOBAL_HEADER_LEN: usize = 24;
const RECORD_HEADER_LEN: usize = 16;

/// Writes Ethernet frames to a capture.
pub struct PcapWriter<W: Write> {
    writer: W,
    num_records: usize,
}

impl PcapWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> PcapWriter<W> {
    /// Write the global header.
    pub fn new(mut writer: W) -> io::Result<Self> {
        writer.write_all(&PCAP_MAGIC_NS.to_le_bytes())?;
        writer.write_all(&2u16.to_le_bytes())?;
        writer.write_all(&4u16.to_le_bytes())?;
        // Timezone offset and timestamp accuracy
        writer.write_all(&0i32.to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?;
        writer.write_all(&SNAPLEN.to_le_bytes())?;
        writer.write_all(&LINKTYPE_ETHERNET.to_le_bytes())?;
        Ok(Self {
            writer,
            num_records: 0,
        })
    }

    /// Append a frame captured at simulation time `time_ps`.
    pub fn write_record(&mut self, time_ps: u64, data: &[u8]) -> io::Result<()> {
        let seconds = u32::try_from(time_ps / PS_PER_SEC)
            .map_err(|_| io::Error::other("capture timestamp out of range"))?;
        let nanos = ((time_ps % PS_PER_SEC) / PS_PER_NS) as u32;
        let orig_len = u32::try_from(data.len())
            .map_err(|_| io::Error::other("captured frame too large"))?;
        let captured = &data[..data.len().min(SNAPLEN as usize)];

        self.writer.write_all(&seconds.to_le_bytes())?;
        self.writer.write_all(&nanos.to_le_bytes())?;
        self.writer
            .write_all(&(captured.len() as u32).to_le_bytes())?;
        self.writer.write_all(&orig_len.to_le_bytes())?;
        self.writer.write_all(captured)?;
        self.num_records += 1;
        Ok(())
    }

    #[must_use]
    pub fn num_records(&self) -> usize {
        self.num_records
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// A frame read back from a capture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PcapRecord {
    pub time_ps: u64,
    pub data: Vec<u8>,
}

fn le_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Read all records from a capture written by [`PcapWriter`].
pub fn read_records(data: &[u8]) -> Result<Vec<PcapRecord>, CodecError> {
    if data.len() < GLOBAL_HEADER_LEN {
        return Err(CodecError::truncated(
            "pcap header",
            GLOBAL_HEADER_LEN,
            data.len(),
        ));
    }
    let magic = le_u32(data, 0);
    if magic != PCAP_MAGIC_NS {
        return Err(CodecError(format!("unsupported pcap magic {magic:#010x}")));
    }
    let link_type = le_u32(data, 20);
    if link_type != LINKTYPE_ETHERNET {
        return Err(CodecError(format!("unsupported link type {link_type}")));
    }

    let mut records = Vec::new();
    let mut offset = GLOBAL_HEADER_LEN;
    while offset < data.len() {
        let remaining = data.len() - offset;
        if remaining < RECORD_HEADER_LEN {
            return Err(CodecError::truncated(
                "pcap record header",
                RECORD_HEADER_LEN,
                remaining,
            ));
        }
        let seconds = u64::from(le_u32(data, offset));
        let nanos = u64::from(le_u32(data, offset + 4));
        let incl_len = le_u32(data, offset + 8) as usize;
        let start = offset + RECORD_HEADER_LEN;
        if data.len() - start < incl_len {
            return Err(CodecError::truncated(
                "pcap record",
                incl_len,
                data.len() - start,
            ));
        }
        records.push(PcapRecord {
            time_ps: seconds * PS_PER_SEC + nanos * PS_PER_NS,
            data: data[start..start + incl_len].to_vec(),
        });
        offset = start + incl_len;
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let writer = PcapWriter::new(Vec::new()).unwrap();
        let bytes = writer.finish().unwrap();
        assert_eq!(bytes.len(), GLOBAL_HEADER_LEN);
        assert_eq!(&bytes[..4], &[0x4d, 0x3c, 0xb2, 0xa1]);
        assert!(read_records(&bytes).unwrap().is_empty());
    }

    #[test]
    fn records_read_back() {
        let mut writer = PcapWriter::new(Vec::new()).unwrap();
        writer.write_record(1_500, &[1, 2, 3]).unwrap();
        writer
            .write_record(2 * PS_PER_SEC + 7_000, &[4; 60])
            .unwrap();
        assert_eq!(writer.num_records(), 2);

        let records = read_records(&writer.finish().unwrap()).unwrap();
        assert_eq!(records.len(), 2);
        // Sub-nanosecond time is truncated
        assert_eq!(records[0].time_ps, 1_000);
        assert_eq!(records[0].data, vec![1, 2, 3]);
        assert_eq!(records[1].time_ps, 2 * PS_PER_SEC + 7_000);
    }

    #[test]
    fn truncated_capture_rejected() {
        let mut writer = PcapWriter::new(Vec::new()).unwrap();
        writer.write_record(0, &[1, 2, 3]).unwrap();
        let mut bytes = writer.finish().unwrap();
        bytes.pop();
        assert!(read_records(&bytes).is_err());
    }
}
