// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Frame codec used by the testbench.
//!
//! The codec is a set of pure functions which build and parse the frames
//! exchanged with the device under test:
//!
//!  - [`ethernet`]: link-layer header and MAC addresses.
//!  - [`ipv4`] / [`udp`]: network and transport headers with checksums.
//!  - [`arp`]: address resolution requests and replies.
//!  - [`packet`]: a whole frame as a structured [`Packet`](packet::Packet).
//!  - [`frame`]: raw bytes with a lazily computed [`Packet`](packet::Packet).
//!  - [`gmii`]: preamble, SFD, padding and FCS as seen on the wire.
//!  - [`pcap`]: capture files readable by standard tools.

pub mod arp;
pub mod error;
pub mod ethernet;
pub mod frame;
pub mod gmii;
pub mod ipv4;
pub mod packet;
pub mod pcap;
pub mod udp;

pub use error::CodecError;

/// Fetch a big-endian `u16` at `offset`. The caller checks the length.
fn be_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

/// Render bytes as lines of 16 space-separated hex values prefixed with the
/// offset of the first byte.
#[must_use]
pub fn hex_dump(data: &[u8]) -> String {
    use itertools::Itertools;

    data.chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            format!(
                "{:04x}: {}",
                i * 16,
                chunk.iter().map(|b| format!("{b:02x}")).join(" ")
            )
        })
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_lines() {
        let data: Vec<u8> = (0..20).collect();
        let dump = hex_dump(&data);
        let lines: Vec<_> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000: 00 01 02"));
        assert_eq!(lines[1], "0010: 10 11 12 13");
    }
}
