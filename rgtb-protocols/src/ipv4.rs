// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! IPv4 header without options.

use std::net::Ipv4Addr;

use crate::{CodecError, be_u16};

pub const IPV4_HEADER_LEN: usize = 20;
pub const PROTOCOL_UDP: u8 = 17;
pub const DEFAULT_TTL: u8 = 64;

const FLAG_DONT_FRAGMENT: u16 = 0x4000;
const FLAG_MORE_FRAGMENTS: u16 = 0x2000;
const FRAGMENT_OFFSET_MASK: u16 = 0x1fff;

/// Sum 16-bit big-endian words using ones' complement addition (RFC 1071).
///
/// An odd trailing byte is padded with zero. The result is not inverted so
/// that partial sums can be combined.
#[must_use]
pub fn ones_complement_sum(initial: u32, data: &[u8]) -> u32 {
    let mut sum = initial;
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }
    sum
}

/// Fold a ones' complement sum to 16 bits and invert it.
#[must_use]
pub fn finish_checksum(mut sum: u32) -> u16 {
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

#[must_use]
pub fn header_checksum(header: &[u8]) -> u16 {
    finish_checksum(ones_complement_sum(0, header))
}

/// The fields of an IPv4 header that are not derived from the rest of the
/// packet. The total length and checksum are computed when writing and
/// checked when parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Header {
    pub tos: u8,
    pub identification: u16,
    pub dont_fragment: bool,
    pub ttl: u8,
    pub protocol: u8,
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
}

impl Ipv4Header {
    #[must_use]
    pub fn new(protocol: u8, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
        Self {
            tos: 0,
            identification: 1,
            dont_fragment: false,
            ttl: DEFAULT_TTL,
            protocol,
            src,
            dst,
        }
    }

    /// Append the header for a packet carrying `payload_len` bytes.
    pub fn write(&self, buf: &mut Vec<u8>, payload_len: usize) -> Result<(), CodecError> {
        let total_len = u16::try_from(IPV4_HEADER_LEN + payload_len)
            .map_err(|_| CodecError(format!("IPv4 payload of {payload_len} bytes too large")))?;
        let flags = if self.dont_fragment {
            FLAG_DONT_FRAGMENT
        } else {
            0
        };

        let start = buf.len();
        buf.push(0x45);
        buf.push(self.tos);
        buf.extend_from_slice(&total_len.to_be_bytes());
        buf.extend_from_slice(&self.identification.to_be_bytes());
        buf.extend_from_slice(&flags.to_be_bytes());
        buf.push(self.ttl);
        buf.push(self.protocol);
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(&self.src.octets());
        buf.extend_from_slice(&self.dst.octets());

        let checksum = header_checksum(&buf[start..]);
        buf[start + 10..start + 12].copy_from_slice(&checksum.to_be_bytes());
        Ok(())
    }

    /// Parse a header and return it with the payload it delimits. Bytes
    /// beyond the total length (link-layer padding) are ignored.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        if data.len() < IPV4_HEADER_LEN {
            return Err(CodecError::truncated(
                "IPv4 header",
                IPV4_HEADER_LEN,
                data.len(),
            ));
        }
        let version = data[0] >> 4;
        if version != 4 {
            return Err(CodecError(format!("bad IP version {version}")));
        }
        let header_len = usize::from(data[0] & 0xf) * 4;
        if header_len < IPV4_HEADER_LEN {
            return Err(CodecError(format!("bad IPv4 header length {header_len}")));
        }
        if data.len() < header_len {
            return Err(CodecError::truncated(
                "IPv4 header",
                header_len,
                data.len(),
            ));
        }

        let checksum = header_checksum(&data[..header_len]);
        if checksum != 0 {
            return Err(CodecError(format!(
                "bad IPv4 header checksum {:#06x}",
                be_u16(data, 10)
            )));
        }

        let total_len = usize::from(be_u16(data, 2));
        if total_len < header_len || total_len > data.len() {
            return Err(CodecError(format!(
                "IPv4 total length {total_len} inconsistent with {} available bytes",
                data.len()
            )));
        }

        let flags = be_u16(data, 6);
        if flags & (FLAG_MORE_FRAGMENTS | FRAGMENT_OFFSET_MASK) != 0 {
            return Err(CodecError("fragmented IPv4 packets are not supported".to_string()));
        }

        let header = Self {
            tos: data[1],
            identification: be_u16(data, 4),
            dont_fragment: flags & FLAG_DONT_FRAGMENT != 0,
            ttl: data[8],
            protocol: data[9],
            src: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            dst: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
        };
        Ok((header, &data[header_len..total_len]))
    }
}
