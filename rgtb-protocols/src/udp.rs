// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! UDP header with the checksum computed over the IPv4 pseudo-header.

use std::net::Ipv4Addr;

use crate::ipv4::{PROTOCOL_UDP, finish_checksum, ones_complement_sum};
use crate::{CodecError, be_u16};

pub const UDP_HEADER_LEN: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
}

/// Checksum over the pseudo-header and the datagram as given. For a datagram
/// which already carries a correct checksum the result is zero.
fn datagram_sum(src: Ipv4Addr, dst: Ipv4Addr, datagram: &[u8]) -> u16 {
    let mut pseudo = [0u8; 12];
    pseudo[0..4].copy_from_slice(&src.octets());
    pseudo[4..8].copy_from_slice(&dst.octets());
    pseudo[9] = PROTOCOL_UDP;
    pseudo[10..12].copy_from_slice(&(datagram.len() as u16).to_be_bytes());

    let sum = ones_complement_sum(0, &pseudo);
    finish_checksum(ones_complement_sum(sum, datagram))
}

impl UdpHeader {
    /// Append the header and payload.
    pub fn write(
        &self,
        buf: &mut Vec<u8>,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        payload: &[u8],
    ) -> Result<(), CodecError> {
        let length = u16::try_from(UDP_HEADER_LEN + payload.len()).map_err(|_| {
            CodecError(format!("UDP payload of {} bytes too large", payload.len()))
        })?;

        let start = buf.len();
        buf.extend_from_slice(&self.src_port.to_be_bytes());
        buf.extend_from_slice(&self.dst_port.to_be_bytes());
        buf.extend_from_slice(&length.to_be_bytes());
        buf.extend_from_slice(&[0, 0]);
        buf.extend_from_slice(payload);

        let checksum = match datagram_sum(src, dst, &buf[start..]) {
            // Zero means "no checksum" so a computed zero is sent as all ones
            0 => 0xffff,
            sum => sum,
        };
        buf[start + 6..start + 8].copy_from_slice(&checksum.to_be_bytes());
        Ok(())
    }

    /// Parse a datagram which must exactly fill `data` (the IPv4 payload).
    pub fn parse(data: &[u8], src: Ipv4Addr, dst: Ipv4Addr) -> Result<(Self, &[u8]), CodecError> {
        if data.len() < UDP_HEADER_LEN {
            return Err(CodecError::truncated(
                "UDP header",
                UDP_HEADER_LEN,
                data.len(),
            ));
        }
        let length = usize::from(be_u16(data, 4));
        if length != data.len() {
            return Err(CodecError(format!(
                "UDP length {length} does not match IPv4 payload length {}",
                data.len()
            )));
        }
        let stored = be_u16(data, 6);
        if stored != 0 && datagram_sum(src, dst, data) != 0 {
            return Err(CodecError(format!("bad UDP checksum {stored:#06x}")));
        }

        let header = Self {
            src_port: be_u16(data, 0),
            dst_port: be_u16(data, 2),
        };
        Ok((header, &data[UDP_HEADER_LEN..]))
    }
}
