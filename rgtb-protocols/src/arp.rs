// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! ARP for IPv4 over Ethernet.
//!
//! The fixed header fields are kept as received so that a peer which gets
//! them wrong can be reported field by field.

use std::net::Ipv4Addr;

use crate::ethernet::{MAC_BYTES, MacAddr};
use crate::{CodecError, be_u16};

pub const ARP_LEN: usize = 28;
pub const HTYPE_ETHERNET: u16 = 1;
pub const PTYPE_IPV4: u16 = 0x0800;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
    Other(u16),
}

impl ArpOperation {
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            1 => Self::Request,
            2 => Self::Reply,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn to_raw(self) -> u16 {
        match self {
            Self::Request => 1,
            Self::Reply => 2,
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpBody {
    pub htype: u16,
    pub ptype: u16,
    pub hlen: u8,
    pub plen: u8,
    pub op: ArpOperation,
    /// Sender hardware address.
    pub sha: MacAddr,
    /// Sender protocol address.
    pub spa: Ipv4Addr,
    /// Target hardware address.
    pub tha: MacAddr,
    /// Target protocol address.
    pub tpa: Ipv4Addr,
}

impl ArpBody {
    /// An ARP body with the standard Ethernet/IPv4 header values.
    #[must_use]
    pub fn new(
        op: ArpOperation,
        sha: MacAddr,
        spa: Ipv4Addr,
        tha: MacAddr,
        tpa: Ipv4Addr,
    ) -> Self {
        Self {
            htype: HTYPE_ETHERNET,
            ptype: PTYPE_IPV4,
            hlen: MAC_BYTES as u8,
            plen: 4,
            op,
            sha,
            spa,
            tha,
            tpa,
        }
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.htype.to_be_bytes());
        buf.extend_from_slice(&self.ptype.to_be_bytes());
        buf.push(self.hlen);
        buf.push(self.plen);
        buf.extend_from_slice(&self.op.to_raw().to_be_bytes());
        buf.extend_from_slice(&self.sha.0);
        buf.extend_from_slice(&self.spa.octets());
        buf.extend_from_slice(&self.tha.0);
        buf.extend_from_slice(&self.tpa.octets());
    }

    /// Parse the fixed 28 byte body. Trailing bytes are ignored.
    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < ARP_LEN {
            return Err(CodecError::truncated("ARP body", ARP_LEN, data.len()));
        }
        let ip = |offset: usize| {
            Ipv4Addr::new(
                data[offset],
                data[offset + 1],
                data[offset + 2],
                data[offset + 3],
            )
        };
        Ok(Self {
            htype: be_u16(data, 0),
            ptype: be_u16(data, 2),
            hlen: data[4],
            plen: data[5],
            op: ArpOperation::from_raw(be_u16(data, 6)),
            sha: MacAddr::from_slice(&data[8..]),
            spa: ip(14),
            tha: MacAddr::from_slice(&data[18..]),
            tpa: ip(24),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout() {
        let body = ArpBody::new(
            ArpOperation::Request,
            MacAddr::new(2, 0, 0, 0, 0, 0),
            Ipv4Addr::new(192, 168, 1, 128),
            MacAddr::ZERO,
            Ipv4Addr::new(192, 168, 1, 100),
        );
        let mut buf = Vec::new();
        body.write(&mut buf);
        assert_eq!(buf.len(), ARP_LEN);
        assert_eq!(&buf[..8], &[0, 1, 8, 0, 6, 4, 0, 1]);
        assert_eq!(&buf[24..], &[192, 168, 1, 100]);
    }

    #[test]
    fn nonstandard_fields_preserved() {
        let mut buf = Vec::new();
        ArpBody::new(
            ArpOperation::Reply,
            MacAddr::ZERO,
            Ipv4Addr::UNSPECIFIED,
            MacAddr::ZERO,
            Ipv4Addr::UNSPECIFIED,
        )
        .write(&mut buf);
        buf[1] = 6;
        buf[7] = 9;
        let body = ArpBody::parse(&buf).unwrap();
        assert_eq!(body.htype, 6);
        assert_eq!(body.op, ArpOperation::Other(9));
    }

    #[test]
    fn short_body_rejected() {
        assert!(ArpBody::parse(&[0; 27]).is_err());
    }
}
