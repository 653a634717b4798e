// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Ethernet II link-layer header.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;

use crate::{CodecError, be_u16};

pub const MAC_BYTES: usize = 6;
pub const ETH_HEADER_LEN: usize = 2 * MAC_BYTES + 2;

/// Shortest frame (without FCS) that may be put on the wire. Shorter frames
/// are padded with zeros.
pub const MIN_FRAME_LEN: usize = 60;

/// A 48-bit link-layer address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; MAC_BYTES]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; MAC_BYTES]);
    pub const ZERO: MacAddr = MacAddr([0; MAC_BYTES]);

    #[must_use]
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self([a, b, c, d, e, f])
    }

    #[must_use]
    pub fn octets(&self) -> [u8; MAC_BYTES] {
        self.0
    }

    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub(crate) fn from_slice(data: &[u8]) -> Self {
        let mut octets = [0; MAC_BYTES];
        octets.copy_from_slice(&data[..MAC_BYTES]);
        Self(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.iter().map(|b| format!("{b:02x}")).join(":"))
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for MacAddr {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != MAC_BYTES {
            return Err(CodecError(format!("'{s}' is not a MAC address")));
        }
        let mut octets = [0; MAC_BYTES];
        for (octet, part) in octets.iter_mut().zip(parts) {
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| CodecError(format!("'{s}' is not a MAC address")))?;
        }
        Ok(Self(octets))
    }
}

/// Protocol carried by an Ethernet frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EtherType {
    Ipv4,
    Arp,
    Other(u16),
}

impl EtherType {
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0x0800 => Self::Ipv4,
            0x0806 => Self::Arp,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub fn to_raw(self) -> u16 {
        match self {
            Self::Ipv4 => 0x0800,
            Self::Arp => 0x0806,
            Self::Other(raw) => raw,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ether_type: EtherType,
}

impl EthernetHeader {
    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        if data.len() < ETH_HEADER_LEN {
            return Err(CodecError::truncated(
                "Ethernet header",
                ETH_HEADER_LEN,
                data.len(),
            ));
        }
        Ok(Self {
            dst: MacAddr::from_slice(&data[0..]),
            src: MacAddr::from_slice(&data[MAC_BYTES..]),
            ether_type: EtherType::from_raw(be_u16(data, 2 * MAC_BYTES)),
        })
    }

    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.dst.0);
        buf.extend_from_slice(&self.src.0);
        buf.extend_from_slice(&self.ether_type.to_raw().to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_display_and_parse() {
        let mac = MacAddr::new(0x5a, 0x51, 0x52, 0x53, 0x54, 0x55);
        assert_eq!(mac.to_string(), "5a:51:52:53:54:55");
        assert_eq!("5a:51:52:53:54:55".parse::<MacAddr>().unwrap(), mac);
        assert_eq!(
            "ff:ff:ff:ff:ff:ff".parse::<MacAddr>().unwrap(),
            MacAddr::BROADCAST
        );
    }

    #[test]
    fn bad_mac_strings() {
        assert!("5a:51:52:53:54".parse::<MacAddr>().is_err());
        assert!("5a:51:52:53:54:zz".parse::<MacAddr>().is_err());
        assert!("".parse::<MacAddr>().is_err());
    }

    #[test]
    fn header_layout() {
        let header = EthernetHeader {
            dst: MacAddr::BROADCAST,
            src: MacAddr::new(2, 0, 0, 0, 0, 0),
            ether_type: EtherType::Arp,
        };
        let mut buf = Vec::new();
        header.write(&mut buf);
        assert_eq!(buf.len(), ETH_HEADER_LEN);
        assert_eq!(&buf[12..14], &[0x08, 0x06]);
        assert_eq!(EthernetHeader::parse(&buf).unwrap(), header);
    }

    #[test]
    fn short_header_rejected() {
        let err = EthernetHeader::parse(&[0; 13]).unwrap_err();
        assert_eq!(
            err.0,
            "truncated Ethernet header: needed 14 bytes, only 13 available"
        );
    }
}
