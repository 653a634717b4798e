// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Whole frames as structured values.
//!
//! [`Packet::build`] and [`Packet::parse`] are inverses: parsing the bytes
//! built from a packet gives back an equal packet. Derived fields (lengths
//! and checksums) are computed by `build` and verified by `parse`.

use std::fmt;
use std::net::Ipv4Addr;

use crate::CodecError;
use crate::arp::{ARP_LEN, ArpBody, ArpOperation};
use crate::ethernet::{ETH_HEADER_LEN, EtherType, EthernetHeader, MacAddr};
use crate::ipv4::{IPV4_HEADER_LEN, Ipv4Header, PROTOCOL_UDP};
use crate::udp::{UDP_HEADER_LEN, UdpHeader};

/// The addressing and payload of a UDP frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpFrameFields {
    pub eth_dst: MacAddr,
    pub eth_src: MacAddr,
    pub ip_src: Ipv4Addr,
    pub ip_dst: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: Vec<u8>,
}

impl UdpFrameFields {
    /// The fields of a reply to this frame: addresses and ports swapped.
    #[must_use]
    pub fn reversed(&self, payload: Vec<u8>) -> Self {
        Self {
            eth_dst: self.eth_src,
            eth_src: self.eth_dst,
            ip_src: self.ip_dst,
            ip_dst: self.ip_src,
            src_port: self.dst_port,
            dst_port: self.src_port,
            payload,
        }
    }
}

/// The addressing of an ARP frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpFrameFields {
    pub eth_dst: MacAddr,
    pub eth_src: MacAddr,
    pub op: ArpOperation,
    pub sha: MacAddr,
    pub spa: Ipv4Addr,
    pub tha: MacAddr,
    pub tpa: Ipv4Addr,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UdpPacket {
    pub eth: EthernetHeader,
    pub ip: Ipv4Header,
    pub udp: UdpHeader,
    pub payload: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArpPacket {
    pub eth: EthernetHeader,
    pub arp: ArpBody,
}

/// A frame of one of the supported protocol stacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Packet {
    Udp(UdpPacket),
    Arp(ArpPacket),
}

impl Packet {
    #[must_use]
    pub fn udp(fields: UdpFrameFields) -> Self {
        Self::Udp(UdpPacket {
            eth: EthernetHeader {
                dst: fields.eth_dst,
                src: fields.eth_src,
                ether_type: EtherType::Ipv4,
            },
            ip: Ipv4Header::new(PROTOCOL_UDP, fields.ip_src, fields.ip_dst),
            udp: UdpHeader {
                src_port: fields.src_port,
                dst_port: fields.dst_port,
            },
            payload: fields.payload,
        })
    }

    #[must_use]
    pub fn arp(fields: ArpFrameFields) -> Self {
        Self::Arp(ArpPacket {
            eth: EthernetHeader {
                dst: fields.eth_dst,
                src: fields.eth_src,
                ether_type: EtherType::Arp,
            },
            arp: ArpBody::new(fields.op, fields.sha, fields.spa, fields.tha, fields.tpa),
        })
    }

    #[must_use]
    pub fn eth(&self) -> &EthernetHeader {
        match self {
            Self::Udp(udp) => &udp.eth,
            Self::Arp(arp) => &arp.eth,
        }
    }

    #[must_use]
    pub fn as_udp(&self) -> Option<&UdpPacket> {
        match self {
            Self::Udp(udp) => Some(udp),
            Self::Arp(_) => None,
        }
    }

    #[must_use]
    pub fn as_arp(&self) -> Option<&ArpPacket> {
        match self {
            Self::Arp(arp) => Some(arp),
            Self::Udp(_) => None,
        }
    }

    /// Serialise the frame (without preamble, padding or FCS).
    pub fn build(&self) -> Result<Vec<u8>, CodecError> {
        match self {
            Self::Udp(udp) => {
                let udp_len = UDP_HEADER_LEN + udp.payload.len();
                let mut buf = Vec::with_capacity(ETH_HEADER_LEN + IPV4_HEADER_LEN + udp_len);
                udp.eth.write(&mut buf);
                udp.ip.write(&mut buf, udp_len)?;
                udp.udp
                    .write(&mut buf, udp.ip.src, udp.ip.dst, &udp.payload)?;
                Ok(buf)
            }
            Self::Arp(arp) => {
                let mut buf = Vec::with_capacity(ETH_HEADER_LEN + ARP_LEN);
                arp.eth.write(&mut buf);
                arp.arp.write(&mut buf);
                Ok(buf)
            }
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        let eth = EthernetHeader::parse(data)?;
        let body = &data[ETH_HEADER_LEN..];
        match eth.ether_type {
            EtherType::Ipv4 => {
                let (ip, ip_payload) = Ipv4Header::parse(body)?;
                if ip.protocol != PROTOCOL_UDP {
                    return Err(CodecError(format!(
                        "unsupported IP protocol {}",
                        ip.protocol
                    )));
                }
                let (udp, payload) = UdpHeader::parse(ip_payload, ip.src, ip.dst)?;
                Ok(Self::Udp(UdpPacket {
                    eth,
                    ip,
                    udp,
                    payload: payload.to_vec(),
                }))
            }
            EtherType::Arp => Ok(Self::Arp(ArpPacket {
                eth,
                arp: ArpBody::parse(body)?,
            })),
            EtherType::Other(raw) => Err(CodecError(format!(
                "unsupported EtherType {raw:#06x}"
            ))),
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Udp(udp) => write!(
                f,
                "UDP {} -> {}, {}:{} -> {}:{}, {} bytes",
                udp.eth.src,
                udp.eth.dst,
                udp.ip.src,
                udp.udp.src_port,
                udp.ip.dst,
                udp.udp.dst_port,
                udp.payload.len()
            ),
            Self::Arp(arp) => write!(
                f,
                "ARP {:?} {} -> {}, {} ({}) -> {} ({})",
                arp.arp.op,
                arp.eth.src,
                arp.eth.dst,
                arp.arp.spa,
                arp.arp.sha,
                arp.arp.tpa,
                arp.arp.tha
            ),
        }
    }
}
