// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Raw frame bytes with a lazily parsed view.

use std::cell::OnceCell;
use std::fmt;

use crate::packet::Packet;
use crate::{CodecError, hex_dump};

/// An immutable Ethernet frame (no preamble or FCS, possibly padded).
///
/// Two frames are equal when their bytes are equal.
#[derive(Clone)]
pub struct Frame {
    bytes: Vec<u8>,
    parsed: OnceCell<Result<Packet, CodecError>>,
}

impl Frame {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            parsed: OnceCell::new(),
        }
    }

    pub fn from_packet(packet: &Packet) -> Result<Self, CodecError> {
        let frame = Self::new(packet.build()?);
        let _ = frame.parsed.set(Ok(packet.clone()));
        Ok(frame)
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The decoded frame. Decoding happens on first use.
    pub fn packet(&self) -> Result<&Packet, CodecError> {
        self.parsed
            .get_or_init(|| Packet::parse(&self.bytes))
            .as_ref()
            .map_err(Clone::clone)
    }

    #[must_use]
    pub fn hex_dump(&self) -> String {
        hex_dump(&self.bytes)
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Frame {}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Frame")
            .field("len", &self.bytes.len())
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.packet() {
            Ok(packet) => write!(f, "{packet}"),
            Err(e) => write!(f, "undecodable frame of {} bytes ({})", self.len(), e.0),
        }
    }
}
