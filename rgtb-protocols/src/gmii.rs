// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Frames as they appear on a byte-wide media-independent interface.
//!
//! On the wire a frame is preceded by a preamble of `0x55` bytes and the
//! start-of-frame delimiter `0xd5`, padded to the minimum frame size and
//! followed by the IEEE 802.3 frame check sequence.

use std::fmt;

use crate::ethernet::MIN_FRAME_LEN;

pub const PREAMBLE_BYTE: u8 = 0x55;
pub const PREAMBLE_LEN: usize = 7;
pub const SFD: u8 = 0xd5;
pub const FCS_LEN: usize = 4;

const CRC32_POLY: u32 = 0xedb8_8320;

const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 == 1 {
                (crc >> 1) ^ CRC32_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// The IEEE 802.3 CRC-32 of `data`.
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    !data.iter().fold(!0u32, |crc, byte| {
        CRC32_TABLE[((crc ^ u32::from(*byte)) & 0xff) as usize] ^ (crc >> 8)
    })
}

/// Reasons a received frame cannot be unwrapped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FramingError {
    /// The error signal was asserted while receiving the byte at `offset`.
    RxError { offset: usize },
    /// Frame data did not start with a preamble.
    NoPreamble,
    /// The preamble was not followed by the start-of-frame delimiter.
    MissingSfd,
    TooShort { len: usize },
    BadFcs { expected: u32, actual: u32 },
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::RxError { offset } => write!(f, "receive error signalled at byte {offset}"),
            Self::NoPreamble => write!(f, "frame does not start with a preamble"),
            Self::MissingSfd => write!(f, "start-of-frame delimiter missing"),
            Self::TooShort { len } => write!(f, "frame of {len} bytes too short to hold an FCS"),
            Self::BadFcs { expected, actual } => {
                write!(f, "bad FCS {actual:#010x}, expected {expected:#010x}")
            }
        }
    }
}

impl std::error::Error for FramingError {}

/// All bytes seen between the start and end of a transfer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GmiiFrame {
    pub data: Vec<u8>,

    /// Offset of the first byte received with the error signal asserted.
    pub error: Option<usize>,
}

impl GmiiFrame {
    /// Wrap a frame for transmission.
    #[must_use]
    pub fn from_payload(payload: &[u8]) -> Self {
        let body_len = payload.len().max(MIN_FRAME_LEN);
        let mut data = Vec::with_capacity(PREAMBLE_LEN + 1 + body_len + FCS_LEN);
        data.extend_from_slice(&[PREAMBLE_BYTE; PREAMBLE_LEN]);
        data.push(SFD);
        data.extend_from_slice(payload);
        data.resize(PREAMBLE_LEN + 1 + body_len, 0);

        let fcs = crc32(&data[PREAMBLE_LEN + 1..]);
        data.extend_from_slice(&fcs.to_le_bytes());
        Self { data, error: None }
    }

    /// The frame between the delimiter and the FCS, including any padding.
    pub fn payload(&self) -> Result<&[u8], FramingError> {
        if let Some(offset) = self.error {
            return Err(FramingError::RxError { offset });
        }
        let preamble_len = self
            .data
            .iter()
            .take_while(|b| **b == PREAMBLE_BYTE)
            .count();
        if preamble_len == 0 {
            return Err(FramingError::NoPreamble);
        }
        if self.data.get(preamble_len) != Some(&SFD) {
            return Err(FramingError::MissingSfd);
        }

        let body = &self.data[preamble_len + 1..];
        if body.len() < FCS_LEN {
            return Err(FramingError::TooShort { len: body.len() });
        }
        let (frame, fcs) = body.split_at(body.len() - FCS_LEN);
        let actual = u32::from_le_bytes([fcs[0], fcs[1], fcs[2], fcs[3]]);
        let expected = crc32(frame);
        if actual != expected {
            return Err(FramingError::BadFcs { expected, actual });
        }
        Ok(frame)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
