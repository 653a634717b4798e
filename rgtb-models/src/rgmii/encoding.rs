// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Conversion between frames and the values on the bus in each clock cycle.

use rgtb_protocols::gmii::GmiiFrame;

use super::Speed;

/// Bytes of idle time inserted after every frame.
pub const IFG_BYTES: usize = 12;

/// The bus values for one clock cycle: what is presented at the rising
/// edge and at the falling edge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cycle {
    pub rise_data: u8,
    pub rise_ctl: bool,
    pub fall_data: u8,
    pub fall_ctl: bool,
}

impl Cycle {
    pub const IDLE: Cycle = Cycle {
        rise_data: 0,
        rise_ctl: false,
        fall_data: 0,
        fall_ctl: false,
    };

    fn transfer(rise_data: u8, fall_data: u8, er: bool) -> Self {
        Self {
            rise_data,
            rise_ctl: true,
            fall_data,
            fall_ctl: !er,
        }
    }

    /// Data valid, carried by the rising edge control.
    #[must_use]
    pub fn dv(&self) -> bool {
        self.rise_ctl
    }

    /// Receive/transmit error, the XOR of both control values.
    #[must_use]
    pub fn er(&self) -> bool {
        self.rise_ctl ^ self.fall_ctl
    }
}

/// The cycles needed to send `frame` followed by the inter-frame gap.
///
/// If the frame carries an error offset the error is signalled from that
/// byte to the end of the frame.
#[must_use]
pub fn encode_frame(frame: &GmiiFrame, speed: Speed) -> Vec<Cycle> {
    let cycles_per_byte = if speed.is_ddr() { 1 } else { 2 };
    let mut cycles = Vec::with_capacity((frame.len() + IFG_BYTES) * cycles_per_byte);
    for (i, byte) in frame.data.iter().enumerate() {
        let er = frame.error.is_some_and(|offset| i >= offset);
        let (lo, hi) = (byte & 0xf, byte >> 4);
        if speed.is_ddr() {
            cycles.push(Cycle::transfer(lo, hi, er));
        } else {
            cycles.push(Cycle::transfer(lo, lo, er));
            cycles.push(Cycle::transfer(hi, hi, er));
        }
    }
    cycles.resize(cycles.len() + IFG_BYTES * cycles_per_byte, Cycle::IDLE);
    cycles
}

/// Rebuilds frames from sampled cycles. Frames are delimited by DV.
pub struct Decoder {
    speed: Speed,
    current: Option<GmiiFrame>,
    low_nibble: Option<u8>,
}

impl Decoder {
    #[must_use]
    pub fn new(speed: Speed) -> Self {
        Self {
            speed,
            current: None,
            low_nibble: None,
        }
    }

    /// Add the next cycle. Returns a frame when DV is deasserted after one.
    pub fn push(&mut self, cycle: Cycle) -> Option<GmiiFrame> {
        if !cycle.dv() {
            self.low_nibble = None;
            return self.current.take();
        }

        let frame = self.current.get_or_insert_with(GmiiFrame::default);
        if cycle.er() && frame.error.is_none() {
            frame.error = Some(frame.data.len());
        }
        if self.speed.is_ddr() {
            frame.data.push((cycle.rise_data & 0xf) | (cycle.fall_data << 4));
        } else {
            match self.low_nibble.take() {
                None => self.low_nibble = Some(cycle.rise_data & 0xf),
                Some(lo) => frame.data.push(lo | (cycle.rise_data << 4)),
            }
        }
        None
    }

    /// Whether a frame is partly received.
    #[must_use]
    pub fn in_frame(&self) -> bool {
        self.current.is_some()
    }
}
