// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

//! Reasons a test run fails.

use std::fmt;

use itertools::Itertools;
use rgtb_engine::types::SimError;
use rgtb_protocols::{CodecError, hex_dump};

/// Number of mismatching cells listed when a result is wrong.
const MAX_LISTED_MISMATCHES: usize = 8;

/// Why the device did not pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TbFailure {
    /// A field of a received frame had the wrong value. `frame` holds a hex
    /// dump of the whole frame.
    Protocol {
        check: String,
        expected: String,
        actual: String,
        frame: String,
    },

    /// Nothing was received within the configured number of clock cycles.
    Timeout { waiting_for: String, cycles: u64 },

    /// A received frame could not be unwrapped or parsed.
    Parse {
        waiting_for: String,
        error: String,
        frame: String,
    },

    /// The result returned by the device differs from the golden model.
    Payload {
        round: usize,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// The packet capture could not be written.
    Capture(String),

    /// The simulation itself failed.
    Simulation(String),
}

impl TbFailure {
    pub fn protocol(
        check: &str,
        expected: impl fmt::Debug,
        actual: impl fmt::Debug,
        frame: &[u8],
    ) -> Self {
        Self::Protocol {
            check: check.to_string(),
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
            frame: hex_dump(frame),
        }
    }

    pub fn parse(waiting_for: &str, error: impl fmt::Display, frame: &[u8]) -> Self {
        Self::Parse {
            waiting_for: waiting_for.to_string(),
            error: error.to_string(),
            frame: hex_dump(frame),
        }
    }

    /// Short name of the kind of failure.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Protocol { .. } => "protocol",
            Self::Timeout { .. } => "timeout",
            Self::Parse { .. } => "parse",
            Self::Payload { .. } => "payload",
            Self::Capture(_) => "capture",
            Self::Simulation(_) => "simulation",
        }
    }
}

fn describe_mismatches(f: &mut fmt::Formatter, expected: &[u8], actual: &[u8]) -> fmt::Result {
    if expected.len() != actual.len() {
        writeln!(
            f,
            "expected {} bytes, received {}",
            expected.len(),
            actual.len()
        )?;
    }
    let mismatches = expected
        .iter()
        .zip(actual)
        .enumerate()
        .filter(|(_, (e, a))| e != a)
        .collect_vec();
    if !mismatches.is_empty() {
        writeln!(
            f,
            "{} cells differ: {}",
            mismatches.len(),
            mismatches
                .iter()
                .take(MAX_LISTED_MISMATCHES)
                .map(|(i, (e, a))| format!("[{i}] {e} != {a}"))
                .join(", ")
        )?;
    }
    writeln!(f, "expected:\n{}", hex_dump(expected))?;
    write!(f, "actual:\n{}", hex_dump(actual))
}

impl fmt::Display for TbFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Protocol {
                check,
                expected,
                actual,
                frame,
            } => write!(
                f,
                "{check} mismatch: expected {expected}, received {actual}\n{frame}"
            ),
            Self::Timeout {
                waiting_for,
                cycles,
            } => write!(f, "timed out after {cycles} cycles waiting for {waiting_for}"),
            Self::Parse {
                waiting_for,
                error,
                frame,
            } => write!(f, "bad frame while waiting for {waiting_for}: {error}\n{frame}"),
            Self::Payload {
                round,
                expected,
                actual,
            } => {
                writeln!(f, "result of round {round} does not match the golden model")?;
                describe_mismatches(f, expected, actual)
            }
            Self::Capture(msg) => write!(f, "unable to write capture: {msg}"),
            Self::Simulation(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for TbFailure {}

impl From<TbFailure> for SimError {
    fn from(failure: TbFailure) -> Self {
        SimError(failure.to_string())
    }
}

impl From<SimError> for TbFailure {
    fn from(e: SimError) -> Self {
        Self::Simulation(e.0)
    }
}

impl From<CodecError> for TbFailure {
    fn from(e: CodecError) -> Self {
        Self::Simulation(e.0)
    }
}
