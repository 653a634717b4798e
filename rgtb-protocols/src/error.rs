// Copyright (c) 2025 Graphcore Ltd. All rights reserved.

use std::fmt;

use rgtb_engine::types::SimError;

/// Error returned when bytes cannot be decoded as a supported frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodecError(pub String);

impl CodecError {
    pub(crate) fn truncated(what: &str, needed: usize, available: usize) -> Self {
        Self(format!(
            "truncated {what}: needed {needed} bytes, only {available} available"
        ))
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Error: {}", self.0)
    }
}

impl std::error::Error for CodecError {}

impl From<CodecError> for SimError {
    fn from(e: CodecError) -> Self {
        SimError(e.0)
    }
}
