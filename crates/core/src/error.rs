// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The shared adapter error taxonomy every Bus/Cache/Store operation
//! collapses to.

use thiserror::Error;

/// The four outcomes every adapter operation can fail with (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorKind {
    /// Transport is down; retry with backoff.
    Unavailable,
    /// The operation did not complete within its deadline.
    Timeout,
    /// A unique-key violation or lost claim race; caller handles
    /// idempotently.
    Conflict,
    /// Programmer error (bad arguments, impossible state).
    Invalid,
}

/// Error returned by bus, cache, and store adapters.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub message: String,
}

impl AdapterError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Unavailable,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Conflict,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: AdapterErrorKind::Invalid,
            message: message.into(),
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == AdapterErrorKind::Conflict
    }

    pub fn is_unavailable(&self) -> bool {
        self.kind == AdapterErrorKind::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_distinguishable_from_other_kinds() {
        let err = AdapterError::conflict("duplicate claim");
        assert!(err.is_conflict());
        assert!(!err.is_unavailable());
    }
}
