// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;

/// The error kinds named by the pipeline's error handling design: `Conflict`,
/// `NotFound`, `Storage`, `Transport`, `Protocol`, `BufferFull`, `Cancelled`,
/// `Timeout`, `Config`.
#[derive(Debug, thiserror::Error)]
pub enum JamieError {
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("buffer full")]
    BufferFull,

    #[error("cancelled")]
    Cancelled,

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, JamieError>;

impl JamieError {
    /// `Cancelled` unwinds cleanly and is never logged as an error;
    /// callers use this to pick the right log level.
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<tokio::time::error::Elapsed> for JamieError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        // The caller supplies the duration via `JamieError::Timeout` directly
        // when it knows it; this conversion only fires for bare `?` on a
        // `tokio::time::timeout` result where the duration is implicit in
        // the call site and not worth plumbing through.
        Self::Timeout(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_not_logged_as_error() {
        assert!(JamieError::Cancelled.is_cancelled());
        assert!(!JamieError::BufferFull.is_cancelled());
    }

    #[test]
    fn display_messages_name_the_kind() {
        assert_eq!(JamieError::Conflict("dup".into()).to_string(), "conflict: dup");
        assert_eq!(JamieError::NotFound("x".into()).to_string(), "not found: x");
        assert_eq!(JamieError::BufferFull.to_string(), "buffer full");
    }
}
