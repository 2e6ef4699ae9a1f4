// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the live-reload pipeline.
//!
//! # Error Categories
//!
//! - **Configuration errors**: missing root/base directories, bad ports.
//!   Fatal at startup.
//! - **Resolution errors**: path traversal, missing resources. Recovered as
//!   a not-found [`ServerPath`](crate::ServerPath), never propagated.
//! - **Callback errors**: a reload callback failed. Logged by the
//!   [`Watcher`](crate::Watcher); the event produces no patterns.
//! - **Delivery errors**: a client went away mid-poll. The waiting consumer is
//!   released and queue state is untouched.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for lively.
#[derive(Error, Debug)]
pub enum LivelyError {
    /// Invalid startup configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request path could not be resolved.
    #[error("Cannot resolve '{path}': {reason}")]
    Resolution {
        /// Requested URL path.
        path: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A reload callback failed.
    #[error(transparent)]
    Callback(#[from] CallbackError),

    /// A client disconnected before its batch was delivered.
    #[error("Delivery to client failed: {0}")]
    Delivery(String),

    /// Invalid ignore or callback glob.
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern {
        /// The offending pattern.
        pattern: String,
        /// Parser message.
        message: String,
    },

    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LivelyError {
    /// Creates a configuration error for a directory that does not exist.
    pub fn missing_dir(what: &str, path: impl Into<PathBuf>) -> Self {
        LivelyError::Config(format!(
            "{} directory '{}' does not exist",
            what,
            path.into().display()
        ))
    }

    pub(crate) fn pattern(pattern: &str, err: globset::Error) -> Self {
        LivelyError::Pattern {
            pattern: pattern.to_string(),
            message: err.kind().to_string(),
        }
    }
}

/// Error returned by a [`ReloadCallback`](crate::ReloadCallback).
///
/// Never fatal: the watcher logs it and treats the callback as having
/// produced no patterns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("callback '{callback}' failed: {message}")]
pub struct CallbackError {
    /// Name of the failing callback.
    pub callback: String,
    /// Failure description.
    pub message: String,
}

impl CallbackError {
    /// Creates a new callback error.
    pub fn new(callback: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            callback: callback.into(),
            message: message.into(),
        }
    }
}

/// Result type for lively operations.
pub type Result<T> = std::result::Result<T, LivelyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_dir_message() {
        let err = LivelyError::missing_dir("Root", "/nope");
        assert_eq!(
            err.to_string(),
            "Configuration error: Root directory '/nope' does not exist"
        );
    }

    #[test]
    fn test_callback_error_is_transparent() {
        let err: LivelyError = CallbackError::new("markdown", "boom").into();
        assert_eq!(err.to_string(), "callback 'markdown' failed: boom");
    }
}
