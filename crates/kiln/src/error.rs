//! Error types for kiln

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Main error type for kiln operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Fingerprinting failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Fingerprint(#[from] kiln_fingerprint::Error),

    /// Output resolution or history access failed
    #[error(transparent)]
    #[diagnostic(transparent)]
    Caching(#[from] kiln_caching::Error),

    /// Invalid settings
    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(kiln::config::invalid),
        help("Check the settings file and the KILN_* environment variables")
    )]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// I/O error
    #[error("I/O {operation} failed{}", path.as_ref().map_or(String::new(), |p| format!(": {}", p.display())))]
    #[diagnostic(
        code(kiln::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error, if available
        path: Option<Box<Path>>,
        /// Operation that failed (e.g., "read", "write")
        operation: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: Some(path.as_ref().into()),
            operation: operation.into(),
        }
    }

    /// Whether fingerprinting was cancelled by the caller.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Fingerprint(kiln_fingerprint::Error::Cancelled))
    }
}

/// Result type for kiln operations
pub type Result<T> = std::result::Result<T, Error>;
