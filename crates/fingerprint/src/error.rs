//! Error types for fingerprinting

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Error type for fingerprint computation
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Two declared inputs share a property name
    #[error("Input property '{name}' is declared more than once")]
    #[diagnostic(
        code(kiln::fingerprint::duplicate_property),
        help("Give every declared input a unique property name")
    )]
    DuplicateProperty {
        /// The repeated property name
        name: String,
    },

    /// A file input has no path sensitivity and no default applies
    #[error("No path sensitivity resolved for input property '{property}'")]
    #[diagnostic(
        code(kiln::fingerprint::unresolved_sensitivity),
        help("Declare a path sensitivity on the property or configure a default")
    )]
    UnresolvedSensitivity {
        /// The property without a policy
        property: String,
    },

    /// A path sensitivity name could not be parsed
    #[error("Unknown path sensitivity '{value}'")]
    #[diagnostic(
        code(kiln::fingerprint::invalid_sensitivity),
        help("Use one of: absolute, relative, name-only, none")
    )]
    InvalidSensitivity {
        /// The rejected input
        value: String,
    },

    /// A scalar value could not be serialized for hashing
    #[error("Serialization error: {message}")]
    #[diagnostic(code(kiln::fingerprint::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },

    /// The caller cancelled fingerprinting
    #[error("Fingerprinting was cancelled")]
    #[diagnostic(code(kiln::fingerprint::cancelled))]
    Cancelled,
}

impl Error {
    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Whether this error comes from the unit's declarations rather than
    /// from the environment.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateProperty { .. }
                | Self::UnresolvedSensitivity { .. }
                | Self::InvalidSensitivity { .. }
        )
    }
}

/// Result type for fingerprint operations
pub type Result<T> = std::result::Result<T, Error>;
