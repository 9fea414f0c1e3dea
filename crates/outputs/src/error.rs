//! Error types for the output catalog

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Error type for output property resolution
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// Two output properties resolve to the same name with different shapes
    #[error("Output property '{name}' is declared more than once with different paths")]
    #[diagnostic(
        code(kiln::outputs::conflicting_property),
        help("Rename one of the properties or declare the paths once")
    )]
    ConflictingProperty {
        /// The shared property name
        name: String,
    },
}

/// Result type for output catalog operations
pub type Result<T> = std::result::Result<T, Error>;
