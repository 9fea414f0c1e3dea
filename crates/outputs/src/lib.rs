//! Output property catalog for kiln units of work.
//!
//! The catalog is the single answer to "what does this unit produce". It
//! merges properties declared up front with properties added at runtime,
//! resolves both into [`OutputPropertySpec`] values sorted by name, and
//! exposes the union of all output paths as [`OutputFiles`].
//!
//! ```rust
//! use kiln_outputs::{OutputCatalog, OutputFileProperty};
//!
//! let mut catalog = OutputCatalog::new("compile")
//!     .with_properties([OutputFileProperty::dir("classes", "build/classes")]);
//! catalog.file("build/manifest.txt");
//!
//! let names: Vec<String> = catalog
//!     .file_properties()
//!     .unwrap()
//!     .into_iter()
//!     .map(|spec| spec.name)
//!     .collect();
//! assert_eq!(names, vec!["$1", "classes"]);
//! ```

mod catalog;
mod error;
mod property;

pub use catalog::{OutputCatalog, OutputFiles};
pub use error::{Error, Result};
pub use property::{OutputFileProperty, OutputKind, OutputPaths, OutputPropertySpec};
