//! Input fingerprints for kiln units of work.
//!
//! A unit declares named inputs: scalar values and file or directory
//! collections. [`InputFingerprinter`] walks the file-valued inputs,
//! projects every [`FileEntry`](kiln_snapshot::FileEntry) through the
//! property's [`PathSensitivity`], and rolls everything up into a
//! [`CompositeFingerprint`] whose equality decides whether work is up to
//! date.
//!
//! # Path sensitivity
//!
//! | Policy     | Key for `/proj/src/main/A.txt` under root `/proj/src` |
//! |------------|--------------------------------------------------------|
//! | `Absolute` | `/proj/src/main/A.txt`                                 |
//! | `Relative` | `main/A.txt`                                           |
//! | `NameOnly` | `A.txt`                                                |
//! | `None`     | *(content only)*                                       |
//!
//! # Example
//!
//! ```rust
//! use kiln_fingerprint::{FingerprintOptions, InputFingerprinter, InputProperty, PathSensitivity};
//!
//! let fingerprinter = InputFingerprinter::new(FingerprintOptions {
//!     default_sensitivity: Some(PathSensitivity::Relative),
//!     ..FingerprintOptions::default()
//! });
//! let inputs = vec![InputProperty::scalar("mode", "release")];
//! let first = fingerprinter.fingerprint(&inputs, None).unwrap();
//! let second = fingerprinter.fingerprint(&inputs, Some(&first.fingerprint)).unwrap();
//! assert_eq!(first.fingerprint, second.fingerprint);
//! ```

mod error;
mod fingerprint;
mod fingerprinter;
mod hashing;
mod input;
mod normalize;
mod sensitivity;

pub use error::{Error, Result};
pub use fingerprint::{
    CompositeFingerprint, FileSetFingerprint, FingerprintEntry, PropertyFingerprint, ValueSnapshot,
};
pub use fingerprinter::{
    FingerprintOptions, FingerprintResult, InputFingerprinter, KnownState, ObservationWarning,
};
pub use input::{InputProperty, InputSource};
pub use normalize::{NormalizedEntry, NormalizedPath, normalize};
pub use sensitivity::PathSensitivity;
