//! File-system snapshot model for kiln.
//!
//! A snapshot walk turns each declared root into an ordered sequence of
//! [`FileEntry`] values:
//! - the root comes first and is the only entry with no relative segments
//! - directories are visited depth-first, children in file-name order
//! - only regular files carry a [`ContentSignature`] (SHA-256 + length)
//!
//! Entries are immutable and live only for the duration of one
//! fingerprint computation. Paths that cannot be observed are recorded as
//! [`EntryContent::Missing`] rather than failing the walk.

mod entry;
mod error;
mod interner;
mod walker;

pub use entry::{ContentSignature, EntryContent, FileEntry, FileKind};
pub use error::{Error, Result};
pub use interner::PathInterner;
pub use walker::{RootSnapshot, Snapshotter, WalkdirSnapshotter, sha256_file};
