//! Projecting [`FileEntry`] values onto comparable normalized keys.
//!
//! Relative and name-only keys are stored as an offset into the entry's
//! absolute path instead of a freshly built string. Two entries with the
//! same relative suffix compare equal no matter where their roots live,
//! and normalizing a large tree allocates nothing per entry.

use crate::PathSensitivity;
use kiln_snapshot::{EntryContent, FileEntry, FileKind};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// The location part of a normalized entry.
#[derive(Debug, Clone)]
pub enum NormalizedPath {
    /// The full absolute path
    Absolute(Arc<str>),
    /// The tail of `path` starting at byte `offset`
    Suffix {
        /// Shared absolute path
        path: Arc<str>,
        /// Byte offset where the key starts
        offset: usize,
    },
    /// The location does not count; only content does
    Ignored,
}

impl NormalizedPath {
    /// The key as a string slice. Ignored paths yield `""`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Absolute(path) => path,
            Self::Suffix { path, offset } => &path[*offset..],
            Self::Ignored => "",
        }
    }

    fn suffix(path: &Arc<str>, length: usize) -> Self {
        let mut offset = path.len().saturating_sub(length);
        if !path.is_char_boundary(offset) {
            offset = 0;
        }
        Self::Suffix {
            path: Arc::clone(path),
            offset,
        }
    }
}

impl PartialEq for NormalizedPath {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for NormalizedPath {}

impl PartialOrd for NormalizedPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NormalizedPath {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Hash for NormalizedPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

/// A [`FileEntry`] projected under one [`PathSensitivity`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedEntry {
    /// The normalized location
    pub path: NormalizedPath,
    /// Content copied from the entry
    pub content: EntryContent,
    /// Position among entries sharing the same key
    pub ordinal: u32,
}

impl NormalizedEntry {
    /// The normalization key.
    #[must_use]
    pub fn key(&self) -> &str {
        self.path.as_str()
    }
}

/// Byte length of the relative path: every segment plus one separator
/// between each pair.
fn relative_path_length(entry: &FileEntry) -> usize {
    let segments = entry.relative_segments();
    let names: usize = segments.iter().map(|segment| segment.len()).sum();
    names + segments.len().saturating_sub(1)
}

/// Normalize `entry` under `sensitivity`.
///
/// Returns `None` only for directories under [`PathSensitivity::None`]:
/// they carry no content and must not contribute to the fingerprint.
/// The returned entry has ordinal 0; ordinals are assigned when a
/// [`FileSetFingerprint`](crate::FileSetFingerprint) is built.
#[must_use]
pub fn normalize(sensitivity: PathSensitivity, entry: &FileEntry) -> Option<NormalizedEntry> {
    let root_directory = entry.is_root() && entry.kind() == FileKind::Directory;
    let path = match sensitivity {
        PathSensitivity::Absolute => NormalizedPath::Absolute(Arc::clone(entry.absolute_path_arc())),
        PathSensitivity::Relative => {
            if root_directory {
                NormalizedPath::Ignored
            } else if entry.is_root() {
                // A root file keys on its base name.
                NormalizedPath::suffix(entry.absolute_path_arc(), entry.name().len())
            } else {
                NormalizedPath::suffix(entry.absolute_path_arc(), relative_path_length(entry))
            }
        }
        PathSensitivity::NameOnly => {
            if root_directory {
                NormalizedPath::Ignored
            } else {
                NormalizedPath::suffix(entry.absolute_path_arc(), entry.name().len())
            }
        }
        PathSensitivity::None => {
            if entry.kind() == FileKind::Directory {
                return None;
            }
            NormalizedPath::Ignored
        }
    };
    Some(NormalizedEntry {
        path,
        content: entry.content().clone(),
        ordinal: 0,
    })
}
