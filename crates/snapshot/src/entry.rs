//! Immutable file-system entries observed during a snapshot walk.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Hash and length of a regular file's contents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentSignature {
    /// Hex-encoded SHA-256 of the file contents
    pub hash: String,
    /// File size in bytes
    pub length: u64,
}

impl ContentSignature {
    /// Create a signature from a hex hash and a length.
    pub fn new(hash: impl Into<String>, length: u64) -> Self {
        Self {
            hash: hash.into(),
            length,
        }
    }
}

impl fmt::Display for ContentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hash, self.length)
    }
}

/// Type of a file-system node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileKind {
    /// A regular file
    File,
    /// A directory
    Directory,
    /// Nothing exists at the path, or it could not be observed
    Missing,
}

/// What an entry holds. Only regular files carry a [`ContentSignature`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntryContent {
    /// A regular file with its content signature
    File(ContentSignature),
    /// A directory; its own content is its existence
    Directory,
    /// Nothing at the path
    Missing,
}

impl EntryContent {
    /// The node type this content describes.
    #[must_use]
    pub fn kind(&self) -> FileKind {
        match self {
            Self::File(_) => FileKind::File,
            Self::Directory => FileKind::Directory,
            Self::Missing => FileKind::Missing,
        }
    }

    /// The content signature, present only for files.
    #[must_use]
    pub fn signature(&self) -> Option<&ContentSignature> {
        match self {
            Self::File(signature) => Some(signature),
            Self::Directory | Self::Missing => None,
        }
    }
}

/// One file-system node observed while walking a declared root.
///
/// `relative_segments` holds the path components below the walk root and is
/// empty exactly for the root itself. Paths and segments are shared
/// `Arc<str>` so that repeated strings can be interned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileEntry {
    absolute_path: Arc<str>,
    relative_segments: Vec<Arc<str>>,
    content: EntryContent,
}

impl FileEntry {
    /// Create an entry. An empty `relative_segments` marks the walk root.
    pub fn new(
        absolute_path: impl Into<Arc<str>>,
        relative_segments: Vec<Arc<str>>,
        content: EntryContent,
    ) -> Self {
        Self {
            absolute_path: absolute_path.into(),
            relative_segments,
            content,
        }
    }

    /// Create the root entry of a walk.
    pub fn root(absolute_path: impl Into<Arc<str>>, content: EntryContent) -> Self {
        Self::new(absolute_path, Vec::new(), content)
    }

    /// The absolute path as observed.
    #[must_use]
    pub fn absolute_path(&self) -> &str {
        &self.absolute_path
    }

    /// The shared absolute path string.
    #[must_use]
    pub fn absolute_path_arc(&self) -> &Arc<str> {
        &self.absolute_path
    }

    /// Path components below the walk root.
    #[must_use]
    pub fn relative_segments(&self) -> &[Arc<str>] {
        &self.relative_segments
    }

    /// The relative path joined with `/`, empty for the root.
    #[must_use]
    pub fn relative_path(&self) -> String {
        self.relative_segments
            .iter()
            .map(|segment| segment.as_ref())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// The node type.
    #[must_use]
    pub fn kind(&self) -> FileKind {
        self.content.kind()
    }

    /// The observed content.
    #[must_use]
    pub fn content(&self) -> &EntryContent {
        &self.content
    }

    /// The content signature, present only for files.
    #[must_use]
    pub fn content_signature(&self) -> Option<&ContentSignature> {
        self.content.signature()
    }

    /// Whether this entry is the top of the walked tree.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.relative_segments.is_empty()
    }

    /// The base name: the last component of the absolute path.
    #[must_use]
    pub fn name(&self) -> &str {
        self.absolute_path
            .rsplit(std::path::is_separator)
            .next()
            .unwrap_or_default()
    }
}
