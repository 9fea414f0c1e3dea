//! Walking declared roots into ordered [`FileEntry`] sequences.

use crate::{ContentSignature, EntryContent, Error, FileEntry, PathInterner, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Hash a file's contents with SHA-256.
pub fn sha256_file(path: &Path) -> Result<ContentSignature> {
    let _span = tracing::trace_span!("sha256_file", path = %path.display()).entered();
    let mut file = fs::File::open(path).map_err(|e| Error::io(e, path, "open"))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1024 * 64];
    let mut total: u64 = 0;
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::io(e, path, "read"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    let digest = hasher.finalize();
    tracing::trace!(path = %path.display(), size = total, "Hashed file");
    Ok(ContentSignature::new(hex::encode(digest), total))
}

/// The entries observed under one declared root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootSnapshot {
    /// The declared root, made absolute
    pub root: PathBuf,
    /// Depth-first entries, root first
    pub entries: Vec<FileEntry>,
    /// Paths that could not be read or hashed
    pub unreadable: Vec<PathBuf>,
}

impl RootSnapshot {
    /// Build a snapshot from entries that were observed without problems.
    pub fn from_entries(root: impl Into<PathBuf>, entries: Vec<FileEntry>) -> Self {
        Self {
            root: root.into(),
            entries,
            unreadable: Vec::new(),
        }
    }

    /// Whether the walk hit read problems and produced no usable content.
    #[must_use]
    pub fn observed_nothing(&self) -> bool {
        !self.unreadable.is_empty()
            && self
                .entries
                .iter()
                .all(|entry| matches!(entry.content(), EntryContent::Missing))
    }
}

/// Source of file-system snapshots.
///
/// Implementations never fail: paths that cannot be observed are reported
/// as [`EntryContent::Missing`] and listed in [`RootSnapshot::unreadable`].
pub trait Snapshotter {
    /// Walk one declared root.
    fn snapshot_root(&self, root: &Path) -> RootSnapshot;

    /// Walk several declared roots, preserving declaration order.
    fn snapshot_roots(&self, roots: &[PathBuf]) -> Vec<RootSnapshot> {
        roots.iter().map(|root| self.snapshot_root(root)).collect()
    }
}

/// [`Snapshotter`] backed by `walkdir` and SHA-256 content hashing.
///
/// Directory children are visited in file-name order so that two walks of
/// an unchanged tree produce identical sequences.
#[derive(Debug, Clone)]
pub struct WalkdirSnapshotter {
    follow_links: bool,
    interner: &'static PathInterner,
}

impl WalkdirSnapshotter {
    /// Create a walker that follows symbolic links and interns into the
    /// process-wide table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            follow_links: true,
            interner: PathInterner::global(),
        }
    }

    /// Whether to resolve symbolic links to their targets.
    #[must_use]
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    fn hash_or_missing(&self, path: &Path, unreadable: &mut Vec<PathBuf>) -> EntryContent {
        match sha256_file(path) {
            Ok(signature) => EntryContent::File(signature),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not hash file; treating it as missing");
                unreadable.push(path.to_path_buf());
                EntryContent::Missing
            }
        }
    }

    fn segments(&self, root: &Path, path: &Path) -> Option<Vec<Arc<str>>> {
        let relative = path.strip_prefix(root).ok()?;
        Some(
            relative
                .components()
                .map(|component| self.interner.intern(&component.as_os_str().to_string_lossy()))
                .collect(),
        )
    }
}

impl Default for WalkdirSnapshotter {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshotter for WalkdirSnapshotter {
    fn snapshot_root(&self, root: &Path) -> RootSnapshot {
        let root = std::path::absolute(root).unwrap_or_else(|_| root.to_path_buf());
        let span = tracing::debug_span!("snapshot.walk", root = %root.display());
        let _guard = span.enter();

        let root_path = self.interner.intern(&root.to_string_lossy());
        let mut unreadable = Vec::new();

        let metadata = if self.follow_links {
            fs::metadata(&root)
        } else {
            fs::symlink_metadata(&root)
        };
        let metadata = match metadata {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("Declared root does not exist");
                return RootSnapshot {
                    entries: vec![FileEntry::root(root_path, EntryContent::Missing)],
                    root,
                    unreadable,
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read declared root; treating it as missing");
                unreadable.push(root.clone());
                return RootSnapshot {
                    entries: vec![FileEntry::root(root_path, EntryContent::Missing)],
                    root,
                    unreadable,
                };
            }
        };

        if !metadata.is_dir() {
            let content = self.hash_or_missing(&root, &mut unreadable);
            return RootSnapshot {
                entries: vec![FileEntry::root(root_path, content)],
                root,
                unreadable,
            };
        }

        let mut entries = vec![FileEntry::root(root_path, EntryContent::Directory)];
        for entry in WalkDir::new(&root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .min_depth(1)
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Permission problems and paths vanishing mid-walk.
                    let path = e.path().map_or_else(|| root.clone(), Path::to_path_buf);
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable path");
                    unreadable.push(path);
                    continue;
                }
            };
            let path = entry.path();
            let Some(segments) = self.segments(&root, path) else {
                continue;
            };
            let content = if entry.file_type().is_dir() {
                EntryContent::Directory
            } else {
                self.hash_or_missing(path, &mut unreadable)
            };
            entries.push(FileEntry::new(
                self.interner.intern(&path.to_string_lossy()),
                segments,
                content,
            ));
        }

        tracing::debug!(
            entries = entries.len(),
            unreadable = unreadable.len(),
            "Walk complete"
        );
        RootSnapshot {
            root,
            entries,
            unreadable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileKind;
    use tempfile::TempDir;

    // ==========================================================================
    // sha256_file
    // ==========================================================================

    #[test]
    fn hashes_file_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        fs::write(&path, "hello").unwrap();

        let signature = sha256_file(&path).unwrap();
        assert_eq!(signature.length, 5);
        assert_eq!(
            signature.hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn hashing_missing_file_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = sha256_file(&tmp.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("open"));
    }

    // ==========================================================================
    // WalkdirSnapshotter
    // ==========================================================================

    #[test]
    fn walks_depth_first_with_root_first() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        fs::create_dir_all(root.join("b")).unwrap();
        fs::write(root.join("a.txt"), "A").unwrap();
        fs::write(root.join("b/c.txt"), "C").unwrap();
        fs::write(root.join("d.txt"), "D").unwrap();

        let snapshot = WalkdirSnapshotter::new().snapshot_root(&root);
        let relative: Vec<String> = snapshot.entries.iter().map(FileEntry::relative_path).collect();

        assert_eq!(relative, vec!["", "a.txt", "b", "b/c.txt", "d.txt"]);
        assert!(snapshot.entries[0].is_root());
        assert_eq!(snapshot.entries[0].kind(), FileKind::Directory);
        assert_eq!(snapshot.entries[2].kind(), FileKind::Directory);
        assert_eq!(snapshot.entries[3].kind(), FileKind::File);
        assert!(snapshot.unreadable.is_empty());
    }

    #[test]
    fn absolute_path_ends_with_relative_segments() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("nested/file.rs"), "fn main() {}").unwrap();

        let snapshot = WalkdirSnapshotter::new().snapshot_root(&root);
        let file = snapshot
            .entries
            .iter()
            .find(|e| e.kind() == FileKind::File)
            .unwrap();
        let suffix = format!("nested{}file.rs", std::path::MAIN_SEPARATOR);
        assert!(file.absolute_path().ends_with(&suffix));
    }

    #[test]
    fn single_file_root() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out.txt");
        fs::write(&path, "x").unwrap();

        let snapshot = WalkdirSnapshotter::new().snapshot_root(&path);
        assert_eq!(snapshot.entries.len(), 1);
        assert!(snapshot.entries[0].is_root());
        assert_eq!(snapshot.entries[0].kind(), FileKind::File);
        assert_eq!(snapshot.entries[0].name(), "out.txt");
    }

    #[test]
    fn missing_root_is_reported_as_missing_entry() {
        let tmp = TempDir::new().unwrap();
        let snapshot = WalkdirSnapshotter::new().snapshot_root(&tmp.path().join("absent"));
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].kind(), FileKind::Missing);
        assert!(snapshot.unreadable.is_empty());
        assert!(!snapshot.observed_nothing());
    }

    #[test]
    fn walks_are_repeatable() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("tree");
        fs::create_dir_all(root.join("x/y")).unwrap();
        fs::write(root.join("x/y/z.txt"), "z").unwrap();
        fs::write(root.join("x/w.txt"), "w").unwrap();

        let walker = WalkdirSnapshotter::new();
        assert_eq!(walker.snapshot_root(&root), walker.snapshot_root(&root));
    }

    #[test]
    fn snapshot_roots_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a.txt");
        let b = tmp.path().join("b.txt");
        fs::write(&a, "a").unwrap();
        fs::write(&b, "b").unwrap();

        let snapshots = WalkdirSnapshotter::new().snapshot_roots(&[b.clone(), a.clone()]);
        assert_eq!(snapshots[0].entries[0].name(), "b.txt");
        assert_eq!(snapshots[1].entries[0].name(), "a.txt");
    }

    #[test]
    fn observed_nothing_requires_unreadable_paths() {
        let snapshot = RootSnapshot {
            root: PathBuf::from("/locked"),
            entries: vec![FileEntry::root("/locked", EntryContent::Missing)],
            unreadable: vec![PathBuf::from("/locked")],
        };
        assert!(snapshot.observed_nothing());
    }
}
