//! Execution history: what a unit produced last time, and who owns what.

use crate::Result;
use chrono::{DateTime, Utc};
use kiln_fingerprint::CompositeFingerprint;
use kiln_outputs::OutputPropertySpec;
use kiln_snapshot::{EntryContent, Snapshotter};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Observed state of one output property.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyOutputs {
    /// Declared roots, as absolute paths
    pub roots: BTreeSet<String>,
    /// Every existing path under the roots
    pub entries: BTreeMap<String, EntryContent>,
}

/// Observed state of all output properties of a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSnapshot {
    properties: BTreeMap<String, PropertyOutputs>,
}

impl OutputSnapshot {
    /// Walk the paths of every resolved output property. Paths that do not
    /// exist are left out.
    pub fn capture<S: Snapshotter + ?Sized>(snapshotter: &S, specs: &[OutputPropertySpec]) -> Self {
        let span = tracing::debug_span!("outputs.capture", properties = specs.len());
        let _guard = span.enter();

        let properties = specs
            .iter()
            .map(|spec| {
                let mut outputs = PropertyOutputs::default();
                for snapshot in snapshotter.snapshot_roots(&spec.paths) {
                    outputs
                        .roots
                        .insert(snapshot.root.to_string_lossy().into_owned());
                    for entry in snapshot.entries {
                        if matches!(entry.content(), EntryContent::Missing) {
                            continue;
                        }
                        outputs
                            .entries
                            .insert(entry.absolute_path().to_string(), entry.content().clone());
                    }
                }
                (spec.name.clone(), outputs)
            })
            .collect();
        Self { properties }
    }

    /// Build a snapshot from already observed properties.
    #[must_use]
    pub fn from_properties(properties: BTreeMap<String, PropertyOutputs>) -> Self {
        Self { properties }
    }

    /// Observed properties by name.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, PropertyOutputs> {
        &self.properties
    }

    /// One property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyOutputs> {
        self.properties.get(name)
    }

    /// Every existing output path, across properties.
    #[must_use]
    pub fn files(&self) -> BTreeSet<PathBuf> {
        self.properties
            .values()
            .flat_map(|outputs| outputs.entries.keys())
            .map(PathBuf::from)
            .collect()
    }

    /// Whether no output path exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.values().all(|outputs| outputs.entries.is_empty())
    }
}

/// What a unit recorded after its last successful execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    /// The recording unit
    pub unit_id: String,
    /// Input fingerprint of that execution
    pub fingerprint: CompositeFingerprint,
    /// Outputs as they were after that execution
    pub outputs: OutputSnapshot,
    /// When the record was written
    pub recorded_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// A record stamped with the current time.
    pub fn new(
        unit_id: impl Into<String>,
        fingerprint: CompositeFingerprint,
        outputs: OutputSnapshot,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            fingerprint,
            outputs,
            recorded_at: Utc::now(),
        }
    }
}

/// A declared output path that this unit did not produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapInfo {
    /// The property declaring the path
    pub property: String,
    /// The overlapped path
    pub path: PathBuf,
}

/// History facts attached to a unit before its caching verdict is asked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionHistory {
    /// First overlapped output, if any
    pub overlapping: Option<OverlapInfo>,
    /// Output paths recorded by the previous execution
    pub previous_output_files: BTreeSet<PathBuf>,
}

/// Persistent memory of previous executions.
///
/// Stores are shared between units, so implementations serialize writes
/// internally. Absent state is `None`, never an error.
pub trait HistoryStore: Send + Sync {
    /// Remember the outputs and input fingerprint of a successful execution
    /// and claim ownership of every output path.
    ///
    /// # Errors
    ///
    /// Returns an error when the record cannot be persisted.
    fn record_outputs(
        &self,
        unit_id: &str,
        outputs: &OutputSnapshot,
        fingerprint: &CompositeFingerprint,
    ) -> Result<()>;

    /// The last record of `unit_id`.
    fn previous_record(&self, unit_id: &str) -> Option<HistoryRecord>;

    /// The unit that last recorded `path` as an output.
    fn owner_of(&self, path: &str) -> Option<String>;

    /// The input fingerprint of the last recorded execution.
    fn previous_fingerprint(&self, unit_id: &str) -> Option<CompositeFingerprint> {
        self.previous_record(unit_id).map(|record| record.fingerprint)
    }

    /// The first output path in `current_outputs` this unit cannot account
    /// for.
    fn previous_overlap(&self, unit_id: &str, current_outputs: &OutputSnapshot) -> Option<OverlapInfo> {
        let previous = self.previous_record(unit_id);
        detect_overlap(
            unit_id,
            previous.as_ref().map(|record| &record.outputs),
            current_outputs,
            |path| self.owner_of(path),
        )
    }
}

/// Find the first existing output path the unit did not produce.
///
/// Properties are checked in name order, paths in path order. A path
/// overlaps when another unit owns it, or when it is not a declared root
/// directory and either was absent from the previous record or has
/// different content now. Without a previous record every existing
/// non-root path overlaps.
pub fn detect_overlap(
    unit_id: &str,
    previous: Option<&OutputSnapshot>,
    current: &OutputSnapshot,
    owner_of: impl Fn(&str) -> Option<String>,
) -> Option<OverlapInfo> {
    for (property, outputs) in current.properties() {
        let previous_entries = previous
            .and_then(|snapshot| snapshot.property(property))
            .map(|outputs| &outputs.entries);
        for (path, content) in &outputs.entries {
            let overlap = || OverlapInfo {
                property: property.clone(),
                path: PathBuf::from(path),
            };
            if let Some(owner) = owner_of(path)
                && owner != unit_id
            {
                tracing::debug!(property = %property, path = %path, owner = %owner, "Output path owned by another unit");
                return Some(overlap());
            }
            if outputs.roots.contains(path) && matches!(content, EntryContent::Directory) {
                continue;
            }
            let unchanged = previous_entries
                .and_then(|entries| entries.get(path))
                .is_some_and(|recorded| recorded == content);
            if !unchanged {
                tracing::debug!(property = %property, path = %path, "Output path not produced by this unit");
                return Some(overlap());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_outputs::OutputKind;
    use kiln_snapshot::{ContentSignature, WalkdirSnapshotter};
    use tempfile::TempDir;

    fn file(hash: &str) -> EntryContent {
        EntryContent::File(ContentSignature::new(hash, 1))
    }

    fn snapshot(property: &str, root: &str, entries: &[(&str, EntryContent)]) -> OutputSnapshot {
        let mut outputs = PropertyOutputs::default();
        outputs.roots.insert(root.to_string());
        outputs.entries.insert(root.to_string(), EntryContent::Directory);
        for (path, content) in entries {
            outputs.entries.insert((*path).to_string(), content.clone());
        }
        OutputSnapshot::from_properties(BTreeMap::from([(property.to_string(), outputs)]))
    }

    fn nobody(_: &str) -> Option<String> {
        None
    }

    // ==========================================================================
    // Overlap detection
    // ==========================================================================

    #[test]
    fn unchanged_outputs_do_not_overlap() {
        let current = snapshot("classes", "/out", &[("/out/A.class", file("h1"))]);
        assert_eq!(detect_overlap("compile", Some(&current), &current, nobody), None);
    }

    #[test]
    fn empty_root_directory_never_overlaps() {
        let current = snapshot("classes", "/out", &[]);
        assert_eq!(detect_overlap("compile", None, &current, nobody), None);
    }

    #[test]
    fn foreign_file_overlaps() {
        let previous = snapshot("classes", "/out", &[("/out/A.class", file("h1"))]);
        let current = snapshot(
            "classes",
            "/out",
            &[("/out/A.class", file("h1")), ("/out/stray.txt", file("h9"))],
        );
        let overlap = detect_overlap("compile", Some(&previous), &current, nobody).unwrap();
        assert_eq!(overlap.property, "classes");
        assert_eq!(overlap.path, PathBuf::from("/out/stray.txt"));
    }

    #[test]
    fn modified_file_overlaps() {
        let previous = snapshot("classes", "/out", &[("/out/A.class", file("h1"))]);
        let current = snapshot("classes", "/out", &[("/out/A.class", file("h2"))]);
        assert!(detect_overlap("compile", Some(&previous), &current, nobody).is_some());
    }

    #[test]
    fn path_owned_by_another_unit_overlaps() {
        let current = snapshot("classes", "/out", &[]);
        let overlap = detect_overlap("compile", Some(&current), &current, |path| {
            (path == "/out").then(|| "generate".to_string())
        })
        .unwrap();
        assert_eq!(overlap.path, PathBuf::from("/out"));
    }

    #[test]
    fn own_paths_do_not_overlap() {
        let current = snapshot("classes", "/out", &[("/out/A.class", file("h1"))]);
        let overlap = detect_overlap("compile", Some(&current), &current, |_| {
            Some("compile".to_string())
        });
        assert_eq!(overlap, None);
    }

    // ==========================================================================
    // Capture
    // ==========================================================================

    #[test]
    fn capture_skips_missing_outputs() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        let specs = vec![
            OutputPropertySpec {
                name: "present".to_string(),
                kind: OutputKind::SingleFile,
                paths: vec![dir.path().join("a.txt")],
                cacheable: true,
            },
            OutputPropertySpec {
                name: "absent".to_string(),
                kind: OutputKind::SingleFile,
                paths: vec![dir.path().join("missing.txt")],
                cacheable: true,
            },
        ];
        let captured = OutputSnapshot::capture(&WalkdirSnapshotter::new(), &specs);
        assert_eq!(captured.files().len(), 1);
        assert!(captured.property("absent").unwrap().entries.is_empty());
        assert!(!captured.is_empty());
    }

    #[test]
    fn record_roundtrips_through_json() {
        let record = HistoryRecord::new(
            "compile",
            CompositeFingerprint::new(BTreeMap::new()),
            snapshot("classes", "/out", &[("/out/A.class", file("h1"))]),
        );
        let json = serde_json::to_string(&record).unwrap();
        let parsed: HistoryRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
