//! Aggregating declared inputs into one [`CompositeFingerprint`].

use crate::{
    CompositeFingerprint, Error, FileSetFingerprint, InputProperty, InputSource, PathSensitivity,
    PropertyFingerprint, Result, ValueSnapshot,
};
use kiln_snapshot::{RootSnapshot, Snapshotter, WalkdirSnapshotter};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Fingerprinter settings.
#[derive(Debug, Clone, Default)]
pub struct FingerprintOptions {
    /// Policy for file inputs that declare none. `None` makes such inputs a
    /// configuration error.
    pub default_sensitivity: Option<PathSensitivity>,
    /// Set to `true` by the caller to abandon fingerprinting.
    pub cancellation: Option<Arc<AtomicBool>>,
}

/// Values already known before fingerprinting starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct KnownState<'a> {
    /// Value snapshots from the last known-good execution
    pub previous_values: Option<&'a BTreeMap<String, ValueSnapshot>>,
    /// Value snapshots computed earlier in this execution
    pub known_values: Option<&'a BTreeMap<String, ValueSnapshot>>,
    /// File fingerprints computed earlier in this execution
    pub known_fingerprints: Option<&'a BTreeMap<String, FileSetFingerprint>>,
}

/// Every declared path of a file input could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationWarning {
    /// The affected property
    pub property: String,
    /// The unreadable paths
    pub paths: Vec<PathBuf>,
}

/// Outcome of [`InputFingerprinter::fingerprint_inputs`].
#[derive(Debug, Clone)]
pub struct FingerprintResult {
    /// The composite fingerprint
    pub fingerprint: CompositeFingerprint,
    /// Properties whose fingerprint was reused instead of recomputed
    pub reused: BTreeSet<String>,
    /// File inputs that could not be observed at all
    pub warnings: Vec<ObservationWarning>,
}

/// Builds composite fingerprints from declared inputs.
#[derive(Debug, Clone)]
pub struct InputFingerprinter<S: Snapshotter = WalkdirSnapshotter> {
    snapshotter: S,
    options: FingerprintOptions,
}

impl InputFingerprinter<WalkdirSnapshotter> {
    /// A fingerprinter walking the real file system.
    #[must_use]
    pub fn new(options: FingerprintOptions) -> Self {
        Self::with_snapshotter(WalkdirSnapshotter::new(), options)
    }
}

impl<S: Snapshotter> InputFingerprinter<S> {
    /// A fingerprinter using a custom snapshot source.
    pub fn with_snapshotter(snapshotter: S, options: FingerprintOptions) -> Self {
        Self {
            snapshotter,
            options,
        }
    }

    /// The snapshot source.
    pub fn snapshotter(&self) -> &S {
        &self.snapshotter
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.options.cancellation {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    /// Collect the declared inputs, reject duplicates and resolve every
    /// path policy. Nothing is hashed here.
    fn declared_inputs(
        &self,
        inputs: &dyn InputSource,
    ) -> Result<Vec<(InputProperty, Option<PathSensitivity>)>> {
        let mut declared: Vec<InputProperty> = Vec::new();
        inputs.visit_inputs(&mut |property| declared.push(property.clone()));
        declared.sort_by(|a, b| a.name().cmp(b.name()));

        if let Some(pair) = declared.windows(2).find(|pair| pair[0].name() == pair[1].name()) {
            return Err(Error::DuplicateProperty {
                name: pair[0].name().to_string(),
            });
        }

        declared
            .into_iter()
            .map(|property| {
                if !property.is_file_valued() {
                    return Ok((property, None));
                }
                let sensitivity = property
                    .sensitivity()
                    .or(self.options.default_sensitivity)
                    .ok_or_else(|| Error::UnresolvedSensitivity {
                        property: property.name().to_string(),
                    })?;
                Ok((property, Some(sensitivity)))
            })
            .collect()
    }

    /// Fingerprint every declared input exactly once.
    ///
    /// - Scalars reuse a snapshot known in this execution, else the previous
    ///   execution's snapshot when the value is structurally equal, else
    ///   they are hashed.
    /// - File inputs reuse a fingerprint known in this execution, else they
    ///   are walked and normalized again.
    ///
    /// # Errors
    ///
    /// Configuration errors (duplicate names, unresolved policies) are
    /// reported before any hashing. Returns [`Error::Cancelled`] when the
    /// cancellation flag is raised; no partial result is produced.
    pub fn fingerprint_inputs(
        &self,
        inputs: &dyn InputSource,
        known: KnownState<'_>,
    ) -> Result<FingerprintResult> {
        let declared = self.declared_inputs(inputs)?;
        let span = tracing::info_span!("fingerprint.inputs", properties = declared.len());
        let _guard = span.enter();

        let mut properties: BTreeMap<String, PropertyFingerprint> = BTreeMap::new();
        let mut reused = BTreeSet::new();
        let mut warnings = Vec::new();

        for (property, sensitivity) in declared {
            self.check_cancelled()?;
            let name = property.name().to_string();
            let fingerprint = match (&property, sensitivity) {
                (InputProperty::Scalar { value, .. }, _) => {
                    let known_value = known.known_values.and_then(|values| values.get(&name));
                    let previous_value = known
                        .previous_values
                        .and_then(|values| values.get(&name))
                        .filter(|snapshot| snapshot.matches(value));
                    if let Some(snapshot) = known_value.or(previous_value) {
                        tracing::trace!(property = %name, "Reusing value snapshot");
                        reused.insert(name.clone());
                        PropertyFingerprint::Value(snapshot.clone())
                    } else {
                        PropertyFingerprint::Value(ValueSnapshot::of(value)?)
                    }
                }
                (_, sensitivity) => {
                    if let Some(fingerprint) = known
                        .known_fingerprints
                        .and_then(|fingerprints| fingerprints.get(&name))
                    {
                        tracing::trace!(property = %name, "Reusing file fingerprint");
                        reused.insert(name.clone());
                        PropertyFingerprint::FileSet(fingerprint.clone())
                    } else {
                        let sensitivity = sensitivity.unwrap_or_default();
                        let roots = property.roots();
                        let snapshots = self.snapshotter.snapshot_roots(&roots);
                        if let Some(warning) = observation_warning(&name, &snapshots) {
                            tracing::warn!(
                                property = %name,
                                paths = ?warning.paths,
                                "No declared path of the input could be read; its fingerprint only records missing entries"
                            );
                            warnings.push(warning);
                        }
                        let fingerprint = FileSetFingerprint::from_snapshots(sensitivity, &snapshots);
                        tracing::debug!(
                            property = %name,
                            sensitivity = %sensitivity,
                            entries = fingerprint.len(),
                            "Fingerprinted file input"
                        );
                        PropertyFingerprint::FileSet(fingerprint)
                    }
                }
            };
            properties.insert(name, fingerprint);
        }

        let fingerprint = CompositeFingerprint::new(properties);
        tracing::info!(
            hash = %fingerprint.hash(),
            reused = reused.len(),
            "Input fingerprint complete"
        );
        Ok(FingerprintResult {
            fingerprint,
            reused,
            warnings,
        })
    }

    /// Fingerprint `inputs`, reusing value snapshots from `previous`.
    ///
    /// # Errors
    ///
    /// See [`fingerprint_inputs`](Self::fingerprint_inputs).
    pub fn fingerprint(
        &self,
        inputs: &dyn InputSource,
        previous: Option<&CompositeFingerprint>,
    ) -> Result<FingerprintResult> {
        let previous_values = previous.map(CompositeFingerprint::value_snapshots);
        self.fingerprint_inputs(
            inputs,
            KnownState {
                previous_values: previous_values.as_ref(),
                ..KnownState::default()
            },
        )
    }
}

fn observation_warning(property: &str, snapshots: &[RootSnapshot]) -> Option<ObservationWarning> {
    if snapshots.is_empty() || !snapshots.iter().all(RootSnapshot::observed_nothing) {
        return None;
    }
    Some(ObservationWarning {
        property: property.to_string(),
        paths: snapshots
            .iter()
            .flat_map(|snapshot| snapshot.unreadable.iter().cloned())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_snapshot::{ContentSignature, EntryContent, FileEntry};
    use serde_json::json;
    use std::cell::RefCell;
    use std::path::Path;

    /// In-memory snapshot source keyed by declared root.
    #[derive(Default)]
    struct FakeSnapshotter {
        roots: BTreeMap<PathBuf, RootSnapshot>,
        walks: RefCell<usize>,
    }

    impl FakeSnapshotter {
        fn with_file(mut self, root: &str, hash: &str) -> Self {
            let entry = FileEntry::root(
                root,
                EntryContent::File(ContentSignature::new(hash, 1)),
            );
            self.roots
                .insert(PathBuf::from(root), RootSnapshot::from_entries(root, vec![entry]));
            self
        }

        fn with_unreadable(mut self, root: &str) -> Self {
            self.roots.insert(
                PathBuf::from(root),
                RootSnapshot {
                    root: PathBuf::from(root),
                    entries: vec![FileEntry::root(root, EntryContent::Missing)],
                    unreadable: vec![PathBuf::from(root)],
                },
            );
            self
        }
    }

    impl Snapshotter for FakeSnapshotter {
        fn snapshot_root(&self, root: &Path) -> RootSnapshot {
            *self.walks.borrow_mut() += 1;
            self.roots.get(root).cloned().unwrap_or_else(|| {
                RootSnapshot::from_entries(
                    root,
                    vec![FileEntry::root(root.to_string_lossy().as_ref(), EntryContent::Missing)],
                )
            })
        }
    }

    fn fingerprinter(fake: FakeSnapshotter) -> InputFingerprinter<FakeSnapshotter> {
        InputFingerprinter::with_snapshotter(
            fake,
            FingerprintOptions {
                default_sensitivity: Some(PathSensitivity::Absolute),
                cancellation: None,
            },
        )
    }

    // ==========================================================================
    // Configuration errors
    // ==========================================================================

    #[test]
    fn duplicate_names_fail_before_walking() {
        let fp = fingerprinter(FakeSnapshotter::default().with_file("/a", "h"));
        let inputs = vec![
            InputProperty::file("src", "/a"),
            InputProperty::scalar("src", 1),
        ];
        let err = fp.fingerprint(&inputs, None).unwrap_err();
        assert!(matches!(err, Error::DuplicateProperty { ref name } if name == "src"));
        assert_eq!(*fp.snapshotter().walks.borrow(), 0);
    }

    #[test]
    fn unresolved_sensitivity_is_a_configuration_error() {
        let fp = InputFingerprinter::with_snapshotter(
            FakeSnapshotter::default(),
            FingerprintOptions::default(),
        );
        let err = fp
            .fingerprint(&vec![InputProperty::file("src", "/a")], None)
            .unwrap_err();
        assert!(err.is_configuration());
    }

    // ==========================================================================
    // Determinism and reuse
    // ==========================================================================

    #[test]
    fn declaration_order_does_not_change_the_fingerprint() {
        let fake = || FakeSnapshotter::default().with_file("/a", "h1").with_file("/b", "h2");
        let forward = vec![
            InputProperty::file("a", "/a"),
            InputProperty::file("b", "/b"),
            InputProperty::scalar("mode", "fast"),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        let one = fingerprinter(fake()).fingerprint(&forward, None).unwrap();
        let two = fingerprinter(fake()).fingerprint(&backward, None).unwrap();
        assert_eq!(one.fingerprint, two.fingerprint);
    }

    #[test]
    fn equal_previous_value_is_reused() {
        let fp = fingerprinter(FakeSnapshotter::default());
        let inputs = vec![InputProperty::scalar("opts", json!({"level": 2}))];
        let first = fp.fingerprint(&inputs, None).unwrap();
        assert!(first.reused.is_empty());

        let second = fp.fingerprint(&inputs, Some(&first.fingerprint)).unwrap();
        assert!(second.reused.contains("opts"));
        assert_eq!(second.fingerprint, first.fingerprint);
    }

    #[test]
    fn changed_value_is_rehashed() {
        let fp = fingerprinter(FakeSnapshotter::default());
        let first = fp
            .fingerprint(&vec![InputProperty::scalar("opts", 1)], None)
            .unwrap();
        let second = fp
            .fingerprint(&vec![InputProperty::scalar("opts", 2)], Some(&first.fingerprint))
            .unwrap();
        assert!(second.reused.is_empty());
        assert_ne!(second.fingerprint.hash(), first.fingerprint.hash());
    }

    #[test]
    fn known_file_fingerprints_skip_walking() {
        let fp = fingerprinter(FakeSnapshotter::default().with_file("/a", "h1"));
        let inputs = vec![InputProperty::file("src", "/a")];
        let first = fp.fingerprint(&inputs, None).unwrap();
        assert_eq!(*fp.snapshotter().walks.borrow(), 1);

        let known = first.fingerprint.file_fingerprints();
        let second = fp
            .fingerprint_inputs(
                &inputs,
                KnownState {
                    known_fingerprints: Some(&known),
                    ..KnownState::default()
                },
            )
            .unwrap();
        assert_eq!(*fp.snapshotter().walks.borrow(), 1);
        assert_eq!(second.fingerprint, first.fingerprint);
    }

    #[test]
    fn file_inputs_are_always_rewalked_across_executions() {
        let fp = fingerprinter(FakeSnapshotter::default().with_file("/a", "h1"));
        let inputs = vec![InputProperty::file("src", "/a")];
        let first = fp.fingerprint(&inputs, None).unwrap();
        let _ = fp.fingerprint(&inputs, Some(&first.fingerprint)).unwrap();
        assert_eq!(*fp.snapshotter().walks.borrow(), 2);
    }

    // ==========================================================================
    // Observation problems and cancellation
    // ==========================================================================

    #[test]
    fn all_unreadable_roots_raise_a_warning() {
        let fp = fingerprinter(FakeSnapshotter::default().with_unreadable("/locked"));
        let result = fp
            .fingerprint(&vec![InputProperty::file("secret", "/locked")], None)
            .unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].property, "secret");
        let empty = fp
            .fingerprint(&vec![InputProperty::files("secret", Vec::<PathBuf>::new())], None)
            .unwrap();
        assert_ne!(result.fingerprint, empty.fingerprint);
    }

    #[test]
    fn partly_readable_inputs_do_not_warn() {
        let fp = fingerprinter(
            FakeSnapshotter::default()
                .with_unreadable("/locked")
                .with_file("/open", "h"),
        );
        let result = fp
            .fingerprint(&vec![InputProperty::files("mixed", ["/locked", "/open"])], None)
            .unwrap();
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn cancellation_abandons_fingerprinting() {
        let flag = Arc::new(AtomicBool::new(true));
        let fp = InputFingerprinter::with_snapshotter(
            FakeSnapshotter::default(),
            FingerprintOptions {
                default_sensitivity: Some(PathSensitivity::Relative),
                cancellation: Some(Arc::clone(&flag)),
            },
        );
        let err = fp
            .fingerprint(&vec![InputProperty::scalar("x", 1)], None)
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
