//! Incremental execution: fingerprint, decide, run, record.

use crate::config::Settings;
use crate::history::JsonHistoryStore;
use crate::Result;
use kiln_caching::{CachingVerdict, ExecutionHistory, HistoryStore, OutputSnapshot, TaskOutputs};
use kiln_fingerprint::{
    CompositeFingerprint, FingerprintOptions, FingerprintResult, InputFingerprinter, InputProperty,
    InputSource,
};
use kiln_outputs::{OutputCatalog, OutputFileProperty};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

/// One schedulable unit of work whose state is `S`.
pub struct UnitOfWork<S> {
    id: String,
    state: S,
    inputs: Vec<InputProperty>,
    outputs: TaskOutputs<S>,
}

impl<S> UnitOfWork<S> {
    /// A unit called `id` with no inputs or outputs.
    pub fn new(id: impl Into<String>, state: S) -> Self {
        let id = id.into();
        Self {
            outputs: TaskOutputs::new(OutputCatalog::new(id.clone())),
            id,
            state,
            inputs: Vec::new(),
        }
    }

    /// Declare an input.
    #[must_use]
    pub fn with_input(mut self, input: InputProperty) -> Self {
        self.inputs.push(input);
        self
    }

    /// Declare an output property.
    #[must_use]
    pub fn with_output(mut self, output: OutputFileProperty) -> Self {
        self.outputs.catalog_mut().declare(output);
        self
    }

    /// Declare an input after construction.
    pub fn declare_input(&mut self, input: InputProperty) {
        self.inputs.push(input);
    }

    /// The unit id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The unit's state, read by predicates.
    #[must_use]
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Mutable state.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }

    /// Declared inputs.
    #[must_use]
    pub fn inputs(&self) -> &[InputProperty] {
        &self.inputs
    }

    /// Outputs and caching rules.
    #[must_use]
    pub fn outputs(&self) -> &TaskOutputs<S> {
        &self.outputs
    }

    /// Outputs and caching rules, for registration.
    pub fn outputs_mut(&mut self) -> &mut TaskOutputs<S> {
        &mut self.outputs
    }
}

impl<S> InputSource for UnitOfWork<S> {
    fn visit_inputs(&self, visitor: &mut dyn FnMut(&InputProperty)) {
        self.inputs.visit_inputs(visitor);
    }
}

impl<S> fmt::Debug for UnitOfWork<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}

/// Result of an up-to-date check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpToDate {
    /// Inputs and outputs match the last recorded execution
    UpToDate,
    /// The unit declares no outputs and no up-to-date predicate
    NoOutputs,
    /// An up-to-date predicate does not hold
    PredicateNotSatisfied {
        /// The predicate's label
        label: String,
    },
    /// No execution has been recorded
    NoHistory,
    /// Input fingerprints differ from the recorded ones
    InputsChanged {
        /// Properties that changed, sorted
        properties: Vec<String>,
    },
    /// Outputs were changed or removed since they were recorded
    OutputsChanged,
}

impl UpToDate {
    /// Whether the unit can be skipped.
    #[must_use]
    pub const fn is_up_to_date(&self) -> bool {
        matches!(self, Self::UpToDate)
    }
}

impl fmt::Display for UpToDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate => f.write_str("Up to date"),
            Self::NoOutputs => f.write_str("Unit has not declared any outputs"),
            Self::PredicateNotSatisfied { label } => write!(f, "'{label}' not satisfied"),
            Self::NoHistory => f.write_str("No history is available"),
            Self::InputsChanged { properties } => {
                write!(f, "Input properties changed: {}", properties.join(", "))
            }
            Self::OutputsChanged => f.write_str("Outputs changed since the last execution"),
        }
    }
}

/// What [`IncrementalExecutor::run`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The unit was up to date and did not run
    Skipped {
        /// Fingerprint of the skipped execution
        fingerprint: CompositeFingerprint,
    },
    /// The unit ran and its result was recorded
    Executed {
        /// Why it was not up to date
        reason: UpToDate,
        /// Caching verdict computed before it ran
        verdict: CachingVerdict,
        /// Fingerprint that was recorded
        fingerprint: CompositeFingerprint,
    },
}

/// Drives units of work through fingerprinting, up-to-date checks,
/// caching verdicts and history recording.
///
/// The executor never runs two steps for the same unit concurrently; the
/// history store is shared.
pub struct IncrementalExecutor<H: HistoryStore = JsonHistoryStore> {
    settings: Settings,
    fingerprinter: InputFingerprinter,
    history: Arc<H>,
}

impl<H: HistoryStore> IncrementalExecutor<H> {
    /// An executor using `settings` and `history`.
    pub fn new(settings: Settings, history: Arc<H>) -> Self {
        Self::with_cancellation(settings, history, None)
    }

    /// An executor whose fingerprinting stops when `cancellation` is set.
    pub fn with_cancellation(
        settings: Settings,
        history: Arc<H>,
        cancellation: Option<Arc<AtomicBool>>,
    ) -> Self {
        let fingerprinter = InputFingerprinter::new(FingerprintOptions {
            default_sensitivity: Some(settings.default_path_sensitivity),
            cancellation,
        });
        Self {
            settings,
            fingerprinter,
            history,
        }
    }

    /// The active settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The history store.
    #[must_use]
    pub fn history(&self) -> &Arc<H> {
        &self.history
    }

    fn capture_outputs<S>(&self, unit: &UnitOfWork<S>) -> Result<OutputSnapshot> {
        let specs = unit.outputs.file_properties()?;
        Ok(OutputSnapshot::capture(self.fingerprinter.snapshotter(), &specs))
    }

    /// Fingerprint the unit's inputs, reusing value snapshots from its last
    /// recorded execution.
    ///
    /// # Errors
    ///
    /// Returns configuration errors from the declared inputs, or
    /// cancellation.
    pub fn compute_fingerprint<S>(&self, unit: &UnitOfWork<S>) -> Result<FingerprintResult> {
        let span = tracing::info_span!("unit.fingerprint", unit = %unit.id);
        let _guard = span.enter();
        let previous = self.history.previous_fingerprint(&unit.id);
        Ok(self.fingerprinter.fingerprint(unit, previous.as_ref())?)
    }

    /// Decide whether the unit can be skipped given its current fingerprint.
    ///
    /// # Errors
    ///
    /// Returns an error when the output catalog cannot be resolved.
    pub fn check_up_to_date<S>(
        &self,
        unit: &UnitOfWork<S>,
        current: &CompositeFingerprint,
    ) -> Result<UpToDate> {
        let state = if !unit.outputs.has_output() {
            UpToDate::NoOutputs
        } else if let Some(spec) = unit.outputs.up_to_date_spec().first_unsatisfied(&unit.state) {
            UpToDate::PredicateNotSatisfied {
                label: spec.label().to_string(),
            }
        } else if let Some(record) = self.history.previous_record(&unit.id) {
            if record.fingerprint.same_inputs(current) {
                if self.capture_outputs(unit)? == record.outputs {
                    UpToDate::UpToDate
                } else {
                    UpToDate::OutputsChanged
                }
            } else {
                UpToDate::InputsChanged {
                    properties: current.changed_properties(&record.fingerprint),
                }
            }
        } else {
            UpToDate::NoHistory
        };
        tracing::info!(unit = %unit.id, state = %state, "Up-to-date check");
        Ok(state)
    }

    /// Snapshot the unit's outputs as they are now, look for overlaps and
    /// attach the history to the unit.
    ///
    /// # Errors
    ///
    /// Returns an error when the output catalog cannot be resolved.
    pub fn attach_history<S>(&self, unit: &mut UnitOfWork<S>) -> Result<()> {
        let current = self.capture_outputs(unit)?;
        let previous_output_files = self
            .history
            .previous_record(&unit.id)
            .map(|record| record.outputs.files())
            .unwrap_or_default();
        let overlapping = self.history.previous_overlap(&unit.id, &current);
        if let Some(overlap) = &overlapping {
            tracing::info!(
                unit = %unit.id,
                property = %overlap.property,
                path = %overlap.path.display(),
                "Detected overlapping output"
            );
        }
        unit.outputs.set_history(Some(ExecutionHistory {
            overlapping,
            previous_output_files,
        }));
        Ok(())
    }

    /// Compute the caching verdict from the unit's current outputs and
    /// state, applying the global settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the output catalog cannot be resolved.
    pub fn caching_verdict<S>(&self, unit: &mut UnitOfWork<S>) -> Result<CachingVerdict> {
        self.attach_history(unit)?;
        unit.outputs.set_build_cache_enabled(self.settings.build_cache_enabled);
        if let Some(root) = &self.settings.project_root {
            unit.outputs.set_project_root(root.clone());
        }
        Ok(unit.outputs.caching_state(&unit.state)?)
    }

    /// Record the unit's outputs and the fingerprint it ran with.
    ///
    /// # Errors
    ///
    /// Returns an error when history cannot be written.
    pub fn record_result<S>(
        &self,
        unit: &UnitOfWork<S>,
        fingerprint: &CompositeFingerprint,
    ) -> Result<()> {
        let outputs = self.capture_outputs(unit)?;
        self.history.record_outputs(&unit.id, &outputs, fingerprint)?;
        Ok(())
    }

    /// Run the whole pipeline for one unit. `work` runs only when the unit
    /// is not up to date; nothing is recorded when it fails.
    ///
    /// # Errors
    ///
    /// Returns the first error from fingerprinting, the checks, `work` or
    /// recording.
    pub fn run<S, F>(&self, unit: &mut UnitOfWork<S>, work: F) -> Result<Outcome>
    where
        F: FnOnce(&S) -> Result<()>,
    {
        let span = tracing::info_span!("unit.run", unit = %unit.id);
        let _guard = span.enter();

        let result = self.compute_fingerprint(unit)?;
        let reason = self.check_up_to_date(unit, &result.fingerprint)?;
        if reason.is_up_to_date() {
            return Ok(Outcome::Skipped {
                fingerprint: result.fingerprint,
            });
        }

        let verdict = self.caching_verdict(unit)?;
        work(&unit.state)?;
        self.record_result(unit, &result.fingerprint)?;
        Ok(Outcome::Executed {
            reason,
            verdict,
            fingerprint: result.fingerprint,
        })
    }
}

impl IncrementalExecutor<JsonHistoryStore> {
    /// An executor with a JSON history store in the directory chosen by
    /// `settings`.
    ///
    /// # Errors
    ///
    /// Returns an error when no writable history directory exists.
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let store = JsonHistoryStore::from_settings(&settings)?;
        Ok(Self::new(settings, Arc::new(store)))
    }
}

impl<H: HistoryStore> fmt::Debug for IncrementalExecutor<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncrementalExecutor")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
