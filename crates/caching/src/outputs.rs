//! Output declarations, caching predicates and the caching verdict of a
//! single unit of work.

use crate::history::{ExecutionHistory, OverlapInfo};
use crate::{CachingVerdict, DisabledReason, Result};
use kiln_actions::{Action, ActionRegistry, AndSpec, LabeledSpec};
use kiln_outputs::{OutputCatalog, OutputFiles, OutputPropertySpec};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Label used by [`TaskOutputs::cache_if`].
pub const DEFAULT_CACHE_IF_LABEL: &str = "Unit outputs cacheable";

/// Outputs and caching rules of one unit of work whose state is `S`.
///
/// Predicates are stored in registration order and evaluated lazily
/// against the state passed to [`caching_state`](Self::caching_state); the
/// verdict is recomputed on every call.
pub struct TaskOutputs<S: ?Sized> {
    catalog: OutputCatalog,
    build_cache_enabled: bool,
    project_root: Option<PathBuf>,
    cache_if_specs: Vec<LabeledSpec<S>>,
    do_not_cache_if_specs: Vec<LabeledSpec<S>>,
    up_to_date_spec: AndSpec<S>,
    history: Option<ExecutionHistory>,
    verdict_listeners: ActionRegistry<CachingVerdict>,
}

impl<S: ?Sized> TaskOutputs<S> {
    /// Caching rules over `catalog`, with the build cache switched on.
    #[must_use]
    pub fn new(catalog: OutputCatalog) -> Self {
        Self {
            catalog,
            build_cache_enabled: true,
            project_root: None,
            cache_if_specs: Vec::new(),
            do_not_cache_if_specs: Vec::new(),
            up_to_date_spec: AndSpec::empty(),
            history: None,
            verdict_listeners: ActionRegistry::new(),
        }
    }

    /// Switch output caching on or off globally.
    #[must_use]
    pub fn with_build_cache(mut self, enabled: bool) -> Self {
        self.build_cache_enabled = enabled;
        self
    }

    /// Report overlapped paths relative to `root`.
    #[must_use]
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Switch output caching on or off globally after construction.
    pub fn set_build_cache_enabled(&mut self, enabled: bool) {
        self.build_cache_enabled = enabled;
    }

    /// Set the root used to display overlapped paths.
    pub fn set_project_root(&mut self, root: impl Into<PathBuf>) {
        self.project_root = Some(root.into());
    }

    /// The output catalog.
    #[must_use]
    pub fn catalog(&self) -> &OutputCatalog {
        &self.catalog
    }

    /// The output catalog, for runtime declarations.
    pub fn catalog_mut(&mut self) -> &mut OutputCatalog {
        &mut self.catalog
    }

    /// Enable caching when `predicate` holds.
    pub fn cache_if(&mut self, predicate: impl Fn(&S) -> bool + Send + Sync + 'static) {
        self.cache_if_labeled(DEFAULT_CACHE_IF_LABEL, predicate);
    }

    /// Enable caching when `predicate` holds, reporting `label` otherwise.
    pub fn cache_if_labeled(
        &mut self,
        label: impl Into<String>,
        predicate: impl Fn(&S) -> bool + Send + Sync + 'static,
    ) {
        self.cache_if_specs.push(LabeledSpec::new(label, predicate));
    }

    /// Disable caching when `predicate` holds, reporting `label`.
    pub fn do_not_cache_if(
        &mut self,
        label: impl Into<String>,
        predicate: impl Fn(&S) -> bool + Send + Sync + 'static,
    ) {
        self.do_not_cache_if_specs.push(LabeledSpec::new(label, predicate));
    }

    /// Additionally require `spec` for the unit to be up to date.
    pub fn up_to_date_when(&mut self, spec: LabeledSpec<S>) {
        self.up_to_date_spec = self.up_to_date_spec.and(spec);
    }

    /// The conjunction of up-to-date predicates.
    #[must_use]
    pub fn up_to_date_spec(&self) -> &AndSpec<S> {
        &self.up_to_date_spec
    }

    /// Whether the unit has outputs in the up-to-date sense: declared
    /// output properties or any up-to-date predicate.
    #[must_use]
    pub fn has_output(&self) -> bool {
        self.has_declared_outputs() || !self.up_to_date_spec.is_empty()
    }

    /// Whether any output property is declared.
    #[must_use]
    pub fn has_declared_outputs(&self) -> bool {
        self.catalog.has_declared_outputs()
    }

    /// Resolved output properties, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error when two properties conflict.
    pub fn file_properties(&self) -> Result<Vec<OutputPropertySpec>> {
        Ok(self.catalog.file_properties()?)
    }

    /// The union of all output paths.
    ///
    /// # Errors
    ///
    /// Returns an error when two properties conflict.
    pub fn all_files(&self) -> Result<OutputFiles> {
        Ok(self.catalog.all_files()?)
    }

    /// Attach or detach execution history.
    pub fn set_history(&mut self, history: Option<ExecutionHistory>) {
        self.history = history;
    }

    /// Output paths of the previous execution, when history is attached.
    #[must_use]
    pub fn previous_output_files(&self) -> Option<&BTreeSet<PathBuf>> {
        self.history
            .as_ref()
            .map(|history| &history.previous_output_files)
    }

    /// Notify `action` with every computed verdict. Returns `false` when
    /// the action was already registered or is the no-op.
    pub fn on_verdict(&self, action: Action<CachingVerdict>) -> bool {
        self.verdict_listeners.add(action)
    }

    fn display_path<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, str> {
        self.project_root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
            .to_string_lossy()
    }

    fn overlap_verdict(&self, overlap: &OverlapInfo) -> CachingVerdict {
        CachingVerdict::disabled(
            DisabledReason::OverlappingOutputs,
            format!(
                "Kiln does not know how file '{}' was created (output property '{}'). \
                 Output caching requires exclusive access to output paths to guarantee correctness.",
                self.display_path(&overlap.path),
                overlap.property
            ),
        )
    }

    fn evaluate(&self, unit: &S) -> Result<CachingVerdict> {
        if !self.build_cache_enabled {
            return Ok(CachingVerdict::disabled(
                DisabledReason::BuildCacheDisabled,
                "Output caching is disabled",
            ));
        }

        if self.cache_if_specs.is_empty() {
            return Ok(CachingVerdict::disabled(
                DisabledReason::NotEnabledForTask,
                "Caching has not been enabled for the unit of work",
            ));
        }

        if !self.has_declared_outputs() {
            return Ok(CachingVerdict::disabled(
                DisabledReason::NoOutputsDeclared,
                "No outputs declared",
            ));
        }

        if let Some(overlap) = self
            .history
            .as_ref()
            .and_then(|history| history.overlapping.as_ref())
        {
            return Ok(self.overlap_verdict(overlap));
        }

        if let Some(spec) = self
            .file_properties()?
            .into_iter()
            .find(|spec| !spec.cacheable)
        {
            return Ok(CachingVerdict::disabled(
                DisabledReason::NonCacheableOutputProperty,
                format!(
                    "Declares multiple output files for the single output property '{}' via `files()` or `dirs()`",
                    spec.name
                ),
            ));
        }

        if let Some(spec) = self
            .cache_if_specs
            .iter()
            .find(|spec| !spec.is_satisfied_by(unit))
        {
            return Ok(CachingVerdict::disabled(
                DisabledReason::CacheIfNotSatisfied,
                format!("'{}' not satisfied", spec.label()),
            ));
        }

        if let Some(spec) = self
            .do_not_cache_if_specs
            .iter()
            .find(|spec| spec.is_satisfied_by(unit))
        {
            return Ok(CachingVerdict::disabled(
                DisabledReason::DoNotCacheIfSatisfied,
                format!("'{}' satisfied", spec.label()),
            ));
        }

        Ok(CachingVerdict::Enabled)
    }

    /// Decide whether the unit's outputs may be cached, given its current
    /// state. The first matching rule wins:
    ///
    /// 1. build cache switched off
    /// 2. no `cache_if` predicate registered
    /// 3. no outputs declared
    /// 4. overlapping outputs reported by history
    /// 5. an output property that is not cacheable
    /// 6. the first `cache_if` predicate that does not hold
    /// 7. the first `do_not_cache_if` predicate that holds
    ///
    /// Verdict listeners are notified with the result.
    ///
    /// # Errors
    ///
    /// Returns an error when the output catalog cannot be resolved.
    pub fn caching_state(&self, unit: &S) -> Result<CachingVerdict> {
        let verdict = self.evaluate(unit)?;
        match &verdict {
            CachingVerdict::Enabled => tracing::debug!("Output caching enabled"),
            CachingVerdict::Disabled { reason, message } => {
                tracing::debug!(reason = %reason, message = %message, "Output caching disabled");
            }
        }
        self.verdict_listeners.execute(&verdict);
        Ok(verdict)
    }
}

impl<S: ?Sized> std::fmt::Debug for TaskOutputs<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskOutputs")
            .field("catalog", &self.catalog)
            .field("build_cache_enabled", &self.build_cache_enabled)
            .field("cache_if", &self.cache_if_specs.len())
            .field("do_not_cache_if", &self.do_not_cache_if_specs.len())
            .field("up_to_date_spec", &self.up_to_date_spec)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}
