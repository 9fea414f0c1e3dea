//! Labeled predicates and their short-circuiting conjunction.

use std::fmt;
use std::sync::Arc;

/// A predicate over `T` paired with a human-readable label.
///
/// The label is reported verbatim when the predicate decides an outcome,
/// e.g. `'Unit outputs cacheable' not satisfied`.
pub struct LabeledSpec<T: ?Sized> {
    label: String,
    predicate: Arc<dyn Fn(&T) -> bool + Send + Sync>,
}

impl<T: ?Sized> LabeledSpec<T> {
    /// Create a labeled predicate.
    pub fn new(label: impl Into<String>, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// A predicate that always holds.
    pub fn always(label: impl Into<String>) -> Self {
        Self::new(label, |_: &T| true)
    }

    /// The display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Evaluate the predicate. Evaluation is lazy: the predicate reads
    /// whatever state `target` holds at call time.
    pub fn is_satisfied_by(&self, target: &T) -> bool {
        (self.predicate)(target)
    }
}

impl<T: ?Sized> Clone for LabeledSpec<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<T: ?Sized> fmt::Debug for LabeledSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabeledSpec")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Conjunction of labeled predicates that stops at the first failure.
///
/// `AndSpec` is immutable: [`and`](Self::and) returns a new conjunction.
/// The empty conjunction is satisfied by everything.
pub struct AndSpec<T: ?Sized> {
    specs: Vec<LabeledSpec<T>>,
}

impl<T: ?Sized> AndSpec<T> {
    /// The empty conjunction.
    #[must_use]
    pub fn empty() -> Self {
        Self { specs: Vec::new() }
    }

    /// A conjunction with `spec` appended.
    #[must_use]
    pub fn and(&self, spec: LabeledSpec<T>) -> Self {
        let mut specs = self.specs.clone();
        specs.push(spec);
        Self { specs }
    }

    /// Whether no predicate has been conjoined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Number of conjoined predicates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Whether every predicate holds for `target`.
    pub fn is_satisfied_by(&self, target: &T) -> bool {
        self.first_unsatisfied(target).is_none()
    }

    /// The first predicate, in conjunction order, that does not hold.
    /// Later predicates are not evaluated.
    pub fn first_unsatisfied(&self, target: &T) -> Option<&LabeledSpec<T>> {
        self.specs.iter().find(|spec| !spec.is_satisfied_by(target))
    }
}

impl<T: ?Sized> Clone for AndSpec<T> {
    fn clone(&self) -> Self {
        Self {
            specs: self.specs.clone(),
        }
    }
}

impl<T: ?Sized> Default for AndSpec<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> fmt::Debug for AndSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.specs.iter().map(LabeledSpec::label))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn empty_conjunction_is_satisfied() {
        let spec: AndSpec<u32> = AndSpec::empty();
        assert!(spec.is_empty());
        assert!(spec.is_satisfied_by(&7));
    }

    #[test]
    fn reports_first_failing_label() {
        let spec = AndSpec::empty()
            .and(LabeledSpec::new("positive", |n: &i32| *n > 0))
            .and(LabeledSpec::new("even", |n: &i32| n % 2 == 0))
            .and(LabeledSpec::new("small", |n: &i32| *n < 10));

        assert!(spec.is_satisfied_by(&4));
        assert_eq!(spec.first_unsatisfied(&3).map(LabeledSpec::label), Some("even"));
        assert_eq!(spec.first_unsatisfied(&-2).map(LabeledSpec::label), Some("positive"));
    }

    #[test]
    fn stops_evaluating_after_first_failure() {
        let evaluated = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&evaluated);
        let spec = AndSpec::empty()
            .and(LabeledSpec::new("never", |(): &()| false))
            .and(LabeledSpec::new("counted", move |(): &()| {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }));

        assert!(!spec.is_satisfied_by(&()));
        assert_eq!(evaluated.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn and_leaves_original_untouched() {
        let base: AndSpec<()> = AndSpec::empty();
        let extended = base.and(LabeledSpec::always("ok"));
        assert!(base.is_empty());
        assert_eq!(extended.len(), 1);
    }
}
