//! Callback composites used by kiln to assemble user-supplied behaviour.
//!
//! Two composites live here and they are deliberately different types:
//!
//! - [`ActionRegistry`]: an ordered, deduplicating set of side-effect
//!   callbacks. Every distinct action runs on each [`ActionRegistry::execute`]
//!   call; execution never stops early.
//! - [`AndSpec`]: an ordered conjunction of labeled predicates. Evaluation
//!   stops at the first predicate that is not satisfied.
//!
//! Mixing the two up changes observable behaviour (a listener that never
//! fires, or a predicate that is evaluated after an earlier one already
//! decided the outcome), so neither type converts into the other.
//!
//! # Example
//!
//! ```
//! use kiln_actions::{Action, ActionRegistry, AndSpec, LabeledSpec};
//!
//! let registry: ActionRegistry<Vec<String>> = ActionRegistry::new();
//! let log = Action::keyed("log", |events: &Vec<String>| {
//!     let _ = events.len();
//! });
//! registry.add(log.clone());
//! registry.add(log);
//! assert_eq!(registry.len(), 1);
//!
//! let spec = AndSpec::empty().and(LabeledSpec::new("non-empty", |v: &Vec<u8>| !v.is_empty()));
//! assert!(spec.is_satisfied_by(&vec![1]));
//! ```

mod registry;
mod spec;

pub use registry::{Action, ActionRegistry};
pub use spec::{AndSpec, LabeledSpec};
