//! Caching eligibility and execution history for kiln.
//!
//! [`TaskOutputs`] owns a unit's output catalog and its caching predicates
//! and answers one question: may this unit's outputs be cached right now?
//! The answer is a [`CachingVerdict`], which is data, never an error.
//!
//! History lives behind the [`HistoryStore`] trait. Before asking for a
//! verdict, the caller snapshots the declared outputs, asks the store for
//! overlaps via [`HistoryStore::previous_overlap`], and attaches the result
//! with [`TaskOutputs::set_history`].
//!
//! ```rust
//! use kiln_caching::{DisabledReason, TaskOutputs};
//! use kiln_outputs::{OutputCatalog, OutputFileProperty};
//!
//! struct Unit;
//!
//! let mut outputs: TaskOutputs<Unit> = TaskOutputs::new(
//!     OutputCatalog::new("compile")
//!         .with_properties([OutputFileProperty::dir("classes", "build/classes")]),
//! );
//! let verdict = outputs.caching_state(&Unit).unwrap();
//! assert_eq!(verdict.reason(), Some(DisabledReason::NotEnabledForTask));
//!
//! outputs.cache_if(|_| true);
//! assert!(outputs.caching_state(&Unit).unwrap().is_enabled());
//! ```

mod error;
mod history;
mod outputs;
mod verdict;

pub use error::{Error, Result};
pub use history::{
    ExecutionHistory, HistoryRecord, HistoryStore, OutputSnapshot, OverlapInfo, PropertyOutputs,
    detect_overlap,
};
pub use outputs::{DEFAULT_CACHE_IF_LABEL, TaskOutputs};
pub use verdict::{CachingVerdict, DisabledReason};
