//! Incremental execution core for build tools.
//!
//! kiln decides two things about a unit of work:
//! - is it **up to date**? Its declared inputs are fingerprinted
//!   ([`kiln_fingerprint`]) and compared with the fingerprint recorded after
//!   its last successful execution.
//! - may its outputs be **cached**? A [`CachingVerdict`] is derived from the
//!   unit's output declarations, caching predicates and execution history
//!   ([`kiln_caching`]).
//!
//! [`IncrementalExecutor`] wires the pieces together around a
//! [`HistoryStore`](kiln_caching::HistoryStore).
//!
//! ```rust,no_run
//! use kiln::{IncrementalExecutor, Outcome, UnitOfWork, config::Settings};
//! use kiln_fingerprint::{InputProperty, PathSensitivity};
//! use kiln_outputs::OutputFileProperty;
//!
//! # fn main() -> kiln::Result<()> {
//! let executor = IncrementalExecutor::from_settings(Settings::default().with_env_overrides()?)?;
//! let mut unit = UnitOfWork::new("compile", ())
//!     .with_input(InputProperty::directory("sources", "src").with_sensitivity(PathSensitivity::Relative))
//!     .with_output(OutputFileProperty::dir("classes", "build/classes"));
//! unit.outputs_mut().cache_if(|_| true);
//!
//! match executor.run(&mut unit, |_| Ok(()))? {
//!     Outcome::Skipped { .. } => println!("up to date"),
//!     Outcome::Executed { reason, verdict, .. } => println!("{reason}; {verdict}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
mod error;
mod executor;
pub mod history;
pub mod tracing;

pub use error::{Error, Result};
pub use executor::{IncrementalExecutor, Outcome, UnitOfWork, UpToDate};
pub use history::{InMemoryHistoryStore, JsonHistoryStore};
pub use kiln_caching::{CachingVerdict, DisabledReason};
