//! Process-wide interning of path strings.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

/// Append-only table that deduplicates repeated path strings.
///
/// Reads take a shared lock; inserting a new string takes the write lock.
/// Strings are never removed.
#[derive(Debug, Default)]
pub struct PathInterner {
    strings: RwLock<HashSet<Arc<str>>>,
}

static GLOBAL: OnceLock<PathInterner> = OnceLock::new();

impl PathInterner {
    /// Create an empty interner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The interner shared by every walker in the process.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Return the shared copy of `value`, inserting it on first sight.
    pub fn intern(&self, value: &str) -> Arc<str> {
        if let Some(existing) = self.strings.read().get(value) {
            return Arc::clone(existing);
        }
        let mut strings = self.strings.write();
        if let Some(existing) = strings.get(value) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(value);
        strings.insert(Arc::clone(&interned));
        interned
    }

    /// Number of distinct strings held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.read().len()
    }

    /// Whether nothing has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.read().is_empty()
    }
}
