//! Ordered, deduplicating action registry.

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Identity {
    /// Equal only to clones of itself.
    Anonymous,
    /// Equal to any keyed action with the same key.
    Keyed(String),
    /// The no-op sentinel, never registered.
    Noop,
}

/// A side-effect callback over a target of type `T`.
///
/// Two actions are the same registration when one is a clone of the other
/// (reference identity) or when both were created with [`Action::keyed`]
/// using the same key (value equality).
pub struct Action<T: ?Sized> {
    identity: Identity,
    run: Callback<T>,
}

impl<T: ?Sized> Action<T> {
    /// Wrap a closure. The action is equal only to its own clones.
    pub fn new(run: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self {
            identity: Identity::Anonymous,
            run: Arc::new(run),
        }
    }

    /// Wrap a closure under a key. Actions sharing a key are interchangeable
    /// and only the first one added to a registry is kept.
    pub fn keyed(key: impl Into<String>, run: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self {
            identity: Identity::Keyed(key.into()),
            run: Arc::new(run),
        }
    }

    /// The action that does nothing. Registries drop it silently.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            identity: Identity::Noop,
            run: Arc::new(|_: &T| {}),
        }
    }

    /// Whether this is the no-op sentinel.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.identity == Identity::Noop
    }

    /// Run the action against `target`.
    pub fn execute(&self, target: &T) {
        (self.run)(target);
    }
}

impl<T: ?Sized> Clone for Action<T> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            run: Arc::clone(&self.run),
        }
    }
}

impl<T: ?Sized> PartialEq for Action<T> {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.run, &other.run) {
            return true;
        }
        match (&self.identity, &other.identity) {
            (Identity::Keyed(a), Identity::Keyed(b)) => a == b,
            _ => false,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Action<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

/// An ordered set of distinct actions, all of which run on every
/// [`execute`](Self::execute).
///
/// - Adding an action equal to one already registered is a no-op.
/// - [`Action::noop`] is ignored.
/// - `execute` runs against a snapshot of the list taken when it is called,
///   so an action may register further actions; those run from the next
///   `execute` onwards.
/// - Execution never stops early. For a composite that stops at the first
///   failing member, use [`AndSpec`](crate::AndSpec).
///
/// The registry is not thread-safe. It is `Send`, so it can move to the
/// worker that owns the unit of work, but it is not `Sync`.
pub struct ActionRegistry<T: ?Sized> {
    actions: RefCell<Vec<Action<T>>>,
}

impl<T: ?Sized> ActionRegistry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: RefCell::new(Vec::new()),
        }
    }

    /// Register an action. Returns `true` when the action was added, `false`
    /// when it was the no-op sentinel or an equal action was already present.
    pub fn add(&self, action: Action<T>) -> bool {
        if action.is_noop() {
            return false;
        }
        let mut actions = self.actions.borrow_mut();
        if actions.iter().any(|existing| *existing == action) {
            tracing::trace!(action = ?action, "Ignoring duplicate action registration");
            return false;
        }
        actions.push(action);
        true
    }

    /// Run every registered action, in insertion order, against `target`.
    pub fn execute(&self, target: &T) {
        let snapshot: Vec<Action<T>> = self.actions.borrow().clone();
        for action in &snapshot {
            action.execute(target);
        }
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.borrow().len()
    }

    /// Whether no action is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.borrow().is_empty()
    }
}

impl<T: ?Sized> Default for ActionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for ActionRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> Action<()> {
        let counter = Arc::clone(counter);
        Action::new(move |(): &()| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    // ==========================================================================
    // Deduplication
    // ==========================================================================

    #[test]
    fn same_action_added_twice_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let action = counting(&counter);
        let registry = ActionRegistry::new();

        assert!(registry.add(action.clone()));
        assert!(!registry.add(action));
        registry.execute(&());

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn keyed_actions_are_equal_by_key() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ActionRegistry::new();
        for _ in 0..3 {
            let counter = Arc::clone(&counter);
            registry.add(Action::keyed("report", move |(): &()| {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        registry.execute(&());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_anonymous_actions_all_run() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = ActionRegistry::new();
        registry.add(counting(&counter));
        registry.add(counting(&counter));

        registry.execute(&());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn noop_is_never_registered() {
        let registry: ActionRegistry<()> = ActionRegistry::new();
        assert!(!registry.add(Action::noop()));
        assert!(registry.is_empty());
    }

    // ==========================================================================
    // Execution
    // ==========================================================================

    #[test]
    fn runs_in_insertion_order() {
        let registry: ActionRegistry<std::sync::Mutex<Vec<u8>>> = ActionRegistry::new();
        for i in 0..4u8 {
            registry.add(Action::new(move |seen: &std::sync::Mutex<Vec<u8>>| {
                if let Ok(mut seen) = seen.lock() {
                    seen.push(i);
                }
            }));
        }
        let seen = std::sync::Mutex::new(Vec::new());
        registry.execute(&seen);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    struct Host {
        registry: ActionRegistry<Host>,
        calls: Cell<u32>,
    }

    #[test]
    fn actions_added_during_execute_run_next_time() {
        let host = Host {
            registry: ActionRegistry::new(),
            calls: Cell::new(0),
        };
        host.registry.add(Action::keyed("spawner", |host: &Host| {
            host.calls.set(host.calls.get() + 1);
            host.registry.add(Action::keyed("spawned", |host: &Host| {
                host.calls.set(host.calls.get() + 10);
            }));
        }));

        host.registry.execute(&host);
        assert_eq!(host.calls.get(), 1);
        assert_eq!(host.registry.len(), 2);

        host.registry.execute(&host);
        assert_eq!(host.calls.get(), 12);
    }

    #[test]
    fn empty_registry_execute_is_harmless() {
        let registry: ActionRegistry<()> = ActionRegistry::default();
        registry.execute(&());
        assert!(registry.is_empty());
    }
}
