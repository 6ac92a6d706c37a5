//! In-process pulse fan-out.
//!
//! Listeners subscribe with a type filter and are called synchronously, in
//! registration order, for every pulse admitted after they subscribed. There
//! is no backlog: a late subscriber never sees earlier pulses.
//!
//! A listener that returns an error or panics is logged and skipped; delivery
//! continues with the next listener and the pulse stays committed.

use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::warn;

use xhe_core::{Pulse, PulseType};

/// Error a listener may return.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Listener = Arc<dyn Fn(&Pulse) -> Result<(), ListenerError> + Send + Sync>;

/// Which pulse types a listener receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    /// Every pulse.
    All,
    /// Only pulses whose type is in the set.
    Types(BTreeSet<PulseType>),
}

impl TypeFilter {
    /// Build a filter from type names. A `*` among them selects everything.
    pub fn of<I, T>(types: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<PulseType>,
    {
        let types: BTreeSet<PulseType> = types.into_iter().map(Into::into).collect();
        if types.iter().any(|t| t == "*") {
            TypeFilter::All
        } else {
            TypeFilter::Types(types)
        }
    }

    pub fn matches(&self, kind: &PulseType) -> bool {
        match self {
            TypeFilter::All => true,
            TypeFilter::Types(types) => types.contains(kind),
        }
    }
}

struct Entry {
    id: u64,
    filter: TypeFilter,
    listener: Listener,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // A panicking listener runs outside the lock, so poisoning can only come
    // from a bug in this module; the registry itself stays consistent.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Subscription registry and fan-out.
#[derive(Default)]
pub struct EventDispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until
    /// [`Subscription::unsubscribe`] is called; dropping the handle does not
    /// remove it.
    pub fn subscribe<F>(&self, filter: TypeFilter, listener: F) -> Subscription
    where
        F: Fn(&Pulse) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push(Entry {
            id,
            filter,
            listener: Arc::new(listener),
        });

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `pulse` to every matching listener. Returns how many
    /// listeners completed without error.
    pub fn dispatch(&self, pulse: &Pulse) -> usize {
        let targets: Vec<(u64, Listener)> = lock(&self.registry)
            .entries
            .iter()
            .filter(|e| e.filter.matches(&pulse.kind))
            .map(|e| (e.id, Arc::clone(&e.listener)))
            .collect();

        let mut delivered = 0;
        for (id, listener) in targets {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(pulse))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(subscription = id, index = pulse.index, error = %e, "pulse listener failed");
                }
                Err(_) => {
                    warn!(subscription = id, index = pulse.index, "pulse listener panicked");
                }
            }
        }
        delivered
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.registry).entries.len()
    }
}

/// Handle to a registered listener.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the listener. Returns false if it was already gone (or the
    /// dispatcher was dropped).
    pub fn unsubscribe(self) -> bool {
        let Some(registry) = self.registry.upgrade() else {
            return false;
        };
        let mut registry = lock(&registry);
        let before = registry.entries.len();
        registry.entries.retain(|e| e.id != self.id);
        registry.entries.len() != before
    }
}
