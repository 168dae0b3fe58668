//! Native change tracking.
//!
//! Every observable object owns an [`ObservationRegistrar`]. Generated getters report reads to
//! it with [`ObservationRegistrar::access`] and generated setters bracket writes with
//! [`ObservationRegistrar::will_set`] and [`ObservationRegistrar::did_set`].
//! [`with_observation_tracking`] runs a closure, records every property it read (on any
//! registrar) and calls a callback once, the first time one of those properties is about to
//! change.
//!
//! # Invariants
//!
//! 1. An `on_change` callback fires at most once, and before the new value is stored.
//! 2. Accesses recorded in a nested tracking scope are also recorded in the enclosing scope.
//! 3. Callbacks never run while a registrar's lock is held, so they may read, write and start
//!    new tracking scopes on the same object.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::actor::GlobalActor;
use crate::key_path::KeyPath;
use crate::storage::MemoizedStorage;

type OnChange = Box<dyn FnOnce() + Send>;

struct Observation {
    on_change: Mutex<Option<OnChange>>,
}

impl Observation {
    fn is_spent(&self) -> bool {
        self.on_change.lock().is_none()
    }

    fn fire(&self) {
        let on_change = self.on_change.lock().take();
        if let Some(on_change) = on_change {
            on_change();
        }
    }
}

struct Observer {
    properties: Vec<&'static str>,
    observation: Arc<Observation>,
}

#[derive(Default)]
struct RegistrarState {
    observers: Vec<Observer>,
}

#[derive(Clone)]
struct Access {
    registrar: Weak<Mutex<RegistrarState>>,
    property: &'static str,
}

thread_local! {
    static TRACKING: RefCell<Vec<Vec<Access>>> = const { RefCell::new(Vec::new()) };
}

/// The change tracker owned by every observable object
#[derive(Default)]
pub struct ObservationRegistrar {
    state: Arc<Mutex<RegistrarState>>,
}

impl fmt::Debug for ObservationRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationRegistrar")
            .field("observers", &self.observer_count())
            .finish()
    }
}

impl ObservationRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a read of `key_path` in the innermost active tracking scope, if there is one
    pub fn access<Subject, Value>(&self, _subject: &Subject, key_path: &KeyPath<Subject, Value>) {
        TRACKING.with(|tracking| {
            if let Some(accesses) = tracking.borrow_mut().last_mut() {
                accesses.push(Access {
                    registrar: Arc::downgrade(&self.state),
                    property: key_path.name(),
                });
            }
        });
    }

    /// Notify every observer of `key_path` that it is about to change
    pub fn will_set<Subject, Value>(&self, _subject: &Subject, key_path: &KeyPath<Subject, Value>) {
        let property = key_path.name();
        let fired = {
            let mut state = self.state.lock();
            let mut fired = Vec::new();
            state.observers.retain(|observer| {
                if observer.observation.is_spent() {
                    false
                } else if observer.properties.contains(&property) {
                    fired.push(Arc::clone(&observer.observation));
                    false
                } else {
                    true
                }
            });
            fired
        };
        if !fired.is_empty() {
            tracing::trace!(property, observers = fired.len(), "firing observers");
        }
        for observation in fired {
            observation.fire();
        }
    }

    pub fn did_set<Subject, Value>(&self, _subject: &Subject, _key_path: &KeyPath<Subject, Value>) {}

    pub fn with_mutation<Subject, Value, R>(
        &self,
        subject: &Subject,
        key_path: &KeyPath<Subject, Value>,
        mutation: impl FnOnce() -> R,
    ) -> R {
        self.will_set(subject, key_path);
        let _did_set = crate::__private::defer(|| self.did_set(subject, key_path));
        mutation()
    }

    /// The number of registered observers which have not fired yet
    pub fn observer_count(&self) -> usize {
        self.state
            .lock()
            .observers
            .iter()
            .filter(|observer| !observer.observation.is_spent())
            .count()
    }
}

struct TrackingScope {
    active: bool,
}

impl TrackingScope {
    fn enter() -> Self {
        TRACKING.with(|tracking| tracking.borrow_mut().push(Vec::new()));
        Self { active: true }
    }

    fn exit(mut self) -> Vec<Access> {
        self.active = false;
        TRACKING.with(|tracking| {
            let mut stack = tracking.borrow_mut();
            let accesses = stack.pop().unwrap_or_default();
            if let Some(parent) = stack.last_mut() {
                parent.extend(accesses.iter().cloned());
            }
            accesses
        })
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        if self.active {
            TRACKING.with(|tracking| tracking.borrow_mut().pop());
        }
    }
}

/// Run `apply`, then call `on_change` the first time any property read by `apply` is about to
/// change.
///
/// If `apply` reads no tracked property `on_change` is dropped without being called.
pub fn with_observation_tracking<R>(
    apply: impl FnOnce() -> R,
    on_change: impl FnOnce() + Send + 'static,
) -> R {
    let scope = TrackingScope::enter();
    let result = apply();
    let accesses = scope.exit();
    if accesses.is_empty() {
        return result;
    }

    let observation = Arc::new(Observation {
        on_change: Mutex::new(Some(Box::new(on_change))),
    });
    let mut registrars: Vec<(Arc<Mutex<RegistrarState>>, Vec<&'static str>)> = Vec::new();
    for access in accesses {
        let Some(registrar) = access.registrar.upgrade() else {
            continue;
        };
        match registrars
            .iter_mut()
            .find(|(other, _)| Arc::ptr_eq(other, &registrar))
        {
            Some((_, properties)) => {
                if !properties.contains(&access.property) {
                    properties.push(access.property);
                }
            }
            None => registrars.push((registrar, vec![access.property])),
        }
    }
    tracing::trace!(registrars = registrars.len(), "tracking observation");
    for (registrar, properties) in registrars {
        registrar.lock().observers.push(Observer {
            properties,
            observation: Arc::clone(&observation),
        });
    }
    result
}

/// An object whose properties are tracked by an [`ObservationRegistrar`].
///
/// Implemented by `#[observable]` and `#[relayed]`; not intended to be implemented by hand.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not observable",
    label = "annotate `{Self}` with #[relayed] or #[observable]"
)]
pub trait Observable: Send + Sync + Sized + 'static {
    /// The domain generated members of this type are confined to
    type Isolation: GlobalActor;

    /// The strategy generated accessors report reads and writes through
    type Registrar: PublishableObservationRegistrar<Self>;

    const REGISTRAR: Self::Registrar;

    fn observation_registrar(&self) -> &ObservationRegistrar;

    fn downgrade(&self) -> Weak<Self>;

    #[doc(hidden)]
    fn memoized_storage(&self) -> &MemoizedStorage;

    #[doc(hidden)]
    fn begin_modifications(&self) {}

    #[doc(hidden)]
    fn end_modifications(&self) {}
}

/// The four operations generated accessors perform against a change tracker.
///
/// The strategy is stateless: everything it needs is reachable from the object passed to each
/// call.
pub trait PublishableObservationRegistrar<Object> {
    fn access<Value: 'static>(&self, object: &Object, key_path: &KeyPath<Object, Value>);

    fn will_set<Value: 'static>(&self, object: &Object, key_path: &KeyPath<Object, Value>);

    fn did_set<Value: 'static>(&self, object: &Object, key_path: &KeyPath<Object, Value>);

    fn with_mutation<Value: 'static, R, F: FnOnce() -> R>(
        &self,
        object: &Object,
        key_path: &KeyPath<Object, Value>,
        mutation: F,
    ) -> R;
}

/// Forwards every operation to the object's own [`ObservationRegistrar`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeObservationRegistrar;

impl<Object: Observable> PublishableObservationRegistrar<Object> for NativeObservationRegistrar {
    fn access<Value: 'static>(&self, object: &Object, key_path: &KeyPath<Object, Value>) {
        object.observation_registrar().access(object, key_path)
    }

    fn will_set<Value: 'static>(&self, object: &Object, key_path: &KeyPath<Object, Value>) {
        object.observation_registrar().will_set(object, key_path)
    }

    fn did_set<Value: 'static>(&self, object: &Object, key_path: &KeyPath<Object, Value>) {
        object.observation_registrar().did_set(object, key_path)
    }

    fn with_mutation<Value: 'static, R, F: FnOnce() -> R>(
        &self,
        object: &Object,
        key_path: &KeyPath<Object, Value>,
        mutation: F,
    ) -> R {
        object
            .observation_registrar()
            .with_mutation(object, key_path, mutation)
    }
}
