use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::key_path::KeyPath;
use crate::observation::{with_observation_tracking, Observable};
use crate::stream::{AnyPublisher, Cancellable, Completion, PassthroughSubject, Subscriber};

/// The state shared by every generated property publisher.
///
/// A property publisher brackets each logical mutation of its object with
/// [`begin_modifications`](Self::begin_modifications) and
/// [`end_modifications`](Self::end_modifications). The brackets nest: [`will_change`] emits when
/// the outermost bracket opens and [`did_change`] when it closes, so a mutation touching several
/// properties is announced once.
///
/// Subclass publishers deref to their superclass's publisher and therefore share a single
/// `AnyPropertyPublisher` with it.
///
/// [`will_change`]: Self::will_change
/// [`did_change`]: Self::did_change
pub struct AnyPropertyPublisher {
    will_change: PassthroughSubject<()>,
    did_change: PassthroughSubject<()>,
    pending_modifications: Mutex<usize>,
}

impl Default for AnyPropertyPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AnyPropertyPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnyPropertyPublisher")
            .field("pending_modifications", &*self.pending_modifications.lock())
            .finish()
    }
}

impl AnyPropertyPublisher {
    pub fn new() -> Self {
        Self {
            will_change: PassthroughSubject::new(),
            did_change: PassthroughSubject::new(),
            pending_modifications: Mutex::new(0),
        }
    }

    /// Emits before the first property of the object changes in a modification bracket
    pub fn will_change(&self) -> AnyPublisher<()> {
        self.will_change.erase()
    }

    /// Emits after the last property of the object changed in a modification bracket
    pub fn did_change(&self) -> AnyPublisher<()> {
        self.did_change.erase()
    }

    #[doc(hidden)]
    pub fn begin_modifications(&self) {
        let outermost = {
            let mut pending = self.pending_modifications.lock();
            *pending += 1;
            *pending == 1
        };
        if outermost {
            tracing::trace!("modifications began");
            self.will_change.send(());
        }
    }

    #[doc(hidden)]
    pub fn end_modifications(&self) {
        let outermost = {
            let mut pending = self.pending_modifications.lock();
            match pending.checked_sub(1) {
                Some(remaining) => {
                    *pending = remaining;
                    remaining == 0
                }
                None => {
                    tracing::debug!("end_modifications called without a matching begin");
                    false
                }
            }
        };
        if outermost {
            tracing::trace!("modifications ended");
            self.did_change.send(());
        }
    }

    /// Run `modifications` inside a single modification bracket
    ///
    /// The bracket is closed even if `modifications` panics.
    pub fn with_modifications<R>(&self, modifications: impl FnOnce() -> R) -> R {
        self.begin_modifications();
        let _bracket = Bracket { publisher: self };
        modifications()
    }

    /// A stream of a stored property's values.
    ///
    /// Subscribers immediately receive the current value, read through `key_path`, followed by
    /// every value sent on `subject`.
    #[doc(hidden)]
    pub fn stored_property_publisher<Object, Value>(
        &self,
        subject: &PassthroughSubject<Value>,
        key_path: KeyPath<Object, Value>,
        object: &Weak<Object>,
    ) -> AnyPublisher<Value>
    where
        Object: Send + Sync + 'static,
        Value: Clone + Send + 'static,
    {
        let subject = subject.clone();
        let object = object.clone();
        AnyPublisher::new(move |subscriber: Subscriber<Value>| {
            if let Some(object) = object.upgrade() {
                subscriber.receive(key_path.get(&object));
            }
            subject.subscribe(subscriber)
        })
    }

    /// A stream of a computed property's values.
    ///
    /// Subscribers immediately receive the current value. The getter is evaluated inside a
    /// tracking scope; once any property it read changes, it is evaluated again (and re-tracked)
    /// when the enclosing modification bracket closes. The stream finishes when this publisher is
    /// dropped.
    #[doc(hidden)]
    pub fn computed_property_publisher<Object, Value>(
        &self,
        object: &Weak<Object>,
        getter: fn(&Object) -> Value,
    ) -> AnyPublisher<Value>
    where
        Object: Send + Sync + 'static,
        Value: Clone + Send + 'static,
    {
        let object = object.clone();
        let did_change = self.did_change.clone();
        AnyPublisher::new(move |subscriber: Subscriber<Value>| {
            let tracker = Arc::new(ComputedTracker {
                dirty: AtomicBool::new(false),
            });
            if let Some(object) = object.upgrade() {
                tracker.observe(&*object, getter, &subscriber);
            }
            let object = object.clone();
            let downstream = subscriber.clone();
            did_change.subscribe(Subscriber::new(
                move |()| {
                    if !tracker.dirty.swap(false, Ordering::SeqCst) {
                        return;
                    }
                    if let Some(object) = object.upgrade() {
                        tracker.observe(&*object, getter, &downstream);
                    }
                },
                move |completion| subscriber.receive_completion(completion),
            ))
        })
    }

    /// Finish both change streams. Called when the publisher is dropped.
    fn complete(&self) {
        self.will_change.send_completion(Completion::Finished);
        self.did_change.send_completion(Completion::Finished);
    }
}

impl Drop for AnyPropertyPublisher {
    fn drop(&mut self) {
        self.complete();
    }
}

/// Ends the modification bracket opened before it was created
struct Bracket<'a> {
    publisher: &'a AnyPropertyPublisher,
}

impl Drop for Bracket<'_> {
    fn drop(&mut self) {
        self.publisher.end_modifications();
    }
}

struct ComputedTracker {
    dirty: AtomicBool,
}

impl ComputedTracker {
    fn observe<Object, Value>(
        self: &Arc<Self>,
        object: &Object,
        getter: fn(&Object) -> Value,
        subscriber: &Subscriber<Value>,
    ) {
        let tracker = Arc::downgrade(self);
        let value = with_observation_tracking(
            || getter(object),
            move || {
                if let Some(tracker) = tracker.upgrade() {
                    tracker.dirty.store(true, Ordering::SeqCst);
                }
            },
        );
        subscriber.receive(value);
    }
}

/// An object exposing a companion publisher with one stream per tracked property.
///
/// Implemented by `#[publishable]` and `#[relayed]`.
pub trait Publishable: Observable {
    type PropertyPublisher: Send + Sync + 'static;

    fn publisher(&self) -> &Self::PropertyPublisher;
}

/// Keeps subscriptions alive for as long as it is alive
#[derive(Debug, Default)]
pub struct Cancellables {
    cancellables: Vec<Cancellable>,
}

impl Cancellables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, cancellable: Cancellable) {
        self.cancellables.push(cancellable);
    }

    pub fn len(&self) -> usize {
        self.cancellables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cancellables.is_empty()
    }

    pub fn cancel_all(&mut self) {
        self.cancellables.clear();
    }
}

impl Extend<Cancellable> for Cancellables {
    fn extend<I: IntoIterator<Item = Cancellable>>(&mut self, iter: I) {
        self.cancellables.extend(iter);
    }
}
