//! # Relay
//!
//! `relay` adds reactive behaviour to plain structs through attribute macros. A struct annotated
//! with [`relayed`] (or with [`publishable`] above [`observable`]) gets:
//!
//! - a constructor returning `Arc<Self>`, and `&self` accessors for every tracked field
//! - native change tracking, usable with [`with_observation_tracking`]
//! - a companion property publisher with one stream per property, plus `will_change` and
//!   `did_change` streams which fire once per logical mutation
//!
//! [`memoized`] turns a `&self` method into a cached accessor which is invalidated when one of
//! the properties it read is about to change.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//!
//! use relay::{relayed, Cancellables};
//!
//! #[relayed]
//! pub struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! let person = Person::new("Sherlock".to_string(), 40);
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let mut cancellables = Cancellables::new();
//! let sink = Arc::clone(&seen);
//! cancellables.insert(person.publisher().age().sink(move |age| sink.lock().unwrap().push(age)));
//!
//! person.set_age(41);
//! person.set_age(41);
//! assert_eq!(*seen.lock().unwrap(), vec![40, 41]);
//! ```
//!
//! Property streams replay the current value on subscription and drop consecutive duplicates
//! when the property's type implements `PartialEq`.
//!
//! ## Batching
//!
//! Writes made inside [`AnyPropertyPublisher::with_modifications`] or through a generated
//! `modify_*` accessor are coalesced: `will_change` fires once when the outermost modification
//! begins and `did_change` once when it ends.
//!
//! ## Isolation
//!
//! A struct may be confined to a [`GlobalActor`] with `isolation = MainActor` or
//! `#[isolated(MainActor)]`. Generated callbacks then assert that they run inside that domain.

extern crate self as relay;

mod actor;
mod key_path;
#[doc(hidden)]
pub mod notify;
mod observation;
mod publisher;
mod storage;
mod stream;

pub use actor::{GlobalActor, IsolationError, MainActor, Nonisolated};
pub use key_path::KeyPath;
pub use observation::{
    with_observation_tracking, NativeObservationRegistrar, Observable, ObservationRegistrar,
    PublishableObservationRegistrar,
};
pub use publisher::{AnyPropertyPublisher, Cancellables, Publishable};
pub use storage::{MemoizedStorage, Storage};
pub use stream::{AnyPublisher, Cancellable, Completion, PassthroughSubject, Subscriber};

pub use relay_derive::{
    memoized, observable, observation_ignored, observation_suppressed, publishable,
    publisher_ignored, publisher_suppressed, relayed,
};
#[doc(hidden)]
#[allow(deprecated)]
pub use relay_derive::publisher_supressed;

#[doc(hidden)]
pub mod __private {
    pub use crate::notify;

    /// Implemented only for a pair of identical types
    pub trait SameIsolation<T> {}

    impl<T> SameIsolation<T> for T {}

    /// Compiles only when a subclass and its base are confined to the same domain
    pub const fn assert_same_isolation<A: SameIsolation<B>, B>() {}

    /// Runs its closure when dropped, including while unwinding
    pub struct Defer<F: FnOnce()>(Option<F>);

    impl<F: FnOnce()> Drop for Defer<F> {
        fn drop(&mut self) {
            if let Some(deferred) = self.0.take() {
                deferred();
            }
        }
    }

    pub fn defer<F: FnOnce()>(deferred: F) -> Defer<F> {
        Defer(Some(deferred))
    }
}
