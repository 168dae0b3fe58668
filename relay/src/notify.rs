//! Compile-time selection of equality strategies for generated code.
//!
//! Generated accessors only know the concrete type of a property, not which traits it
//! implements. These tags use autoref-based method resolution: the call site takes a reference
//! to a [`Tag`] several times over and the compiler picks the most referenced impl whose bounds
//! hold for the concrete type.
//!
//! | type                          | should notify when          | duplicates removed |
//! |-------------------------------|-----------------------------|--------------------|
//! | `Arc<U>` where `U: PartialEq` | values differ               | yes                |
//! | `Arc<U>`                      | pointers differ             | yes, by pointer    |
//! | `T: PartialEq`                | values differ               | yes                |
//! | anything else                 | always                      | no                 |

use std::marker::PhantomData;
use std::sync::Arc;

use crate::stream::AnyPublisher;

pub struct Tag<T>(PhantomData<fn() -> T>);

impl<T> Tag<T> {
    pub const fn new() -> Self {
        Tag(PhantomData)
    }
}

impl<T> Default for Tag<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub trait ViaAnyObjectEquatable {
    type Value;
    fn should_notify_observers(&self, lhs: &Self::Value, rhs: &Self::Value) -> bool;
}

impl<U: ?Sized + PartialEq> ViaAnyObjectEquatable for &&&Tag<Arc<U>> {
    type Value = Arc<U>;

    fn should_notify_observers(&self, lhs: &Arc<U>, rhs: &Arc<U>) -> bool {
        lhs != rhs
    }
}

pub trait ViaAnyObject {
    type Value;
    fn should_notify_observers(&self, lhs: &Self::Value, rhs: &Self::Value) -> bool;
}

impl<U: ?Sized> ViaAnyObject for &&Tag<Arc<U>> {
    type Value = Arc<U>;

    fn should_notify_observers(&self, lhs: &Arc<U>, rhs: &Arc<U>) -> bool {
        !Arc::ptr_eq(lhs, rhs)
    }
}

pub trait ViaEquatable {
    type Value;
    fn should_notify_observers(&self, lhs: &Self::Value, rhs: &Self::Value) -> bool;
}

impl<T: PartialEq> ViaEquatable for &Tag<T> {
    type Value = T;

    fn should_notify_observers(&self, lhs: &T, rhs: &T) -> bool {
        lhs != rhs
    }
}

pub trait ViaAny {
    type Value;
    fn should_notify_observers(&self, lhs: &Self::Value, rhs: &Self::Value) -> bool;
}

impl<T> ViaAny for Tag<T> {
    type Value = T;

    fn should_notify_observers(&self, _lhs: &T, _rhs: &T) -> bool {
        true
    }
}

pub trait DedupAnyObjectEquatable {
    type Value;
    fn remove_duplicates_if_equatable(
        &self,
        publisher: AnyPublisher<Self::Value>,
    ) -> AnyPublisher<Self::Value>;
}

impl<U: ?Sized + Send + Sync + PartialEq + 'static> DedupAnyObjectEquatable for &&&Tag<Arc<U>> {
    type Value = Arc<U>;

    fn remove_duplicates_if_equatable(
        &self,
        publisher: AnyPublisher<Arc<U>>,
    ) -> AnyPublisher<Arc<U>> {
        publisher.remove_duplicates()
    }
}

pub trait DedupAnyObject {
    type Value;
    fn remove_duplicates_if_equatable(
        &self,
        publisher: AnyPublisher<Self::Value>,
    ) -> AnyPublisher<Self::Value>;
}

impl<U: ?Sized + Send + Sync + 'static> DedupAnyObject for &&Tag<Arc<U>> {
    type Value = Arc<U>;

    fn remove_duplicates_if_equatable(
        &self,
        publisher: AnyPublisher<Arc<U>>,
    ) -> AnyPublisher<Arc<U>> {
        publisher
            .map(Identity)
            .remove_duplicates()
            .map(|Identity(value)| value)
    }
}

pub trait DedupEquatable {
    type Value;
    fn remove_duplicates_if_equatable(
        &self,
        publisher: AnyPublisher<Self::Value>,
    ) -> AnyPublisher<Self::Value>;
}

impl<T: Clone + Send + PartialEq + 'static> DedupEquatable for &Tag<T> {
    type Value = T;

    fn remove_duplicates_if_equatable(&self, publisher: AnyPublisher<T>) -> AnyPublisher<T> {
        publisher.remove_duplicates()
    }
}

pub trait DedupAny {
    type Value;
    fn remove_duplicates_if_equatable(
        &self,
        publisher: AnyPublisher<Self::Value>,
    ) -> AnyPublisher<Self::Value>;
}

impl<T> DedupAny for Tag<T> {
    type Value = T;

    fn remove_duplicates_if_equatable(&self, publisher: AnyPublisher<T>) -> AnyPublisher<T> {
        publisher
    }
}

/// Compares `Arc`s by pointer
struct Identity<U: ?Sized>(Arc<U>);

impl<U: ?Sized> Clone for Identity<U> {
    fn clone(&self) -> Self {
        Identity(Arc::clone(&self.0))
    }
}

impl<U: ?Sized> PartialEq for Identity<U> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Whether replacing `$lhs` with `$rhs`, both of type `$ty`, should notify observers
#[doc(hidden)]
#[macro_export]
macro_rules! should_notify_observers {
    ($ty:ty, $lhs:expr, $rhs:expr) => {{
        #[allow(unused_imports)]
        use $crate::__private::notify::{ViaAny, ViaAnyObject, ViaAnyObjectEquatable, ViaEquatable};
        (&&&&$crate::__private::notify::Tag::<$ty>::new()).should_notify_observers($lhs, $rhs)
    }};
}

/// Apply `remove_duplicates` to `$publisher` when `$ty` can be compared
#[doc(hidden)]
#[macro_export]
macro_rules! remove_duplicates_if_equatable {
    ($ty:ty, $publisher:expr) => {{
        #[allow(unused_imports)]
        use $crate::__private::notify::{
            DedupAny, DedupAnyObject, DedupAnyObjectEquatable, DedupEquatable,
        };
        (&&&&$crate::__private::notify::Tag::<$ty>::new()).remove_duplicates_if_equatable($publisher)
    }};
}
