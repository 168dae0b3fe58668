//! Backing storage for generated properties.
//!
//! The attribute macros rewrite every tracked field into a [`Storage`] so that the generated
//! accessors can take `&self`. Memoized accessors keep their caches in a [`MemoizedStorage`]
//! owned by the host.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use parking_lot::{Mutex, RwLock};

/// Interior-mutable storage for a single property value.
///
/// Every method takes the lock only for the duration of the call. In particular the closures
/// passed to [`Storage::with`] and [`Storage::with_mut`] run under the lock, so they must not
/// access the same property through its generated accessors.
pub struct Storage<T> {
    value: RwLock<T>,
}

impl<T> Storage<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.value.read().clone()
    }

    pub fn set(&self, value: T) {
        *self.value.write() = value;
    }

    /// Store `value` and return the previous one
    pub fn replace(&self, value: T) -> T {
        std::mem::replace(&mut *self.value.write(), value)
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.value.write())
    }

    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for Storage<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Storage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Storage").field(&*self.value.read()).finish()
    }
}

/// Cache slots for memoized accessors, keyed by property name.
///
/// A slot is either empty or holds the last computed value. Values are stored type-erased; a
/// lookup with the wrong type behaves like an empty slot.
#[derive(Default)]
pub struct MemoizedStorage {
    slots: Mutex<HashMap<&'static str, Box<dyn Any + Send + Sync>>>,
}

impl MemoizedStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Clone + 'static>(&self, name: &str) -> Option<T> {
        self.slots
            .lock()
            .get(name)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    pub fn insert<T: Send + Sync + 'static>(&self, name: &'static str, value: T) {
        self.slots.lock().insert(name, Box::new(value));
    }

    /// Empty the slot, returning whether it held a value
    pub fn remove(&self, name: &str) -> bool {
        self.slots.lock().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.lock().contains_key(name)
    }
}

impl fmt::Debug for MemoizedStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots = self.slots.lock();
        let mut names = slots.keys().collect::<Vec<_>>();
        names.sort();
        f.debug_struct("MemoizedStorage")
            .field("cached", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn storage_replace_returns_previous_value() {
        let storage = Storage::new(1);
        assert_eq!(storage.replace(2), 1);
        assert_eq!(storage.get(), 2);
        storage.with_mut(|value| *value += 1);
        assert_eq!(storage.with(|value| *value), 3);
    }

    #[test]
    fn memoized_slot_with_wrong_type_reads_as_empty() {
        let storage = MemoizedStorage::new();
        storage.insert("area", 4.0_f64);
        assert_eq!(storage.get::<f64>("area"), Some(4.0));
        assert_eq!(storage.get::<i32>("area"), None);
        assert!(storage.remove("area"));
        assert!(!storage.remove("area"));
        assert!(!storage.contains("area"));
    }
}
