use std::fmt;
use std::marker::PhantomData;

/// A typed reference to a property of `Root` whose value is `Value`.
///
/// Generated code creates one key path per tracked property. Two key paths are equal when they
/// name the same property; the getter only exists so that the current value can be read back
/// from an object, for example to replay it to a new subscriber.
pub struct KeyPath<Root, Value> {
    name: &'static str,
    getter: fn(&Root) -> Value,
    _marker: PhantomData<fn(&Root) -> Value>,
}

impl<Root, Value> KeyPath<Root, Value> {
    pub const fn new(name: &'static str, getter: fn(&Root) -> Value) -> Self {
        Self {
            name,
            getter,
            _marker: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, root: &Root) -> Value {
        (self.getter)(root)
    }
}

impl<Root, Value> Clone for KeyPath<Root, Value> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Root, Value> Copy for KeyPath<Root, Value> {}

impl<Root, Value> PartialEq for KeyPath<Root, Value> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<Root, Value> Eq for KeyPath<Root, Value> {}

impl<Root, Value> fmt::Debug for KeyPath<Root, Value> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "KeyPath<{}, {}>({})",
            std::any::type_name::<Root>(),
            std::any::type_name::<Value>(),
            self.name
        )
    }
}
