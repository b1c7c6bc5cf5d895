// src/models.rs

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Opaque handle identifying what a node configures (a buffer, a view, a
/// window...). The engine never inspects it; catalog applicability
/// predicates downcast it to whatever concrete type they expect.
///
/// Only the distinguished global node carries no scope.
pub type Scope = Arc<dyn Any + Send + Sync>;

/// Object-safe backing trait for [`Value`]. It restores the capabilities
/// that are lost behind `dyn Any`: equality, cloning and a printable type
/// name. Implemented blanketly; never implement it by hand.
pub trait DynOptionValue: Any + Send + Sync + fmt::Debug {
    fn as_any(&self) -> &dyn Any;
    fn dyn_eq(&self, other: &dyn DynOptionValue) -> bool;
    fn dyn_type_name(&self) -> &'static str;
}

impl<T> DynOptionValue for T
where
    T: Any + Send + Sync + fmt::Debug + Clone + PartialEq,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn dyn_eq(&self, other: &dyn DynOptionValue) -> bool {
        // Values of different erased types are never equal.
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn dyn_type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// A type-erased, immutable option value.
///
/// The engine stores every override behind this container so that new option
/// kinds never require engine changes; the catalog's declared [`TypeId`] is
/// the authoritative tag checked at the typed API boundary. Cloning is cheap
/// (shared pointer), and equality compares the underlying values when their
/// types match.
#[derive(Clone)]
pub struct Value(Arc<dyn DynOptionValue>);

impl Value {
    /// Wraps a concrete value.
    pub fn of<T>(value: T) -> Self
    where
        T: Any + Send + Sync + fmt::Debug + Clone + PartialEq,
    {
        Self(Arc::new(value))
    }

    /// The [`TypeId`] of the wrapped value.
    pub fn type_id(&self) -> TypeId {
        self.0.as_any().type_id()
    }

    /// Human-readable name of the wrapped type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.0.dyn_type_name()
    }

    /// Whether the wrapped value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.0.as_any().is::<T>()
    }

    /// Borrows the wrapped value as a `T`, if the types match.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Clones the wrapped value out as a `T`, if the types match.
    pub fn downcast<T: Any + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.0.dyn_eq(other.0.as_ref())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

/// A typed option key: a (name, static type) pair that saves repeating the
/// type argument at call sites. It carries no resolution semantics beyond
/// the underlying name.
///
/// ```
/// use optree::OptionKey;
///
/// const TAB_SIZE: OptionKey<i64> = OptionKey::new("tab_size");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> OptionKey<T> {
    /// Creates a key for the given option name.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// The option identifier this key resolves through.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Payload delivered to change subscribers: the identifier of the option
/// whose resolved value changed at (or above) the subscribed node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionChanged {
    pub option_name: String,
}

impl OptionChanged {
    pub fn new(option_name: impl Into<String>) -> Self {
        Self {
            option_name: option_name.into(),
        }
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_equality_same_type() {
        assert_eq!(Value::of(4i64), Value::of(4i64));
        assert_ne!(Value::of(4i64), Value::of(5i64));
    }

    #[test]
    fn value_equality_across_types_is_false() {
        // 4i64 and 4i32 erase to different types; never equal.
        assert_ne!(Value::of(4i64), Value::of(4i32));
        assert_ne!(Value::of(String::from("4")), Value::of(4i64));
    }

    #[test]
    fn value_downcast_round_trip() {
        let value = Value::of(String::from("crlf"));
        assert!(value.is::<String>());
        assert_eq!(
            value.downcast_ref::<String>().map(String::as_str),
            Some("crlf")
        );
        assert_eq!(value.downcast::<String>(), Some(String::from("crlf")));
        assert_eq!(value.downcast::<bool>(), None);
    }

    #[test]
    fn value_reports_type_identity() {
        let value = Value::of(true);
        assert_eq!(value.type_id(), TypeId::of::<bool>());
        assert_eq!(value.type_name(), "bool");
    }

    #[test]
    fn option_key_is_just_a_name() {
        const KEY: OptionKey<bool> = OptionKey::new("use_tabs");
        assert_eq!(KEY.name(), "use_tabs");
    }
}
