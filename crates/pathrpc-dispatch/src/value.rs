use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::Serialize;

/// Identity of a server-side type in the registry.
///
/// Equality and hashing use the [`TypeId`] only; the name is kept for
/// error messages.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is<T: Any + ?Sized>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

type SerializeFn =
    for<'a> fn(&'a (dyn Any + Send + Sync + 'static)) -> Option<&'a dyn erased_serde::Serialize>;

fn serialize_as<'a, T: Serialize + Any>(
    value: &'a (dyn Any + Send + Sync + 'static),
) -> Option<&'a dyn erased_serde::Serialize> {
    value
        .downcast_ref::<T>()
        .map(|typed| typed as &dyn erased_serde::Serialize)
}

/// A shared, type-erased receiver, argument or result.
///
/// Values built with [`Value::data`] encode to their serde form when
/// returned to a caller. Opaque values ([`Value::new`], [`Value::object`])
/// are navigable receivers only and encode as `null`.
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    key: TypeKey,
    serialize: Option<SerializeFn>,
}

impl Value {
    /// Wrap an opaque value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::object(Arc::new(value))
    }

    /// Wrap a shared object without copying it.
    pub fn object<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            key: TypeKey::of::<T>(),
            serialize: None,
        }
    }

    /// Wrap a serializable value.
    pub fn data<T: Serialize + Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
            key: TypeKey::of::<T>(),
            serialize: Some(serialize_as::<T>),
        }
    }

    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Shared handle to the inner value if it is a `T`.
    pub fn downcast_arc<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    /// Move the inner value out.
    ///
    /// Fails, returning the value unchanged, if it is not a `T` or is still
    /// shared.
    pub fn take<T: Any + Send + Sync>(self) -> Result<T, Self> {
        let Value {
            inner,
            key,
            serialize,
        } = self;
        match inner.downcast::<T>() {
            Ok(typed) => Arc::try_unwrap(typed).map_err(|typed| Value {
                inner: typed,
                key,
                serialize,
            }),
            Err(inner) => Err(Value {
                inner,
                key,
                serialize,
            }),
        }
    }

    /// Serializable view of the value, `None` for opaque values.
    pub fn as_serialize(&self) -> Option<&dyn erased_serde::Serialize> {
        self.serialize.and_then(|serialize| serialize(&*self.inner))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("type", &self.key)
            .field("data", &self.serialize.is_some())
            .finish()
    }
}

/// Per-connection context handed to every procedure invocation.
///
/// Built once per connection by the application's context factory and
/// shared read-only by every request on that connection.
#[derive(Clone, Default)]
pub struct Context {
    inner: Option<Arc<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Some(Arc::new(value)),
        }
    }

    pub fn get<T: Any>(&self) -> Option<&T> {
        self.inner.as_deref().and_then(|inner| inner.downcast_ref::<T>())
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("empty", &self.is_empty())
            .finish()
    }
}
