//! Type-erased instances and explicit arguments.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::types::{self, Erased, TypeKey};

/// Shared object produced by a binder.
///
/// `view` holds the `Arc<V>` of the requested type; `object` holds the `Arc<I>`
/// of the concrete implementation when it is known.
#[derive(Clone)]
pub struct Instance {
    view: Erased,
    view_key: TypeKey,
    object: Option<Erased>,
    object_key: Option<TypeKey>,
    addr: usize,
}

fn address<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

impl Instance {
    pub fn new<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        let addr = address(&value);
        Self {
            view: Arc::new(value.clone()),
            view_key: TypeKey::of::<T>(),
            object: Some(Arc::new(value)),
            object_key: Some(TypeKey::of::<T>()),
            addr,
        }
    }

    pub fn from_value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(Arc::new(value))
    }

    /// Instance known only through the view `V` (e.g. a provider result).
    pub fn shared<V: ?Sized + Send + Sync + 'static>(value: Arc<V>) -> Self {
        let addr = address(&value);
        Self {
            view: Arc::new(value),
            view_key: TypeKey::of::<V>(),
            object: None,
            object_key: None,
            addr,
        }
    }

    pub fn upcast<I, V>(object: Arc<I>, view: Arc<V>) -> Self
    where
        I: Send + Sync + 'static,
        V: ?Sized + Send + Sync + 'static,
    {
        Self {
            addr: address(&object),
            view: Arc::new(view),
            view_key: TypeKey::of::<V>(),
            object: Some(Arc::new(object)),
            object_key: Some(TypeKey::of::<I>()),
        }
    }

    /// Returns the instance as `Arc<T>` through the view, the concrete object
    /// or the other form of a primitive.
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<Arc<T>> {
        if let Some(v) = self.view.downcast_ref::<Arc<T>>() {
            return Some(v.clone());
        }
        if let Some(o) = self.object.as_ref().and_then(|o| o.downcast_ref::<Arc<T>>()) {
            return Some(o.clone());
        }
        types::convert(&self.view, self.view_key.raw(), TypeId::of::<T>())
            .and_then(|converted| converted.downcast_ref::<Arc<T>>().cloned())
    }

    pub fn satisfies(&self, key: &TypeKey) -> bool {
        self.view_key == *key || self.object_key.is_some_and(|k| k == *key)
    }

    pub fn key(&self) -> TypeKey {
        self.view_key
    }

    pub fn type_name(&self) -> &'static str {
        self.object_key.unwrap_or(self.view_key).name()
    }

    /// Identity of the underlying allocation.
    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.addr == other.addr
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("view", &self.view_key)
            .field("object", &self.object_key)
            .field("addr", &format_args!("{:#x}", self.addr))
            .finish()
    }
}

/// Explicit argument passed to `get_with`.
#[derive(Clone, Debug)]
pub enum Arg {
    Null,
    Value(Instance),
}

impl Arg {
    pub fn of<T: Send + Sync + 'static>(value: T) -> Self {
        Arg::Value(Instance::from_value(value))
    }

    pub fn shared<V: ?Sized + Send + Sync + 'static>(value: Arc<V>) -> Self {
        Arg::Value(Instance::shared(value))
    }

    pub fn null() -> Self {
        Arg::Null
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Arg::Null)
    }

    pub fn instance(&self) -> Option<&Instance> {
        match self {
            Arg::Null => None,
            Arg::Value(instance) => Some(instance),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Arg::Null => type_name::<()>(),
            Arg::Value(instance) => instance.type_name(),
        }
    }
}
