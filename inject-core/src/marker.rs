//! Markers and annotations attached to injection points.

use std::any::{type_name, TypeId};
use std::fmt;

use crate::types::{short_type_name, TypeKey};

/// Marker type used as a qualifier (normally a unit struct).
pub trait Marker: 'static {}

/// Requests injection of a constructor, field or setter.
pub struct Inject;
/// Declares a type or binding as singleton.
pub struct Singleton;
pub struct NotNull;
pub struct Nullable;

impl Marker for Inject {}
impl Marker for Singleton {}
impl Marker for NotNull {}
impl Marker for Nullable {}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId {
    id: TypeId,
    name: &'static str,
}

impl MarkerId {
    pub fn of<M: Marker>() -> Self {
        Self {
            id: TypeId::of::<M>(),
            name: type_name::<M>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Structural markers never act as qualifiers.
    pub fn is_structural(&self) -> bool {
        [
            TypeId::of::<Inject>(),
            TypeId::of::<Singleton>(),
            TypeId::of::<NotNull>(),
            TypeId::of::<Nullable>(),
        ]
        .contains(&self.id)
    }
}

impl fmt::Debug for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", short_type_name(self.name))
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&short_type_name(self.name))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Annotation {
    Named(String),
    Marker(MarkerId),
}

impl Annotation {
    pub fn named(name: impl Into<String>) -> Self {
        Annotation::Named(name.into())
    }

    pub fn marker<M: Marker>() -> Self {
        Annotation::Marker(MarkerId::of::<M>())
    }
}

/// Ordered annotations of one parameter or member.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Annotations(Vec<Annotation>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, annotation: Annotation) -> Self {
        self.0.push(annotation);
        self
    }

    pub fn push(&mut self, annotation: Annotation) {
        self.0.push(annotation);
    }

    /// The first `Named` annotation supplies the binding name.
    pub fn name(&self) -> Option<&str> {
        self.0.iter().find_map(|a| match a {
            Annotation::Named(name) => Some(name.as_str()),
            Annotation::Marker(_) => None,
        })
    }

    pub fn has<M: Marker>(&self) -> bool {
        let id = MarkerId::of::<M>();
        self.0.iter().any(|a| *a == Annotation::Marker(id))
    }

    /// Non-structural markers in declaration order.
    pub fn qualifier_candidates(&self) -> impl Iterator<Item = MarkerId> + '_ {
        self.0.iter().filter_map(|a| match a {
            Annotation::Marker(id) if !id.is_structural() => Some(*id),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Annotation> for Annotations {
    fn from_iter<I: IntoIterator<Item = Annotation>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Types declared singleton at the interface level with `singleton_type!`.
#[doc(hidden)]
#[linkme::distributed_slice]
pub static SINGLETON_TYPES: [fn() -> TypeKey] = [..];

pub fn is_singleton_type(key: &TypeKey) -> bool {
    SINGLETON_TYPES.iter().any(|entry| entry() == *key)
}

/// Declares every binding of a type singleton, whatever implementation it is bound to.
///
/// ```ignore
/// inject_core::singleton_type!(dyn Clock);
/// ```
#[macro_export]
macro_rules! singleton_type {
    ($ty:ty) => {
        const _: () = {
            fn __singleton_type_key() -> $crate::TypeKey {
                $crate::TypeKey::of::<$ty>()
            }

            #[$crate::__private::linkme::distributed_slice($crate::SINGLETON_TYPES)]
            #[linkme(crate = $crate::__private::linkme)]
            static __SINGLETON_TYPE: fn() -> $crate::TypeKey = __singleton_type_key;
        };
    };
}
