//! Injectable types: constructors, injection points and the parameter cursor.

use std::any::type_name;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::container::Resolver;
use crate::instance::{Arg, Instance};
use crate::marker::{Annotation, Annotations, Marker};
use crate::types::TypeKey;
use crate::{BoxError, InjectError};

/// Declared parameter of a constructor, setter or provider.
#[derive(Clone, Debug)]
pub struct Param {
    ty: TypeKey,
    annotations: Annotations,
}

impl Param {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            ty: TypeKey::of::<T>(),
            annotations: Annotations::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.annotations.push(Annotation::named(name));
        self
    }

    pub fn qualified<M: Marker>(mut self) -> Self {
        self.annotations.push(Annotation::marker::<M>());
        self
    }

    pub fn annotated(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Null fits any non-primitive parameter; a value fits when its type does.
    pub fn accepts(&self, arg: &Arg) -> bool {
        match arg {
            Arg::Null => !self.ty.is_primitive(),
            Arg::Value(instance) => instance.satisfies(&self.ty),
        }
    }
}

pub(crate) fn accepts_all(params: &[Param], args: &[Arg]) -> bool {
    params.len() == args.len() && params.iter().zip(args).all(|(p, a)| p.accepts(a))
}

pub struct Constructor<T> {
    params: Vec<Param>,
    inject: bool,
    build: fn(&mut Params<'_, '_>) -> Result<T, BoxError>,
}

impl<T> Constructor<T> {
    /// Constructor used for explicit arguments or as the zero-argument fallback.
    pub fn new(build: fn(&mut Params<'_, '_>) -> Result<T, BoxError>) -> Self {
        Self {
            params: Vec::new(),
            inject: false,
            build,
        }
    }

    /// Constructor whose parameters are resolved from the container.
    pub fn injected(build: fn(&mut Params<'_, '_>) -> Result<T, BoxError>) -> Self {
        Self {
            params: Vec::new(),
            inject: true,
            build,
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn is_inject(&self) -> bool {
        self.inject
    }

    pub(crate) fn build(&self, params: &mut Params<'_, '_>) -> Result<T, BoxError> {
        (self.build)(params)
    }
}

impl<T> fmt::Debug for Constructor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .field("inject", &self.inject)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Method,
}

/// Field or setter injection point, applied after construction.
pub struct Member<T> {
    name: &'static str,
    kind: MemberKind,
    params: Vec<Param>,
    apply: fn(&T, &mut Params<'_, '_>) -> Result<(), BoxError>,
}

impl<T> Member<T> {
    pub fn field(
        name: &'static str,
        param: Param,
        apply: fn(&T, &mut Params<'_, '_>) -> Result<(), BoxError>,
    ) -> Self {
        Self {
            name,
            kind: MemberKind::Field,
            params: vec![param],
            apply,
        }
    }

    pub fn method(
        name: &'static str,
        apply: fn(&T, &mut Params<'_, '_>) -> Result<(), BoxError>,
    ) -> Self {
        Self {
            name,
            kind: MemberKind::Method,
            params: Vec::new(),
            apply,
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub(crate) fn apply(&self, target: &T, params: &mut Params<'_, '_>) -> Result<(), BoxError> {
        (self.apply)(target, params)
    }
}

/// Type the container can construct and inject.
///
/// Normally generated by `#[derive(Injectable)]`.
pub trait Injectable: Send + Sync + Sized + 'static {
    /// The type itself is declared singleton.
    const SINGLETON: bool = false;

    /// Constructors in declaration order.
    fn constructors() -> Vec<Constructor<Self>>;

    /// Fields and setters, in the order they are injected.
    fn members() -> Vec<Member<Self>> {
        Vec::new()
    }
}

/// Constructors declared on an `#[injectable]` impl block.
pub trait InjectConstructors: Sized {
    fn constructors() -> Vec<Constructor<Self>>;
}

/// Setters declared on an `#[injectable]` impl block.
pub trait InjectMethods: Sized {
    fn methods() -> Vec<Member<Self>>;
}

/// `Self` can be handed out as `V`.
pub trait Implements<V: ?Sized>: Send + Sync + 'static {
    fn upcast(this: Arc<Self>) -> Arc<V>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    fn upcast(this: Arc<Self>) -> Arc<T> {
        this
    }
}

/// Cell filled by member injection after construction.
pub struct Slot<T: ?Sized> {
    value: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> Slot<T> {
    pub const fn new() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    pub fn set(&self, value: Arc<T>) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn get(&self) -> Option<Arc<T>> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_set(&self) -> bool {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: ?Sized> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("type", &type_name::<T>())
            .field("set", &self.is_set())
            .finish()
    }
}

/// Positional cursor over the values handed to a constructor, setter or provider.
pub struct Params<'a, 'r> {
    resolver: &'a mut Resolver<'r>,
    values: Vec<Option<Instance>>,
    position: usize,
}

impl<'a, 'r> Params<'a, 'r> {
    pub(crate) fn new(resolver: &'a mut Resolver<'r>, values: Vec<Option<Instance>>) -> Self {
        Self {
            resolver,
            values,
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Next value; a null argument is an error here.
    pub fn next<T: ?Sized + 'static>(&mut self) -> Result<Arc<T>, InjectError> {
        let position = self.position;
        self.next_opt::<T>()?.ok_or(InjectError::ParameterType {
            position,
            expected: type_name::<T>(),
        })
    }

    /// Next value, `None` for a null argument.
    pub fn next_opt<T: ?Sized + 'static>(&mut self) -> Result<Option<Arc<T>>, InjectError> {
        let position = self.position;
        self.position += 1;
        let mismatch = || InjectError::ParameterType {
            position,
            expected: type_name::<T>(),
        };
        match self.values.get(position) {
            None => Err(mismatch()),
            Some(None) => Ok(None),
            Some(Some(instance)) => instance.downcast::<T>().map(Some).ok_or_else(mismatch),
        }
    }

    /// Next value cloned out of its `Arc`.
    pub fn value<T: Clone + 'static>(&mut self) -> Result<T, InjectError> {
        Ok((*self.next::<T>()?).clone())
    }

    /// Resolver for nested lookups from inside user code.
    pub fn resolver(&mut self) -> &mut Resolver<'r> {
        &mut *self.resolver
    }
}
