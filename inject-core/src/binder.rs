//! Binders: the strategies that produce an instance for a descriptor.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::container::{ConstructorSelection, Resolver};
use crate::descriptor::Descriptor;
use crate::injectable::{accepts_all, Implements, Injectable, Param, Params};
use crate::instance::{Arg, Instance};
use crate::marker::is_singleton_type;
use crate::provider::Provider;
use crate::types::TypeKey;
use crate::{passthrough, BoxError, InjectError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinderKind {
    Value,
    Construct,
    Provider,
}

pub trait Binder: Send + Sync {
    /// Produces the instance for `descriptor`. `args` are explicit arguments, possibly empty.
    fn get(
        &self,
        resolver: &mut Resolver<'_>,
        descriptor: &Descriptor,
        args: &[Arg],
    ) -> Result<Instance, InjectError>;

    fn kind(&self) -> BinderKind;

    /// What the binder produces from (implementation type, provider or value type).
    fn target(&self) -> String;

    fn is_singleton(&self) -> bool;
}

/// Hands out one fixed instance.
pub struct ValueBinder {
    instance: Instance,
}

impl ValueBinder {
    pub fn new(instance: Instance) -> Self {
        Self { instance }
    }
}

impl Binder for ValueBinder {
    fn get(&self, _: &mut Resolver<'_>, _: &Descriptor, _: &[Arg]) -> Result<Instance, InjectError> {
        Ok(self.instance.clone())
    }

    fn kind(&self) -> BinderKind {
        BinderKind::Value
    }

    fn target(&self) -> String {
        self.instance.type_name().to_string()
    }

    fn is_singleton(&self) -> bool {
        true
    }
}

/// Constructs `I` and hands it out as `V`.
pub struct ConstructBinder<I, V: ?Sized> {
    singleton: bool,
    _types: PhantomData<fn() -> (Arc<I>, Arc<V>)>,
}

impl<I, V> ConstructBinder<I, V>
where
    I: Injectable + Implements<V>,
    V: ?Sized + Send + Sync + 'static,
{
    /// Singleton when forced, when `I` is declared singleton, or when either type is listed with `singleton_type!`.
    pub fn new(singleton: bool) -> Self {
        let singleton = singleton
            || I::SINGLETON
            || is_singleton_type(&TypeKey::of::<V>())
            || is_singleton_type(&TypeKey::of::<I>());
        Self {
            singleton,
            _types: PhantomData,
        }
    }

    fn cached(&self, resolver: &Resolver<'_>, descriptor: &Descriptor) -> Option<Instance> {
        let view = TypeKey::of::<V>();
        let concrete = TypeKey::of::<I>();
        let found = resolver.singleton(descriptor, |instance| {
            instance.satisfies(&view) || instance.satisfies(&concrete)
        })?;
        if found.satisfies(&view) {
            return Some(found);
        }
        let object = found.downcast::<I>()?;
        Some(Instance::upcast(object.clone(), I::upcast(object)))
    }
}

impl<I, V> Binder for ConstructBinder<I, V>
where
    I: Injectable + Implements<V>,
    V: ?Sized + Send + Sync + 'static,
{
    fn get(
        &self,
        resolver: &mut Resolver<'_>,
        descriptor: &Descriptor,
        args: &[Arg],
    ) -> Result<Instance, InjectError> {
        if self.singleton {
            if let Some(instance) = self.cached(resolver, descriptor) {
                debug!(%descriptor, "singleton cache hit");
                return Ok(instance);
            }
        }

        let object = Arc::new(construct::<I>(resolver, args)?);
        debug!(%descriptor, implementation = type_name::<I>(), "constructed");
        let instance = Instance::upcast(object.clone(), I::upcast(object.clone()));
        if self.singleton {
            resolver.cache_singleton(descriptor.clone(), instance.clone());
        }
        resolver.enqueue_produced(descriptor, &instance, object);
        Ok(instance)
    }

    fn kind(&self) -> BinderKind {
        BinderKind::Construct
    }

    fn target(&self) -> String {
        type_name::<I>().to_string()
    }

    fn is_singleton(&self) -> bool {
        self.singleton
    }
}

/// Picks a constructor of `I` and runs it.
fn construct<I: Injectable>(resolver: &mut Resolver<'_>, args: &[Arg]) -> Result<I, InjectError> {
    let type_name = type_name::<I>();
    let constructors = I::constructors();

    let (constructor, values) = if !args.is_empty() {
        let mut matching = constructors
            .iter()
            .filter(|c| accepts_all(c.params(), args));
        let first = matching
            .next()
            .ok_or(InjectError::NoSuitableConstructor(type_name))?;
        if resolver.options().constructor_selection == ConstructorSelection::Unambiguous
            && matching.next().is_some()
        {
            return Err(InjectError::AmbiguousConstructor { type_name });
        }
        (first, args.iter().map(|a| a.instance().cloned()).collect())
    } else if let Some(injected) = constructors.iter().find(|c| c.is_inject()) {
        (injected, resolver.resolve_params(injected.params())?)
    } else {
        let default = constructors
            .iter()
            .find(|c| c.params().is_empty())
            .ok_or(InjectError::NoSuitableConstructor(type_name))?;
        (default, Vec::new())
    };

    let mut params = Params::new(resolver, values);
    constructor.build(&mut params).map_err(|source| {
        passthrough(source, |source| InjectError::InstantiationFailure { type_name, source })
    })
}

type Call = Box<dyn Fn(&mut Params<'_, '_>) -> Result<Instance, BoxError> + Send + Sync>;

/// Calls a provider method on its receiver.
pub struct ProviderBinder {
    name: &'static str,
    receiver: &'static str,
    returns: TypeKey,
    params: Vec<Param>,
    singleton: bool,
    call: Call,
}

impl ProviderBinder {
    pub fn new<R, V>(receiver: Arc<R>, provider: Provider<R, V>) -> Result<Self, InjectError>
    where
        R: Send + Sync + 'static,
        V: ?Sized + Send + Sync + 'static,
    {
        let (name, params, singleton, call) = provider.into_parts();
        let returns = TypeKey::of::<V>();
        if returns.is::<()>() {
            return Err(InjectError::ProviderMustReturnValue {
                provider: name,
                receiver: type_name::<R>(),
            });
        }
        Ok(Self {
            name,
            receiver: type_name::<R>(),
            returns,
            params,
            singleton,
            call: Box::new(move |params: &mut Params<'_, '_>| {
                call(&*receiver, params).map(Instance::shared)
            }),
        })
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Binder for ProviderBinder {
    fn get(
        &self,
        resolver: &mut Resolver<'_>,
        descriptor: &Descriptor,
        args: &[Arg],
    ) -> Result<Instance, InjectError> {
        if self.singleton {
            if let Some(instance) = resolver.singleton(descriptor, |i| i.satisfies(&self.returns)) {
                debug!(%descriptor, provider = self.name, "singleton cache hit");
                return Ok(instance);
            }
        }

        let values = if args.is_empty() {
            resolver.resolve_params(&self.params)?
        } else if accepts_all(&self.params, args) {
            args.iter().map(|a| a.instance().cloned()).collect()
        } else {
            return Err(InjectError::ProviderArgumentMismatch {
                provider: self.name,
                receiver: self.receiver,
            });
        };

        let instance = {
            let mut params = Params::new(resolver, values);
            (self.call)(&mut params).map_err(|source| {
                passthrough(source, |source| InjectError::InstantiationFailure {
                    type_name: self.returns.name(),
                    source,
                })
            })?
        };
        debug!(%descriptor, provider = self.name, "provided");
        if self.singleton {
            resolver.cache_singleton(descriptor.clone(), instance.clone());
        }
        Ok(instance)
    }

    fn kind(&self) -> BinderKind {
        BinderKind::Provider
    }

    fn target(&self) -> String {
        format!("{}::{}", self.receiver, self.name)
    }

    fn is_singleton(&self) -> bool {
        self.singleton
    }
}
