//! Binding declarations made by modules.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::binder::{Binder, ConstructBinder, ProviderBinder, ValueBinder};
use crate::descriptor::Descriptor;
use crate::injectable::{Implements, Injectable};
use crate::instance::Instance;
use crate::marker::Marker;
use crate::provider::Provider;
use crate::registry::{Registry, SingletonCache};
use crate::InjectError;

/// Write access to the registry during module registration.
pub struct Bindings<'a> {
    registry: &'a mut Registry,
    singletons: &'a mut SingletonCache,
}

impl<'a> Bindings<'a> {
    pub(crate) fn new(registry: &'a mut Registry, singletons: &'a mut SingletonCache) -> Self {
        Self {
            registry,
            singletons,
        }
    }

    /// Starts a binding for `T`:
    ///
    /// ```ignore
    /// bindings.bind::<dyn Greeter>().as_singleton().to_type::<EnglishGreeter>();
    /// ```
    pub fn bind<T: ?Sized + Send + Sync + 'static>(&mut self) -> BindingBuilder<'_, 'a, T> {
        BindingBuilder {
            bindings: self,
            descriptor: Descriptor::of::<T>(),
            singleton: false,
            _type: PhantomData,
        }
    }

    /// Stores `binder` under `descriptor` and evicts a cached singleton for the same key.
    pub fn insert(&mut self, descriptor: Descriptor, binder: Arc<dyn Binder>) {
        if self.singletons.remove(&descriptor).is_some() {
            debug!(%descriptor, "evicted cached singleton");
        }
        let kind = binder.kind();
        if self.registry.insert(descriptor.clone(), binder).is_some() {
            debug!(%descriptor, ?kind, "replaced binding");
        } else {
            debug!(%descriptor, ?kind, "bound");
        }
    }

    pub fn contains(&self, descriptor: &Descriptor) -> bool {
        self.registry.contains(descriptor)
    }
}

pub struct BindingBuilder<'b, 'a, T: ?Sized> {
    bindings: &'b mut Bindings<'a>,
    descriptor: Descriptor,
    singleton: bool,
    _type: PhantomData<fn() -> Arc<T>>,
}

impl<'b, 'a, T: ?Sized + Send + Sync + 'static> BindingBuilder<'b, 'a, T> {
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_name(name);
        self
    }

    pub fn qualified_by<M: Marker>(mut self) -> Self {
        self.descriptor = self.descriptor.qualified_by::<M>();
        self
    }

    pub fn as_singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Always hands out `value`.
    pub fn to_instance(self, value: Arc<T>) {
        let binder = ValueBinder::new(Instance::shared(value));
        self.bindings.insert(self.descriptor, Arc::new(binder));
    }

    /// Always hands out `value`, keeping its concrete type.
    pub fn to_value(self, value: T)
    where
        T: Sized,
    {
        let binder = ValueBinder::new(Instance::from_value(value));
        self.bindings.insert(self.descriptor, Arc::new(binder));
    }

    /// Constructs `I` on demand and hands it out as `T`.
    pub fn to_type<I: Injectable + Implements<T>>(self) {
        let binder = ConstructBinder::<I, T>::new(self.singleton);
        self.bindings.insert(self.descriptor, Arc::new(binder));
    }

    /// Calls `provider` on `receiver`. The provider's own name and qualifier are ignored here.
    pub fn to_provider<R: Send + Sync + 'static>(
        self,
        receiver: Arc<R>,
        provider: Provider<R, T>,
    ) -> Result<(), InjectError> {
        let mut binder = ProviderBinder::new(receiver, provider)?;
        if self.singleton {
            binder = binder.singleton();
        }
        self.bindings.insert(self.descriptor, Arc::new(binder));
        Ok(())
    }
}
