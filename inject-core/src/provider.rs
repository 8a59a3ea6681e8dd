//! Provider methods: named producers on a module receiver.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use crate::binder::ProviderBinder;
use crate::bindings::Bindings;
use crate::descriptor::Descriptor;
use crate::injectable::{Param, Params};
use crate::marker::{Annotation, Annotations, Marker};
use crate::{BoxError, InjectError};

/// Producer of `Arc<V>` on receiver `R`.
pub struct Provider<R, V: ?Sized> {
    name: &'static str,
    params: Vec<Param>,
    annotations: Annotations,
    singleton: bool,
    call: fn(&R, &mut Params<'_, '_>) -> Result<Arc<V>, BoxError>,
}

impl<R, V: ?Sized + 'static> Provider<R, V> {
    pub fn new(
        name: &'static str,
        call: fn(&R, &mut Params<'_, '_>) -> Result<Arc<V>, BoxError>,
    ) -> Self {
        Self {
            name,
            params: Vec::new(),
            annotations: Annotations::new(),
            singleton: false,
            call,
        }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    /// Name of the produced binding.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.annotations.push(Annotation::named(name));
        self
    }

    /// Qualifier of the produced binding.
    pub fn qualified<M: Marker>(mut self) -> Self {
        self.annotations.push(Annotation::marker::<M>());
        self
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// Descriptor of the produced binding: `V` plus the provider's name and first qualifier.
    pub fn descriptor(&self) -> Descriptor {
        let mut descriptor = Descriptor::of::<V>();
        if let Some(name) = self.annotations.name() {
            descriptor = descriptor.with_name(name);
        }
        if let Some(q) = self.annotations.qualifier_candidates().next() {
            descriptor = descriptor.with_qualifier(q);
        }
        descriptor
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        &'static str,
        Vec<Param>,
        bool,
        fn(&R, &mut Params<'_, '_>) -> Result<Arc<V>, BoxError>,
    ) {
        (self.name, self.params, self.singleton, self.call)
    }
}

impl<R, V: ?Sized> fmt::Debug for Provider<R, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("receiver", &type_name::<R>())
            .field("name", &self.name)
            .field("returns", &type_name::<V>())
            .field("params", &self.params)
            .finish()
    }
}

/// Provider bound to its receiver, ready to be registered.
pub struct ProviderBinding {
    descriptor: Descriptor,
    binder: ProviderBinder,
}

impl ProviderBinding {
    pub fn new<R, V>(receiver: Arc<R>, provider: Provider<R, V>) -> Result<Self, InjectError>
    where
        R: Send + Sync + 'static,
        V: ?Sized + Send + Sync + 'static,
    {
        let descriptor = provider.descriptor();
        let binder = ProviderBinder::new(receiver, provider)?;
        Ok(Self { descriptor, binder })
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn register(self, bindings: &mut Bindings<'_>) {
        bindings.insert(self.descriptor, Arc::new(self.binder));
    }
}

impl fmt::Debug for ProviderBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderBinding")
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
