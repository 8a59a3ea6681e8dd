//! Deferred member injection queue.

use std::any::type_name;
use std::sync::Arc;

use tracing::trace;

use crate::container::Resolver;
use crate::descriptor::Descriptor;
use crate::injectable::Injectable;
use crate::instance::Instance;
use crate::InjectError;

type Injector = Box<dyn for<'r> FnOnce(&mut Resolver<'r>) -> Result<(), InjectError> + Send>;

/// Object produced in the current call and the key it was produced for.
#[derive(Clone)]
struct Known {
    addr: usize,
    descriptor: Descriptor,
    instance: Instance,
}

impl Known {
    fn answers(&self, descriptor: &Descriptor) -> bool {
        self.descriptor.same_qualification(descriptor) && self.instance.satisfies(&descriptor.ty())
    }
}

/// Object whose members still have to be injected.
pub(crate) struct Pending {
    known: Known,
    type_name: &'static str,
    inject: Injector,
}

impl Pending {
    /// `instance` is what `descriptor` resolved to; `object` is its concrete value.
    pub(crate) fn new<T: Injectable>(descriptor: Descriptor, instance: Instance, object: Arc<T>) -> Self {
        Self {
            known: Known {
                addr: Arc::as_ptr(&object) as usize,
                descriptor,
                instance,
            },
            type_name: type_name::<T>(),
            inject: Box::new(move |resolver: &mut Resolver<'_>| resolver.inject_members(&object)),
        }
    }

    /// Object handed to the container from outside.
    pub(crate) fn external<T: Injectable>(object: Arc<T>) -> Self {
        Self::new(Descriptor::of::<T>(), Instance::new(object.clone()), object)
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn run(self, resolver: &mut Resolver<'_>) -> Result<(), InjectError> {
        (self.inject)(resolver)
    }
}

/// Objects produced during one top-level call. Each object is injected at most once per call.
#[derive(Default)]
pub(crate) struct InjectionQueue {
    pending: Vec<Pending>,
    done: Vec<Known>,
}

impl InjectionQueue {
    fn known(&self) -> impl Iterator<Item = &Known> {
        self.done.iter().chain(self.pending.iter().map(|p| &p.known))
    }

    /// Adds `pending` unless its object was already queued or injected in this call.
    pub(crate) fn push(&mut self, pending: Pending) -> bool {
        if self.known().any(|k| k.addr == pending.known.addr) {
            trace!(object = pending.type_name, "already queued");
            return false;
        }
        trace!(object = pending.type_name, depth = self.pending.len(), "queued");
        self.pending.push(pending);
        true
    }

    /// Most recently queued object first.
    pub(crate) fn pop(&mut self) -> Option<Pending> {
        let pending = self.pending.pop()?;
        self.done.push(pending.known.clone());
        Some(pending)
    }

    /// An object of this call produced for the same name and qualifier as `descriptor`
    /// and usable as its type. Injected objects are preferred over queued ones.
    pub(crate) fn find(&self, descriptor: &Descriptor) -> Option<&Instance> {
        self.known()
            .find(|known| known.answers(descriptor))
            .map(|known| &known.instance)
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
        self.done.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
