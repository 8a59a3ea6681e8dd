//! Container: registry, singleton cache and the resolution/injection loop.

use std::any::type_name;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, trace};

use crate::binder::Binder;
use crate::bindings::Bindings;
use crate::descriptor::Descriptor;
use crate::injectable::{Injectable, Param, Params};
use crate::instance::{Arg, Instance};
use crate::marker::Marker;
use crate::module::Module;
use crate::queue::{InjectionQueue, Pending};
use crate::registry::{Registry, SingletonCache};
use crate::{passthrough, InjectError};

/// How a constructor is picked when explicit arguments are supplied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorSelection {
    /// First matching constructor in declaration order.
    #[default]
    FirstDeclared,
    /// More than one matching constructor is an error.
    Unambiguous,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerOptions {
    pub constructor_selection: ConstructorSelection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Resolving,
    Injecting,
}

#[derive(Default)]
pub(crate) struct State {
    pub(crate) registry: Registry,
    pub(crate) singletons: SingletonCache,
    queue: InjectionQueue,
    modules: Vec<Arc<dyn Module>>,
}

struct Activity {
    phase: Phase,
    thread: Option<ThreadId>,
}

/// Dependency-injection container.
///
/// Top-level calls are serialised; nested lookups from user code go through
/// the [`Resolver`] handed out by [`Params::resolver`].
pub struct Container {
    state: Mutex<State>,
    activity: Mutex<Activity>,
    options: ContainerOptions,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        Self {
            state: Mutex::new(State::default()),
            activity: Mutex::new(Activity {
                phase: Phase::Idle,
                thread: None,
            }),
            options,
        }
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.lock_activity().phase
    }

    /// Registers a module. Each call wraps `module` in a new `Arc`, so registering the same
    /// value twice configures it twice; only [`Container::register_shared`] with the same `Arc`
    /// is a no-op the second time.
    pub fn register<M: Module + 'static>(&self, module: M) -> Result<(), InjectError> {
        self.register_shared(Arc::new(module))
    }

    pub fn register_shared(&self, module: Arc<dyn Module>) -> Result<(), InjectError> {
        self.ensure_idle()?;
        let name = module.name();
        let mut state = self.lock_state();
        if state.modules.iter().any(|known| same_module(known, &module)) {
            debug!(module = name, "module already registered");
            return Ok(());
        }
        let providers = module.clone().providers()?;
        let state = &mut *state;
        let mut bindings = Bindings::new(&mut state.registry, &mut state.singletons);
        module.configure(&mut bindings)?;
        let provided = providers.len();
        for provider in providers {
            provider.register(&mut bindings);
        }
        state.modules.push(module);
        debug!(
            module = name,
            providers = provided,
            bindings = state.registry.len(),
            "registered module"
        );
        Ok(())
    }

    /// Registers one binder directly, replacing any binding for the same descriptor.
    pub fn register_binding(
        &self,
        descriptor: Descriptor,
        binder: Arc<dyn Binder>,
    ) -> Result<(), InjectError> {
        self.ensure_idle()?;
        let mut state = self.lock_state();
        let state = &mut *state;
        Bindings::new(&mut state.registry, &mut state.singletons).insert(descriptor, binder);
        Ok(())
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, InjectError> {
        self.get_descriptor(Descriptor::of::<T>(), &[])
    }

    pub fn get_with<T: ?Sized + Send + Sync + 'static>(
        &self,
        args: &[Arg],
    ) -> Result<Arc<T>, InjectError> {
        self.get_descriptor(Descriptor::of::<T>(), args)
    }

    pub fn get_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
    ) -> Result<Arc<T>, InjectError> {
        self.get_descriptor(Descriptor::of::<T>().with_name(name), &[])
    }

    pub fn get_qualified<T: ?Sized + Send + Sync + 'static, M: Marker>(
        &self,
    ) -> Result<Arc<T>, InjectError> {
        self.get_descriptor(Descriptor::of::<T>().qualified_by::<M>(), &[])
    }

    pub fn get_descriptor<T: ?Sized + Send + Sync + 'static>(
        &self,
        descriptor: Descriptor,
        args: &[Arg],
    ) -> Result<Arc<T>, InjectError> {
        let instance = self.resolve(&descriptor, args)?;
        instance.downcast::<T>().ok_or_else(|| InjectError::TypeMismatch {
            descriptor: descriptor.to_string(),
            expected: type_name::<T>(),
        })
    }

    /// Resolves `descriptor` and injects every object produced on the way.
    pub fn resolve(&self, descriptor: &Descriptor, args: &[Arg]) -> Result<Instance, InjectError> {
        let _span = debug_span!("resolve", %descriptor).entered();
        self.call(|resolver| resolver.resolve(descriptor, args))
    }

    /// Injects the members of an object the container did not create.
    pub fn inject<T: Injectable>(&self, object: Arc<T>) -> Result<Arc<T>, InjectError> {
        let _span = debug_span!("inject", object = type_name::<T>()).entered();
        self.call(|resolver| {
            resolver.enqueue(object.clone());
            Ok(())
        })?;
        Ok(object)
    }

    pub fn contains(&self, descriptor: &Descriptor) -> Result<bool, InjectError> {
        self.with_state(|state| state.registry.contains(descriptor))
    }

    pub fn binding_count(&self) -> Result<usize, InjectError> {
        self.with_state(|state| state.registry.len())
    }

    pub fn singleton_count(&self) -> Result<usize, InjectError> {
        self.with_state(|state| state.singletons.len())
    }

    /// Read access for inspection. Fails with `ReentrantResolution` from inside a resolution
    /// on this container; user code there holds a [`Resolver`] instead.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&State) -> R) -> Result<R, InjectError> {
        self.ensure_not_reentrant()?;
        Ok(f(&*self.lock_state()))
    }

    /// One top-level call: resolve with `seed`, then drain the injection queue.
    fn call<R>(
        &self,
        seed: impl FnOnce(&mut Resolver<'_>) -> Result<R, InjectError>,
    ) -> Result<R, InjectError> {
        self.ensure_not_reentrant()?;
        let mut state = self.lock_state();
        let _active = self.activate();
        state.queue.clear();
        let result = {
            let mut resolver = Resolver::new(&mut *state, &self.options);
            seed(&mut resolver).and_then(|value| {
                self.lock_activity().phase = Phase::Injecting;
                resolver.drain()?;
                Ok(value)
            })
        };
        state.queue.clear();
        if let Err(err) = &result {
            debug!(error = %err, "resolution failed");
        }
        result
    }

    fn ensure_not_reentrant(&self) -> Result<(), InjectError> {
        let activity = self.lock_activity();
        if activity.phase != Phase::Idle && activity.thread == Some(thread::current().id()) {
            return Err(InjectError::ReentrantResolution);
        }
        Ok(())
    }

    fn ensure_idle(&self) -> Result<(), InjectError> {
        if self.lock_activity().phase != Phase::Idle {
            return Err(InjectError::RegistrationDuringResolution);
        }
        Ok(())
    }

    fn activate(&self) -> ActiveCall<'_> {
        let mut activity = self.lock_activity();
        activity.phase = Phase::Resolving;
        activity.thread = Some(thread::current().id());
        ActiveCall { container: self }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_activity(&self) -> MutexGuard<'_, Activity> {
        self.activity.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn same_module(a: &Arc<dyn Module>, b: &Arc<dyn Module>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Resets the phase when a top-level call ends. Dropped before the state lock is released.
struct ActiveCall<'c> {
    container: &'c Container,
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        let mut activity = self.container.lock_activity();
        activity.phase = Phase::Idle;
        activity.thread = None;
    }
}

/// Resolution context of one top-level call.
pub struct Resolver<'c> {
    state: &'c mut State,
    options: &'c ContainerOptions,
    depth: usize,
    injecting: bool,
}

impl<'c> Resolver<'c> {
    pub(crate) fn new(state: &'c mut State, options: &'c ContainerOptions) -> Self {
        Self {
            state,
            options,
            depth: 0,
            injecting: false,
        }
    }

    pub fn options(&self) -> &ContainerOptions {
        self.options
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<T>, InjectError> {
        self.get_descriptor(Descriptor::of::<T>(), &[])
    }

    pub fn get_with<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        args: &[Arg],
    ) -> Result<Arc<T>, InjectError> {
        self.get_descriptor(Descriptor::of::<T>(), args)
    }

    pub fn get_named<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        name: &str,
    ) -> Result<Arc<T>, InjectError> {
        self.get_descriptor(Descriptor::of::<T>().with_name(name), &[])
    }

    fn get_descriptor<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        descriptor: Descriptor,
        args: &[Arg],
    ) -> Result<Arc<T>, InjectError> {
        let instance = self.resolve(&descriptor, args)?;
        instance.downcast::<T>().ok_or_else(|| InjectError::TypeMismatch {
            descriptor: descriptor.to_string(),
            expected: type_name::<T>(),
        })
    }

    /// Exact registry lookup; a qualifier-set descriptor tries its candidates in order.
    pub fn resolve(&mut self, descriptor: &Descriptor, args: &[Arg]) -> Result<Instance, InjectError> {
        if descriptor.qualifiers().is_some() {
            let found = descriptor
                .candidates()
                .into_iter()
                .find(|candidate| self.state.registry.contains(candidate));
            return match found {
                Some(candidate) => self.resolve(&candidate, args),
                None => Err(InjectError::UnresolvedBinding(descriptor.clone())),
            };
        }

        let binder = self
            .state
            .registry
            .get(descriptor)
            .ok_or_else(|| InjectError::UnresolvedBinding(descriptor.clone()))?;
        trace!(%descriptor, depth = self.depth, "resolving");
        self.depth += 1;
        let result = binder.get(self, descriptor, args);
        self.depth -= 1;
        result
    }

    /// Lookup key for a parameter: the first registered qualifier candidate, else name only.
    fn param_descriptor(&self, param: &Param) -> Descriptor {
        let annotations = param.annotations();
        let mut base = Descriptor::for_key(param.ty());
        if let Some(name) = annotations.name() {
            base = base.with_name(name);
        }
        annotations
            .qualifier_candidates()
            .map(|q| base.clone().with_qualifier(q))
            .find(|candidate| self.state.registry.contains(candidate))
            .unwrap_or(base)
    }

    /// Values for `params`. While members are injected, an object already produced in this
    /// call for the same key is reused, which closes cycles between non-singleton bindings.
    pub(crate) fn resolve_params(
        &mut self,
        params: &[Param],
    ) -> Result<Vec<Option<Instance>>, InjectError> {
        params
            .iter()
            .map(|param| {
                let descriptor = self.param_descriptor(param);
                if self.injecting {
                    if let Some(known) = self.state.queue.find(&descriptor) {
                        trace!(%descriptor, "reusing object of this call");
                        return Ok(Some(known.clone()));
                    }
                }
                trace!(%descriptor, "resolving parameter");
                self.resolve(&descriptor, &[]).map(Some)
            })
            .collect()
    }

    /// Cached singleton: exact key first, then the first instance cached under the same
    /// name and qualifier that matches `pred`.
    pub(crate) fn singleton(
        &self,
        descriptor: &Descriptor,
        pred: impl Fn(&Instance) -> bool,
    ) -> Option<Instance> {
        let cache = &self.state.singletons;
        cache
            .get(descriptor)
            .or_else(|| {
                cache.scan(|key, instance| key.same_qualification(descriptor) && pred(instance))
            })
            .cloned()
    }

    pub(crate) fn cache_singleton(&mut self, descriptor: Descriptor, instance: Instance) {
        trace!(%descriptor, "cached singleton");
        self.state.singletons.insert(descriptor, instance);
    }

    /// Queues `object` for member injection. Returns false if it was already seen in this call.
    pub fn enqueue<T: Injectable>(&mut self, object: Arc<T>) -> bool {
        self.state.queue.push(Pending::external(object))
    }

    /// Queues an object a binder produced for `descriptor`.
    pub(crate) fn enqueue_produced<T: Injectable>(
        &mut self,
        descriptor: &Descriptor,
        instance: &Instance,
        object: Arc<T>,
    ) -> bool {
        let pending = Pending::new(descriptor.clone(), instance.clone(), object);
        self.state.queue.push(pending)
    }

    pub(crate) fn drain(&mut self) -> Result<(), InjectError> {
        self.injecting = true;
        while let Some(pending) = self.state.queue.pop() {
            trace!(object = pending.type_name(), "injecting members");
            pending.run(self)?;
        }
        Ok(())
    }

    pub(crate) fn inject_members<T: Injectable>(&mut self, object: &Arc<T>) -> Result<(), InjectError> {
        for member in T::members() {
            let values = self.resolve_params(member.params())?;
            let mut params = Params::new(self, values);
            member.apply(object, &mut params).map_err(|source| {
                passthrough(source, |source| InjectError::MemberInjection {
                    type_name: type_name::<T>(),
                    member: member.name(),
                    source,
                })
            })?;
        }
        Ok(())
    }
}
