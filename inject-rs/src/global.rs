//! Process-wide container built lazily from globally registered modules.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::{Container, InjectError, Injectable, Module};

/// Module registered for the global container.
pub struct ModuleEntry {
    pub name: &'static str,
    pub create: fn() -> Arc<dyn Module>,
}

/// Modules registered at link time with [`register_module!`](crate::register_module).
#[linkme::distributed_slice]
pub static MODULES: [ModuleEntry] = [..];

static RUNTIME_MODULES: Mutex<Vec<ModuleEntry>> = Mutex::new(Vec::new());
static CONTAINER: Mutex<Option<Arc<Container>>> = Mutex::new(None);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Adds a module for the next global container. Takes effect after [`reset`] if the container already exists.
pub fn add_module(name: &'static str, create: fn() -> Arc<dyn Module>) {
    lock(&RUNTIME_MODULES).push(ModuleEntry { name, create });
}

/// Forgets modules added with [`add_module`].
pub fn reset_modules() {
    lock(&RUNTIME_MODULES).clear();
}

/// Drops the global container; the next access builds a fresh one.
pub fn reset() {
    if lock(&CONTAINER).take().is_some() {
        debug!("global container reset");
    }
}

/// The global container, built on first use from link-time and run-time modules.
pub fn container() -> Result<Arc<Container>, InjectError> {
    let mut slot = lock(&CONTAINER);
    if let Some(container) = slot.as_ref() {
        return Ok(container.clone());
    }
    let container = Container::new();
    for entry in MODULES.iter() {
        debug!(module = entry.name, "registering global module");
        container.register_shared((entry.create)())?;
    }
    for entry in lock(&RUNTIME_MODULES).iter() {
        debug!(module = entry.name, "registering runtime module");
        container.register_shared((entry.create)())?;
    }
    let container = Arc::new(container);
    *slot = Some(container.clone());
    Ok(container)
}

pub fn get<T: ?Sized + Send + Sync + 'static>() -> Result<Arc<T>, InjectError> {
    container()?.get::<T>()
}

pub fn get_named<T: ?Sized + Send + Sync + 'static>(name: &str) -> Result<Arc<T>, InjectError> {
    container()?.get_named::<T>(name)
}

pub fn inject<T: Injectable>(object: Arc<T>) -> Result<Arc<T>, InjectError> {
    container()?.inject(object)
}

/// Registers a `Default` module type for the global container.
///
/// ```ignore
/// #[derive(Default)]
/// struct AppModule;
/// inject_rs::register_module!(AppModule);
/// ```
#[macro_export]
macro_rules! register_module {
    ($module:ty) => {
        const _: () = {
            fn __create() -> ::std::sync::Arc<dyn $crate::Module> {
                ::std::sync::Arc::new(<$module as ::std::default::Default>::default())
            }

            #[$crate::__private::linkme::distributed_slice($crate::global::MODULES)]
            #[linkme(crate = $crate::__private::linkme)]
            static __MODULE: $crate::global::ModuleEntry = $crate::global::ModuleEntry {
                name: ::std::stringify!($module),
                create: __create,
            };
        };
    };
}
