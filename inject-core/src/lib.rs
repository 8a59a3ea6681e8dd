//! Inject core: descriptors, binders, registry, resolution and member injection.

pub mod binder;
pub mod bindings;
pub mod container;
pub mod descriptor;
pub mod injectable;
pub mod instance;
pub mod manifest;
pub mod marker;
pub mod module;
pub mod provider;
mod queue;
pub mod registry;
pub mod types;

pub use binder::{Binder, BinderKind, ConstructBinder, ProviderBinder, ValueBinder};
pub use bindings::{BindingBuilder, Bindings};
pub use container::{ConstructorSelection, Container, ContainerOptions, Phase, Resolver};
pub use descriptor::Descriptor;
pub use injectable::{
    Constructor, Implements, InjectConstructors, InjectMethods, Injectable, Member, MemberKind,
    Param, Params, Slot,
};
pub use instance::{Arg, Instance};
pub use manifest::BindingInfo;
pub use marker::{
    is_singleton_type, Annotation, Annotations, Inject, Marker, MarkerId, NotNull, Nullable,
    Singleton, SINGLETON_TYPES,
};
pub use module::Module;
pub use provider::{Provider, ProviderBinding};
pub use registry::{Registry, SingletonCache};
pub use types::{Form, TypeKey};

#[doc(hidden)]
pub mod __private {
    pub use linkme;
}

use thiserror::Error;

/// Error returned by user constructors, setters and providers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum InjectError {
    #[error("no binder for {0}")]
    UnresolvedBinding(Descriptor),
    #[error("no suitable constructor found to instantiate {0}")]
    NoSuitableConstructor(&'static str),
    #[error("more than one constructor of {type_name} accepts the supplied arguments")]
    AmbiguousConstructor { type_name: &'static str },
    #[error("failed to instantiate {type_name}")]
    InstantiationFailure {
        type_name: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("failed to inject member {member} of {type_name}")]
    MemberInjection {
        type_name: &'static str,
        member: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("provider {provider} of {receiver} has different parameters than supplied")]
    ProviderArgumentMismatch {
        provider: &'static str,
        receiver: &'static str,
    },
    #[error("provider {provider} of {receiver} returns no value")]
    ProviderMustReturnValue {
        provider: &'static str,
        receiver: &'static str,
    },
    #[error("descriptor for {0} cannot carry both a qualifier and a qualifier set")]
    InvalidDescriptor(String),
    #[error("descriptor {0} is already used as a key")]
    DescriptorFrozen(String),
    #[error("parameter {position} is not a {expected}")]
    ParameterType {
        position: usize,
        expected: &'static str,
    },
    #[error("binding {descriptor} produced a value that is not a {expected}")]
    TypeMismatch {
        descriptor: String,
        expected: &'static str,
    },
    #[error("container is already resolving on this thread; use the resolver handed to the constructor")]
    ReentrantResolution,
    #[error("cannot register bindings while a resolution is in progress")]
    RegistrationDuringResolution,
}

/// Engine errors raised inside user code come back unchanged; anything else is wrapped.
pub(crate) fn passthrough(source: BoxError, wrap: impl FnOnce(BoxError) -> InjectError) -> InjectError {
    match source.downcast::<InjectError>() {
        Ok(inner) => *inner,
        Err(source) => wrap(source),
    }
}
