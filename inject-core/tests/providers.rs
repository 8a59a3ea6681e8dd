//! Provider methods: injected and explicit parameters, singletons and validation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use inject_core::{
    Arg, BinderKind, Bindings, Constructor, Container, Descriptor, InjectError, Injectable,
    Module, Param, Provider, ProviderBinding,
};

fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn failure<T: ?Sized>(result: Result<Arc<T>, InjectError>) -> InjectError {
    match result {
        Ok(_) => panic!("expected an error"),
        Err(err) => err,
    }
}

struct Session {
    id: usize,
}

struct MathModule {
    factor: i32,
    sessions: AtomicUsize,
}

impl MathModule {
    fn new(factor: i32) -> Self {
        Self {
            factor,
            sessions: AtomicUsize::new(0),
        }
    }
}

impl Module for MathModule {
    fn configure(&self, bindings: &mut Bindings<'_>) -> Result<(), InjectError> {
        bindings.bind::<i32>().named("opB").to_value(2);
        bindings.bind::<Box<i32>>().named("opC").to_value(Box::new(3));
        bindings.bind::<String>().named("name").to_value("World".to_string());
        Ok(())
    }

    fn providers(self: Arc<Self>) -> Result<Vec<ProviderBinding>, InjectError> {
        Ok(vec![
            ProviderBinding::new(
                self.clone(),
                Provider::<Self, i32>::new("op_a", |_, _| Ok(Arc::new(1))).named("opA"),
            )?,
            ProviderBinding::new(
                self.clone(),
                Provider::<Self, i32>::new("product", |this, p| {
                    let a = p.value::<i32>()?;
                    let b = p.value::<i32>()?;
                    Ok(Arc::new(a * b * this.factor))
                })
                .param(Param::of::<i32>())
                .param(Param::of::<i32>())
                .named("product"),
            )?,
            ProviderBinding::new(
                self.clone(),
                Provider::<Self, i32>::new("sum", |_, p| {
                    Ok(Arc::new(p.value::<i32>()? + p.value::<i32>()? + p.value::<i32>()?))
                })
                .param(Param::of::<i32>().named("opA"))
                .param(Param::of::<i32>().named("opB"))
                .param(Param::of::<Box<i32>>().named("opC"))
                .named("sum"),
            )?,
            ProviderBinding::new(
                self.clone(),
                Provider::<Self, String>::new("greeting", |_, p| {
                    let name = p.next::<String>()?;
                    Ok(Arc::new(format!("Hello {name}!")))
                })
                .param(Param::of::<String>().named("name")),
            )?,
            ProviderBinding::new(
                self.clone(),
                Provider::<Self, Session>::new("session", |this, _| {
                    let id = this.sessions.fetch_add(1, Ordering::SeqCst);
                    Ok(Arc::new(Session { id }))
                })
                .singleton(),
            )?,
        ])
    }
}

fn math() -> Container {
    let container = Container::new();
    container.register(MathModule::new(1)).unwrap();
    container
}

#[test]
fn provider_without_parameters() {
    let container = math();
    assert_eq!(*container.get_named::<i32>("opA").unwrap(), 1);
}

#[test]
fn provider_parameters_are_injected_by_name() {
    let container = math();
    assert_eq!(*container.get_named::<i32>("sum").unwrap(), 6);
    assert_eq!(*container.get::<String>().unwrap(), "Hello World!");
}

#[test]
fn provider_with_explicit_arguments() {
    let container = math();
    let product = Descriptor::of::<i32>().with_name("product");
    let value = container
        .get_descriptor::<i32>(product.clone(), &[Arg::of(2i32), Arg::of(3i32)])
        .unwrap();
    assert_eq!(*value, 6);

    let err = container
        .get_descriptor::<i32>(product, &[Arg::of("two".to_string()), Arg::of(3i32)])
        .unwrap_err();
    match err {
        InjectError::ProviderArgumentMismatch { provider, .. } => assert_eq!(provider, "product"),
        other => panic!("expected ProviderArgumentMismatch, got {other:?}"),
    }
}

#[test]
fn singleton_provider_is_called_once() {
    let container = math();
    let a = container.get::<Session>().unwrap();
    let b = container.get::<Session>().unwrap();
    assert!(same(&a, &b));
    assert_eq!(a.id, 0);
}

#[test]
fn provider_bindings_show_in_the_manifest() {
    let container = math();
    let sum = container
        .bindings()
        .unwrap()
        .into_iter()
        .find(|b| b.name.as_deref() == Some("sum"))
        .unwrap();
    assert_eq!(sum.kind, BinderKind::Provider);
    assert!(sum.target.ends_with("MathModule::sum"));
    assert!(!sum.singleton);
}

struct Silent;

impl Module for Silent {
    fn providers(self: Arc<Self>) -> Result<Vec<ProviderBinding>, InjectError> {
        Ok(vec![ProviderBinding::new(
            self,
            Provider::<Self, ()>::new("nothing", |_, _| Ok(Arc::new(()))),
        )?])
    }
}

#[test]
fn provider_must_return_a_value() {
    let container = Container::new();
    match container.register(Silent).unwrap_err() {
        InjectError::ProviderMustReturnValue { provider, receiver } => {
            assert_eq!(provider, "nothing");
            assert!(receiver.ends_with("Silent"));
        }
        other => panic!("expected ProviderMustReturnValue, got {other:?}"),
    }
    assert_eq!(container.binding_count().unwrap(), 0);
}

struct Failing;

impl Module for Failing {
    fn providers(self: Arc<Self>) -> Result<Vec<ProviderBinding>, InjectError> {
        Ok(vec![ProviderBinding::new(
            self,
            Provider::<Self, String>::new("broken", |_, _| Err("no config".into())),
        )?])
    }
}

#[test]
fn provider_failure_is_an_instantiation_failure() {
    let container = Container::new();
    container.register(Failing).unwrap();
    match failure(container.get::<String>()) {
        InjectError::InstantiationFailure { type_name, source } => {
            assert_eq!(type_name, "alloc::string::String");
            assert_eq!(source.to_string(), "no config");
        }
        other => panic!("expected InstantiationFailure, got {other:?}"),
    }
}

struct Motd(String);

struct Report {
    motd: Arc<String>,
}

impl Injectable for Report {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::injected(|p| {
            Ok(Report {
                motd: p.next::<String>()?,
            })
        })
        .param(Param::of::<String>().named("motd"))]
    }
}

#[test]
fn builder_binds_a_provider_under_its_own_key() {
    let container = Container::new();
    container
        .register(|bindings: &mut Bindings<'_>| -> Result<(), InjectError> {
            bindings
                .bind::<String>()
                .named("motd")
                .as_singleton()
                .to_provider(
                    Arc::new(Motd("maintenance at noon".to_string())),
                    Provider::<Motd, String>::new("motd", |this, _| Ok(Arc::new(this.0.clone()))),
                )?;
            bindings.bind::<Report>().to_type::<Report>();
            Ok(())
        })
        .unwrap();

    let report = container.get::<Report>().unwrap();
    assert_eq!(*report.motd, "maintenance at noon");
    assert!(same(&report.motd, &container.get_named::<String>("motd").unwrap()));
}

#[test]
fn named_singleton_providers_keep_their_own_values() {
    let container = Container::new();
    container
        .register(|bindings: &mut Bindings<'_>| -> Result<(), InjectError> {
            let motd = Arc::new(Motd("maintenance at noon".to_string()));
            bindings.bind::<String>().named("motd").as_singleton().to_provider(
                motd.clone(),
                Provider::<Motd, String>::new("motd", |this, _| Ok(Arc::new(this.0.clone()))),
            )?;
            bindings.bind::<String>().named("banner").as_singleton().to_provider(
                motd,
                Provider::<Motd, String>::new("banner", |this, _| {
                    Ok(Arc::new(this.0.to_uppercase()))
                }),
            )?;
            Ok(())
        })
        .unwrap();

    assert_eq!(*container.get_named::<String>("motd").unwrap(), "maintenance at noon");
    assert_eq!(*container.get_named::<String>("banner").unwrap(), "MAINTENANCE AT NOON");
    assert_eq!(container.singleton_count().unwrap(), 2);
}
