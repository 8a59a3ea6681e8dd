//! Member injection: cycles, qualifiers, setters, external objects and failures.

use std::error::Error as _;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use inject_core::{
    Bindings, Constructor, Container, Descriptor, Implements, InjectError, Injectable, Marker,
    Member, Module, Param, Phase, Slot,
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

trait Greeter: Send + Sync {
    fn user_name(&self) -> String;
    fn greet(&self) -> String;
    fn user(&self) -> Option<Arc<dyn User>>;
}

trait User: Send + Sync {
    fn user_name(&self) -> String;
    fn greeter(&self) -> Option<Arc<dyn Greeter>>;
}

#[derive(Default)]
struct CircularGreeter {
    user: Slot<dyn User>,
    user_name: Slot<String>,
}

impl Greeter for CircularGreeter {
    fn user_name(&self) -> String {
        self.user_name.get().map(|n| (*n).clone()).unwrap_or_default()
    }

    fn greet(&self) -> String {
        let name = self.user.get().map(|u| u.user_name()).unwrap_or_default();
        format!("Hello {name}!")
    }

    fn user(&self) -> Option<Arc<dyn User>> {
        self.user.get()
    }
}

impl Injectable for CircularGreeter {
    const SINGLETON: bool = true;

    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(CircularGreeter::default()))]
    }

    fn members() -> Vec<Member<Self>> {
        vec![
            Member::<Self>::field("user", Param::of::<dyn User>(), |this, p| {
                this.user.set(p.next::<dyn User>()?);
                Ok(())
            }),
            Member::<Self>::field("user_name", Param::of::<String>(), |this, p| {
                this.user_name.set(p.next::<String>()?);
                Ok(())
            }),
        ]
    }
}

impl Implements<dyn Greeter> for CircularGreeter {
    fn upcast(this: Arc<Self>) -> Arc<dyn Greeter> {
        this
    }
}

#[derive(Default)]
struct CircularUser {
    greeter: Slot<dyn Greeter>,
}

impl User for CircularUser {
    fn user_name(&self) -> String {
        self.greeter.get().map(|g| g.user_name()).unwrap_or_default()
    }

    fn greeter(&self) -> Option<Arc<dyn Greeter>> {
        self.greeter.get()
    }
}

impl Injectable for CircularUser {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(CircularUser::default()))]
    }

    fn members() -> Vec<Member<Self>> {
        vec![Member::<Self>::field("greeter", Param::of::<dyn Greeter>(), |this, p| {
            this.greeter.set(p.next::<dyn Greeter>()?);
            Ok(())
        })]
    }
}

impl Implements<dyn User> for CircularUser {
    fn upcast(this: Arc<Self>) -> Arc<dyn User> {
        this
    }
}

struct CircularModule;

impl Module for CircularModule {
    fn configure(&self, bindings: &mut Bindings<'_>) -> Result<(), InjectError> {
        bindings.bind::<String>().to_value("World".to_string());
        bindings.bind::<dyn Greeter>().to_type::<CircularGreeter>();
        bindings.bind::<dyn User>().to_type::<CircularUser>();
        Ok(())
    }
}

#[test]
fn circular_dependency_through_members() {
    let container = Container::new();
    container.register(CircularModule).unwrap();

    let greeter = container.get::<dyn Greeter>().unwrap();
    assert_eq!(greeter.greet(), "Hello World!");

    let user = greeter.user().unwrap();
    let back = user.greeter().unwrap();
    assert!(same(&greeter, &back));
}

#[test]
fn cycle_resolved_from_the_other_end() {
    let container = Container::new();
    container.register(CircularModule).unwrap();

    let user = container.get::<dyn User>().unwrap();
    assert_eq!(user.user_name(), "World");
    let greeter = user.greeter().unwrap();
    assert!(same(&greeter, &container.get::<dyn Greeter>().unwrap()));
    assert_eq!(greeter.greet(), "Hello World!");
}

static LEFT_BUILT: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct Left {
    right: Slot<Right>,
}

impl Injectable for Left {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| {
            LEFT_BUILT.fetch_add(1, Ordering::SeqCst);
            Ok(Left::default())
        })]
    }

    fn members() -> Vec<Member<Self>> {
        vec![Member::<Self>::field("right", Param::of::<Right>(), |this, p| {
            this.right.set(p.next::<Right>()?);
            Ok(())
        })]
    }
}

#[derive(Default)]
struct Right {
    left: Slot<Left>,
}

impl Injectable for Right {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(Right::default()))]
    }

    fn members() -> Vec<Member<Self>> {
        vec![Member::<Self>::field("left", Param::of::<Left>(), |this, p| {
            this.left.set(p.next::<Left>()?);
            Ok(())
        })]
    }
}

#[test]
fn cycle_between_non_singletons_reuses_objects_of_the_call() {
    let container = Container::new();
    container
        .register(|bindings: &mut Bindings<'_>| -> Result<(), InjectError> {
            bindings.bind::<Left>().to_type::<Left>();
            bindings.bind::<Right>().to_type::<Right>();
            Ok(())
        })
        .unwrap();

    let left = container.get::<Left>().unwrap();
    let right = left.right.get().unwrap();
    assert!(same(&right.left.get().unwrap(), &left));
    assert_eq!(LEFT_BUILT.load(Ordering::SeqCst), 1);

    let again = container.get::<Left>().unwrap();
    assert!(!same(&again, &left));
    assert!(!same(&again.right.get().unwrap(), &right));
    assert!(same(&again.right.get().unwrap().left.get().unwrap(), &again));
    assert_eq!(LEFT_BUILT.load(Ordering::SeqCst), 2);
}

#[derive(Default)]
struct Pair {
    first: Slot<dyn User>,
    second: Slot<dyn User>,
}

struct Named(&'static str);

impl User for Named {
    fn user_name(&self) -> String {
        self.0.to_string()
    }

    fn greeter(&self) -> Option<Arc<dyn Greeter>> {
        None
    }
}

impl Injectable for Pair {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(Pair::default()))]
    }

    fn members() -> Vec<Member<Self>> {
        vec![
            Member::<Self>::field("first", Param::of::<dyn User>().named("first"), |this, p| {
                this.first.set(p.next::<dyn User>()?);
                Ok(())
            }),
            Member::<Self>::field("second", Param::of::<dyn User>().named("second"), |this, p| {
                this.second.set(p.next::<dyn User>()?);
                Ok(())
            }),
        ]
    }
}

#[test]
fn reused_objects_respect_names() {
    let container = Container::new();
    container
        .register(|bindings: &mut Bindings<'_>| -> Result<(), InjectError> {
            bindings.bind::<Pair>().to_type::<Pair>();
            bindings.bind::<dyn User>().named("first").to_type::<CircularUser>();
            bindings
                .bind::<dyn User>()
                .named("second")
                .to_instance(Arc::new(Named("second")));
            bindings.bind::<dyn Greeter>().to_type::<CircularGreeter>();
            bindings.bind::<dyn User>().to_type::<CircularUser>();
            bindings.bind::<String>().to_value("World".to_string());
            Ok(())
        })
        .unwrap();

    let pair = container.get::<Pair>().unwrap();
    assert_eq!(pair.second.get().unwrap().user_name(), "second");
    let first = pair.first.get().unwrap();
    assert!(!same(&first, &pair.second.get().unwrap()));
    assert_eq!(first.user_name(), "World");
}

struct UserName;
struct Greeting;
struct Farewell;
impl Marker for UserName {}
impl Marker for Greeting {}
impl Marker for Farewell {}

#[derive(Default)]
struct QualifiedGreeter {
    greeting: Slot<String>,
    name: Slot<String>,
    punctuation: Slot<String>,
}

impl QualifiedGreeter {
    fn greet(&self) -> String {
        let get = |slot: &Slot<String>| slot.get().map(|s| (*s).clone()).unwrap_or_default();
        format!(
            "{} {}{}",
            get(&self.greeting),
            get(&self.name),
            get(&self.punctuation)
        )
    }
}

impl Injectable for QualifiedGreeter {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(QualifiedGreeter::default()))]
    }

    fn members() -> Vec<Member<Self>> {
        vec![
            Member::<Self>::field(
                "greeting",
                Param::of::<String>().qualified::<Farewell>().qualified::<Greeting>(),
                |this, p| {
                    this.greeting.set(p.next::<String>()?);
                    Ok(())
                },
            ),
            Member::<Self>::method("set_name_and_mark", |this, p| {
                this.name.set(p.next::<String>()?);
                this.punctuation.set(p.next::<String>()?);
                Ok(())
            })
            .param(Param::of::<String>().qualified::<UserName>())
            .param(Param::of::<String>().named("mark").qualified::<Farewell>()),
        ]
    }
}

#[test]
fn qualifiers_pick_bindings_and_fall_back_to_name() {
    let container = Container::new();
    container
        .register(|bindings: &mut Bindings<'_>| -> Result<(), InjectError> {
            bindings
                .bind::<String>()
                .qualified_by::<Greeting>()
                .to_value("Hello".to_string());
            bindings
                .bind::<String>()
                .qualified_by::<UserName>()
                .to_value("World".to_string());
            bindings.bind::<String>().named("mark").to_value("!".to_string());
            bindings.bind::<QualifiedGreeter>().to_type::<QualifiedGreeter>();
            Ok(())
        })
        .unwrap();

    let greeter = container.get::<QualifiedGreeter>().unwrap();
    assert_eq!(greeter.greet(), "Hello World!");
}

#[test]
fn qualifier_set_descriptor_tries_each_candidate() {
    let container = Container::new();
    container
        .register(|bindings: &mut Bindings<'_>| -> Result<(), InjectError> {
            bindings
                .bind::<String>()
                .qualified_by::<UserName>()
                .to_value("World".to_string());
            bindings.bind::<String>().to_value("anyone".to_string());
            Ok(())
        })
        .unwrap();

    let lookup = |qualifiers| {
        let descriptor = Descriptor::of::<String>().with_qualifiers(qualifiers);
        container.get_descriptor::<String>(descriptor, &[]).unwrap()
    };
    let greeting = inject_core::MarkerId::of::<Greeting>();
    let user = inject_core::MarkerId::of::<UserName>();
    assert_eq!(*lookup(vec![greeting, user]), "World");
    assert_eq!(*lookup(vec![greeting]), "anyone");
}

static APPLIED: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct Audited {
    peer: Slot<Audited>,
}

impl Injectable for Audited {
    const SINGLETON: bool = true;

    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(Audited::default()))]
    }

    fn members() -> Vec<Member<Self>> {
        vec![Member::<Self>::field("peer", Param::of::<Audited>(), |this, p| {
            APPLIED.fetch_add(1, Ordering::SeqCst);
            this.peer.set(p.next::<Audited>()?);
            Ok(())
        })]
    }
}

#[test]
fn each_object_is_injected_once_per_call() {
    let container = Container::new();
    container
        .register(|bindings: &mut Bindings<'_>| -> Result<(), InjectError> {
            bindings.bind::<Audited>().to_type::<Audited>();
            Ok(())
        })
        .unwrap();

    let audited = container.get::<Audited>().unwrap();
    assert_eq!(APPLIED.load(Ordering::SeqCst), 1);
    assert!(same(&audited.peer.get().unwrap(), &audited));
}

#[derive(Default)]
struct Plugin {
    clock: Slot<String>,
}

impl Injectable for Plugin {
    fn constructors() -> Vec<Constructor<Self>> {
        Vec::new()
    }

    fn members() -> Vec<Member<Self>> {
        vec![Member::<Self>::field("clock", Param::of::<String>().named("clock"), |this, p| {
            this.clock.set(p.next::<String>()?);
            Ok(())
        })]
    }
}

#[test]
fn external_object_gets_its_members_injected() {
    let container = Container::new();
    container
        .register(|bindings: &mut Bindings<'_>| -> Result<(), InjectError> {
            bindings.bind::<String>().named("clock").to_value("utc".to_string());
            Ok(())
        })
        .unwrap();

    let plugin = Arc::new(Plugin::default());
    let same_plugin = container.inject(plugin.clone()).unwrap();
    assert!(same(&plugin, &same_plugin));
    assert_eq!(*plugin.clock.get().unwrap(), "utc");
}

#[derive(Default)]
struct Fragile {
    dependency: Slot<String>,
}

impl Injectable for Fragile {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(Fragile::default()))]
    }

    fn members() -> Vec<Member<Self>> {
        vec![
            Member::<Self>::method("check", |_, _| {
                Err(io::Error::new(io::ErrorKind::InvalidData, "bad wiring").into())
            }),
            Member::<Self>::field("dependency", Param::of::<String>(), |this, p| {
                this.dependency.set(p.next::<String>()?);
                Ok(())
            }),
        ]
    }
}

#[derive(Default)]
struct Dangling {
    missing: Slot<String>,
}

impl Injectable for Dangling {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(Dangling::default()))]
    }

    fn members() -> Vec<Member<Self>> {
        vec![Member::<Self>::field("missing", Param::of::<String>().named("missing"), |this, p| {
            this.missing.set(p.next::<String>()?);
            Ok(())
        })]
    }
}

#[test]
fn member_failures_leave_the_container_usable() {
    let container = Container::new();
    container
        .register(|bindings: &mut Bindings<'_>| -> Result<(), InjectError> {
            bindings.bind::<String>().to_value("ok".to_string());
            bindings.bind::<Fragile>().to_type::<Fragile>();
            bindings.bind::<Dangling>().to_type::<Dangling>();
            bindings.bind::<dyn Greeter>().to_type::<CircularGreeter>();
            bindings.bind::<dyn User>().to_type::<CircularUser>();
            Ok(())
        })
        .unwrap();

    match failure(container.get::<Fragile>()) {
        InjectError::MemberInjection { member, source, .. } => {
            assert_eq!(member, "check");
            assert_eq!(source.to_string(), "bad wiring");
        }
        other => panic!("expected MemberInjection, got {other:?}"),
    }

    let err = failure(container.get::<Dangling>());
    assert!(matches!(err, InjectError::UnresolvedBinding(_)));
    assert!(err.source().is_none());

    assert_eq!(container.phase(), Phase::Idle);
    let greeter = container.get::<dyn Greeter>().unwrap();
    assert_eq!(greeter.greet(), "Hello ok!");
}

static OBSERVED: OnceLock<Container> = OnceLock::new();

#[derive(Default)]
struct PhaseWatcher {
    seen: Slot<Phase>,
}

impl Injectable for PhaseWatcher {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|_| Ok(PhaseWatcher::default()))]
    }

    fn members() -> Vec<Member<Self>> {
        vec![Member::<Self>::method("record", |this, _| {
            let container = OBSERVED.get().ok_or("container not set")?;
            this.seen.set(Arc::new(container.phase()));
            Ok(())
        })]
    }
}

#[test]
fn members_are_injected_in_the_injecting_phase() {
    let container = OBSERVED.get_or_init(|| {
        let container = Container::new();
        container
            .register(|bindings: &mut Bindings<'_>| -> Result<(), InjectError> {
                bindings.bind::<PhaseWatcher>().to_type::<PhaseWatcher>();
                Ok(())
            })
            .unwrap();
        container
    });

    let watcher = container.get::<PhaseWatcher>().unwrap();
    assert_eq!(*watcher.seen.get().unwrap(), Phase::Injecting);
    assert_eq!(container.phase(), Phase::Idle);
}
