//! Inject for Rust: engine re-exports, process-wide container, derive and module macros.
//!
//! ```ignore
//! use std::sync::Arc;
//! use inject_rs::{Bindings, Container, InjectError, Injectable, Slot};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! #[derive(Default, Injectable)]
//! #[inject(singleton, implements(dyn Greeter))]
//! struct English {
//!     #[inject(named = "user")]
//!     user: Slot<String>,
//! }
//!
//! #[derive(Default)]
//! struct App;
//!
//! #[inject_rs::module]
//! impl App {
//!     fn configure(&self, bindings: &mut Bindings<'_>) -> Result<(), InjectError> {
//!         bindings.bind::<dyn Greeter>().to_type::<English>();
//!         Ok(())
//!     }
//!
//!     #[provides]
//!     #[named("user")]
//!     fn user(&self) -> String {
//!         "World".to_string()
//!     }
//! }
//!
//! let container = Container::new();
//! container.register(App)?;
//! let greeter: Arc<dyn Greeter> = container.get::<dyn Greeter>()?;
//! ```

extern crate self as inject_rs;

pub mod global;

pub use inject_core::*;
pub use inject_rs_macros::{injectable, module, Injectable};
