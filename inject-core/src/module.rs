//! Module trait: a unit of binding declarations.

use std::any::type_name;
use std::sync::Arc;

use crate::bindings::Bindings;
use crate::provider::ProviderBinding;
use crate::InjectError;

/// Declares bindings and exposes provider methods.
///
/// Usually implemented through `#[inject_rs::module]`; closures taking
/// `&mut Bindings` are modules too.
pub trait Module: Send + Sync {
    fn configure(&self, bindings: &mut Bindings<'_>) -> Result<(), InjectError> {
        let _ = bindings;
        Ok(())
    }

    /// Provider methods of this module, bound to the shared receiver.
    fn providers(self: Arc<Self>) -> Result<Vec<ProviderBinding>, InjectError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        type_name::<Self>()
    }
}

impl<F> Module for F
where
    F: Fn(&mut Bindings<'_>) -> Result<(), InjectError> + Send + Sync,
{
    fn configure(&self, bindings: &mut Bindings<'_>) -> Result<(), InjectError> {
        self(bindings)
    }
}
