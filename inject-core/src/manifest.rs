//! Binding manifest: a serialisable view of what a container can resolve.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::binder::BinderKind;
use crate::container::Container;
use crate::InjectError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingInfo {
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    pub kind: BinderKind,
    pub target: String,
    pub singleton: bool,
    /// A singleton instance is cached under this descriptor.
    pub cached: bool,
}

impl Container {
    /// All bindings, sorted by type, name and qualifier.
    pub fn bindings(&self) -> Result<Vec<BindingInfo>, InjectError> {
        let mut out: Vec<BindingInfo> = self.with_state(|state| {
            state
                .registry
                .iter()
                .map(|(descriptor, binder)| BindingInfo {
                    ty: descriptor.ty().short_name(),
                    name: descriptor.name().map(str::to_string),
                    qualifier: descriptor.qualifier().map(|q| q.to_string()),
                    kind: binder.kind(),
                    target: binder.target(),
                    singleton: binder.is_singleton(),
                    cached: state.singletons.contains(descriptor),
                })
                .collect()
        })?;
        out.sort_by(|a, b| {
            (&a.ty, &a.name, &a.qualifier).cmp(&(&b.ty, &b.name, &b.qualifier))
        });
        Ok(out)
    }

    /// JSON document listing every binding and the cache size.
    pub fn manifest(&self) -> Result<Value, InjectError> {
        Ok(json!({
            "bindings": self.bindings()?,
            "singletons": self.singleton_count()?,
            "options": self.options(),
        }))
    }
}
