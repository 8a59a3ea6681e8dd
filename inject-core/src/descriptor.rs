//! Binding keys.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::marker::{Marker, MarkerId};
use crate::types::TypeKey;
use crate::InjectError;

/// Key under which a binding is registered and looked up.
///
/// Equality covers the type, the name and the qualifier(s); the frozen flag is
/// bookkeeping only. A descriptor with a qualifier set is a lookup form: it
/// expands through [`Descriptor::candidates`].
#[derive(Clone)]
pub struct Descriptor {
    ty: TypeKey,
    name: Option<String>,
    qualifier: Option<MarkerId>,
    qualifiers: Option<Vec<MarkerId>>,
    frozen: bool,
}

impl Descriptor {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::for_key(TypeKey::of::<T>())
    }

    pub fn for_key(ty: TypeKey) -> Self {
        Self {
            ty,
            name: None,
            qualifier: None,
            qualifiers: None,
            frozen: false,
        }
    }

    pub fn new(
        ty: TypeKey,
        name: Option<String>,
        qualifier: Option<MarkerId>,
        qualifiers: Option<Vec<MarkerId>>,
    ) -> Result<Self, InjectError> {
        if qualifier.is_some() && qualifiers.is_some() {
            return Err(InjectError::InvalidDescriptor(ty.short_name()));
        }
        Ok(Self {
            ty,
            name,
            qualifier,
            qualifiers,
            frozen: false,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.frozen = false;
        self
    }

    /// Replaces any qualifier or qualifier set.
    pub fn with_qualifier(mut self, qualifier: MarkerId) -> Self {
        self.qualifier = Some(qualifier);
        self.qualifiers = None;
        self.frozen = false;
        self
    }

    pub fn qualified_by<M: Marker>(self) -> Self {
        self.with_qualifier(MarkerId::of::<M>())
    }

    pub fn with_qualifiers(mut self, qualifiers: Vec<MarkerId>) -> Self {
        self.qualifier = None;
        self.qualifiers = Some(qualifiers);
        self.frozen = false;
        self
    }

    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn qualifier(&self) -> Option<MarkerId> {
        self.qualifier
    }

    pub fn qualifiers(&self) -> Option<&[MarkerId]> {
        self.qualifiers.as_deref()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn set_name(&mut self, name: Option<String>) -> Result<(), InjectError> {
        self.ensure_mutable()?;
        self.name = name;
        Ok(())
    }

    pub fn set_qualifier(&mut self, qualifier: Option<MarkerId>) -> Result<(), InjectError> {
        self.ensure_mutable()?;
        if qualifier.is_some() && self.qualifiers.is_some() {
            return Err(InjectError::InvalidDescriptor(self.ty.short_name()));
        }
        self.qualifier = qualifier;
        Ok(())
    }

    pub fn set_qualifiers(&mut self, qualifiers: Option<Vec<MarkerId>>) -> Result<(), InjectError> {
        self.ensure_mutable()?;
        if qualifiers.is_some() && self.qualifier.is_some() {
            return Err(InjectError::InvalidDescriptor(self.ty.short_name()));
        }
        self.qualifiers = qualifiers;
        Ok(())
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Same type and name without any qualifier.
    pub fn unqualified(&self) -> Self {
        Self {
            ty: self.ty,
            name: self.name.clone(),
            qualifier: None,
            qualifiers: None,
            frozen: false,
        }
    }

    /// Same name and qualifier, whatever the type.
    pub fn same_qualification(&self, other: &Descriptor) -> bool {
        self.name == other.name && self.qualifier == other.qualifier
    }

    /// Keys to try for this descriptor, most specific first.
    pub fn candidates(&self) -> Vec<Descriptor> {
        match &self.qualifiers {
            Some(set) => set
                .iter()
                .map(|q| self.unqualified().with_qualifier(*q))
                .chain(std::iter::once(self.unqualified()))
                .collect(),
            None => vec![self.clone()],
        }
    }

    fn ensure_mutable(&self) -> Result<(), InjectError> {
        if self.frozen {
            return Err(InjectError::DescriptorFrozen(self.to_string()));
        }
        Ok(())
    }
}

fn sorted(set: &Option<Vec<MarkerId>>) -> Option<Vec<MarkerId>> {
    set.as_ref().map(|s| {
        let mut s = s.clone();
        s.sort();
        s.dedup();
        s
    })
}

impl PartialEq for Descriptor {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.name == other.name
            && self.qualifier == other.qualifier
            && sorted(&self.qualifiers) == sorted(&other.qualifiers)
    }
}

impl Eq for Descriptor {}

impl Hash for Descriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)?;
        if let Some(name) = &self.name {
            write!(f, ":{name}")?;
        }
        if let Some(q) = &self.qualifier {
            write!(f, ":@{q}")?;
        }
        if let Some(set) = &self.qualifiers {
            let names: Vec<String> = set.iter().map(|q| format!("@{q}")).collect();
            write!(f, ":{{{}}}", names.join("|"))?;
        }
        Ok(())
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Descriptor({self})")
    }
}
