//! Binding registry and singleton cache.

use std::collections::HashMap;
use std::sync::Arc;

use crate::binder::Binder;
use crate::descriptor::Descriptor;
use crate::instance::Instance;

/// Descriptor to binder map. At most one binder per descriptor; later registrations replace earlier ones.
#[derive(Default)]
pub struct Registry {
    binders: HashMap<Descriptor, Arc<dyn Binder>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freezes the key and stores the binder, returning the one it replaced.
    pub fn insert(
        &mut self,
        mut descriptor: Descriptor,
        binder: Arc<dyn Binder>,
    ) -> Option<Arc<dyn Binder>> {
        descriptor.freeze();
        self.binders.insert(descriptor, binder)
    }

    pub fn get(&self, descriptor: &Descriptor) -> Option<Arc<dyn Binder>> {
        self.binders.get(descriptor).cloned()
    }

    pub fn contains(&self, descriptor: &Descriptor) -> bool {
        self.binders.contains_key(descriptor)
    }

    pub fn len(&self) -> usize {
        self.binders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Descriptor, &Arc<dyn Binder>)> {
        self.binders.iter()
    }
}

/// Singleton instances in insertion order, keyed by descriptor.
#[derive(Default)]
pub struct SingletonCache {
    entries: Vec<(Descriptor, Instance)>,
    index: HashMap<Descriptor, usize>,
}

impl SingletonCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, descriptor: &Descriptor) -> Option<&Instance> {
        self.index.get(descriptor).map(|&i| &self.entries[i].1)
    }

    pub fn insert(&mut self, mut descriptor: Descriptor, instance: Instance) {
        descriptor.freeze();
        match self.index.get(&descriptor) {
            Some(&i) => self.entries[i].1 = instance,
            None => {
                self.index.insert(descriptor.clone(), self.entries.len());
                self.entries.push((descriptor, instance));
            }
        }
    }

    pub fn remove(&mut self, descriptor: &Descriptor) -> Option<Instance> {
        let i = self.index.remove(descriptor)?;
        let (_, instance) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(instance)
    }

    /// First cached instance, in insertion order, whose entry matches `pred`.
    pub fn scan(&self, pred: impl Fn(&Descriptor, &Instance) -> bool) -> Option<&Instance> {
        self.entries
            .iter()
            .find(|(descriptor, instance)| pred(descriptor, instance))
            .map(|(_, instance)| instance)
    }

    pub fn contains(&self, descriptor: &Descriptor) -> bool {
        self.index.contains_key(descriptor)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
