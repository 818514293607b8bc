//! ---
//! keel_section: "04-service-descriptors"
//! keel_subsection: "module"
//! keel_type: "source"
//! keel_scope: "code"
//! keel_description: "Service descriptors, calls, ACLs, and serializers."
//! keel_version: "v0.0.0-prealpha"
//! keel_owner: "tbd"
//! ---
//! Per-type serializer registries with copy-on-write sharing.
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use keel_common::TypeKey;

use crate::deser::{IdSerializer, MessageSerializer};

type Entry = Arc<dyn Any + Send + Sync>;

#[derive(Clone, Default)]
struct Registry {
    entries: Arc<HashMap<TypeKey, Entry>>,
}

impl Registry {
    fn with(&self, key: TypeKey, entry: Entry) -> Self {
        let mut entries = HashMap::clone(&self.entries);
        entries.insert(key, entry);
        Self {
            entries: Arc::new(entries),
        }
    }

    fn get<S: Clone + 'static>(&self, key: &TypeKey) -> Option<S> {
        self.entries.get(key)?.downcast_ref::<S>().cloned()
    }

    fn types(&self) -> Vec<TypeKey> {
        let mut types: Vec<_> = self.entries.keys().copied().collect();
        types.sort_by_key(TypeKey::name);
        types
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.types()).finish()
    }
}

/// Id serializers keyed by id type. Later registrations for a type win.
#[derive(Clone, Default, Debug)]
pub struct IdSerializers(Registry);

impl IdSerializers {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy with `serializer` registered for `T`.
    pub fn with<T: 'static>(&self, serializer: impl IdSerializer<T> + 'static) -> Self {
        self.with_shared(Arc::new(serializer))
    }

    /// Copy with an already shared serializer registered for `T`.
    pub fn with_shared<T: 'static>(&self, serializer: Arc<dyn IdSerializer<T>>) -> Self {
        Self(self.0.with(TypeKey::of::<T>(), Arc::new(serializer)))
    }

    /// Serializer registered for `T`.
    pub fn get<T: 'static>(&self) -> Option<Arc<dyn IdSerializer<T>>> {
        self.0.get(&TypeKey::of::<T>())
    }

    /// Registered id types, sorted by name.
    pub fn types(&self) -> Vec<TypeKey> {
        self.0.types()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.0.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.0.entries.is_empty()
    }

    pub(crate) fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0.entries, &other.0.entries)
    }
}

/// Message serializers keyed by message type. Later registrations for a type
/// win.
#[derive(Clone, Default, Debug)]
pub struct MessageSerializers(Registry);

impl MessageSerializers {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy with `serializer` registered for `M`.
    pub fn with<M: 'static>(&self, serializer: impl MessageSerializer<M> + 'static) -> Self {
        self.with_shared(Arc::new(serializer))
    }

    /// Copy with an already shared serializer registered for `M`.
    pub fn with_shared<M: 'static>(&self, serializer: Arc<dyn MessageSerializer<M>>) -> Self {
        Self(self.0.with(TypeKey::of::<M>(), Arc::new(serializer)))
    }

    /// Serializer registered for `M`.
    pub fn get<M: 'static>(&self) -> Option<Arc<dyn MessageSerializer<M>>> {
        self.0.get(&TypeKey::of::<M>())
    }

    /// Registered message types, sorted by name.
    pub fn types(&self) -> Vec<TypeKey> {
        self.0.types()
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.0.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.0.entries.is_empty()
    }

    pub(crate) fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0.entries, &other.0.entries)
    }
}
