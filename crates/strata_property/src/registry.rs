//! Property type registry
//!
//! Types are registered during startup, then the registry is locked. Lookups
//! never fail loudly: a miss is `None`. The lock is one-way; only `teardown`
//! returns the registry to its initial state, under a new generation.

use crate::property_type::{PropertyType, PropertyTypeId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_core::{Error, Result};

#[derive(Default)]
struct RegistryInner {
    types: Vec<Arc<PropertyType>>,
    by_name: HashMap<String, PropertyTypeId>,
    generation: u32,
}

/// Registry of property types
pub struct PropertyTypeRegistry {
    inner: RwLock<RegistryInner>,
    locked: AtomicBool,
}

impl PropertyTypeRegistry {
    /// Create an empty, unlocked registry
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            locked: AtomicBool::new(false),
        }
    }

    /// Register a type and return its id
    pub fn register(&self, mut property_type: PropertyType) -> Result<PropertyTypeId> {
        let mut inner = self.inner.write();

        if self.locked.load(Ordering::Acquire) {
            log::warn!(
                "Rejected registration of '{}' after registry lock",
                property_type.name()
            );
            return Err(Error::RegistryLocked(property_type.name().to_string()));
        }
        if inner.by_name.contains_key(property_type.name()) {
            return Err(Error::DuplicateName(property_type.name().to_string()));
        }

        let id = PropertyTypeId::from_parts(inner.types.len() as u32, inner.generation);
        property_type.assign_id(id);
        log::debug!(
            "Registered property type '{}' ({})",
            property_type.name(),
            property_type.kind()
        );
        inner
            .by_name
            .insert(property_type.name().to_string(), id);
        inner.types.push(Arc::new(property_type));
        Ok(id)
    }

    /// Id of the type with this name
    pub fn find_by_name(&self, name: &str) -> Option<PropertyTypeId> {
        self.inner.read().by_name.get(name).copied()
    }

    /// Type with this name
    pub fn find(&self, name: &str) -> Option<Arc<PropertyType>> {
        let inner = self.inner.read();
        let id = inner.by_name.get(name)?;
        inner.types.get(id.index() as usize).cloned()
    }

    /// Type with this id; ids from before a teardown find nothing
    pub fn get(&self, id: PropertyTypeId) -> Option<Arc<PropertyType>> {
        self.inner
            .read()
            .types
            .get(id.index() as usize)
            .filter(|ty| ty.id() == id)
            .cloned()
    }

    /// Freeze the registry; later calls are no-ops
    pub fn lock(&self) {
        let inner = self.inner.write();
        if !self.locked.swap(true, Ordering::AcqRel) {
            log::info!("Property type registry locked with {} types", inner.types.len());
        }
    }

    /// Whether the registry has been locked
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Drop every type and unlock. Ids handed out before are invalid afterwards.
    pub fn teardown(&self) {
        let mut inner = self.inner.write();
        let count = inner.types.len();
        *inner = RegistryInner {
            generation: inner.generation.wrapping_add(1),
            ..RegistryInner::default()
        };
        self.locked.store(false, Ordering::Release);
        log::debug!("Property type registry torn down ({} types dropped)", count);
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered names in registration order
    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .types
            .iter()
            .map(|ty| ty.name().to_string())
            .collect()
    }
}

impl Default for PropertyTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_find() {
        let registry = PropertyTypeRegistry::new();
        let id = registry
            .register(PropertyType::new("Node.Opacity", 1.0f32))
            .unwrap();

        assert_eq!(registry.find_by_name("Node.Opacity"), Some(id));
        let ty = registry.get(id).unwrap();
        assert_eq!(ty.id(), id);
        assert_eq!(ty.name(), "Node.Opacity");
        assert!(registry.find("Node.Missing").is_none());
    }

    #[test]
    fn test_duplicate_before_lock() {
        let registry = PropertyTypeRegistry::new();
        registry.register(PropertyType::new("Node.Opacity", 1.0f32)).unwrap();
        let err = registry
            .register(PropertyType::new("Node.Opacity", 0.0f32))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_after_lock() {
        let registry = PropertyTypeRegistry::new();
        registry.register(PropertyType::new("Node.Opacity", 1.0f32)).unwrap();
        registry.lock();
        registry.lock();
        assert!(registry.is_locked());

        let err = registry
            .register(PropertyType::new("Node.Visible", true))
            .unwrap_err();
        assert!(matches!(err, Error::RegistryLocked(name) if name == "Node.Visible"));
        assert!(registry.find_by_name("Node.Opacity").is_some());
    }

    #[test]
    fn test_teardown_resets() {
        let registry = PropertyTypeRegistry::new();
        registry.register(PropertyType::new("Node.Opacity", 1.0f32)).unwrap();
        registry.lock();
        registry.teardown();

        assert!(!registry.is_locked());
        assert!(registry.is_empty());
        assert!(registry.register(PropertyType::new("Node.Opacity", 1.0f32)).is_ok());
    }

    #[test]
    fn test_ids_from_before_teardown_are_stale() {
        let registry = PropertyTypeRegistry::new();
        let opacity = registry.register(PropertyType::new("Node.Opacity", 1.0f32)).unwrap();
        registry.teardown();
        let visible = registry.register(PropertyType::new("Node.Visible", true)).unwrap();

        assert_eq!(opacity.index(), visible.index());
        assert_ne!(opacity, visible);
        assert!(registry.get(opacity).is_none());
        assert_eq!(registry.get(visible).unwrap().name(), "Node.Visible");
    }
}
