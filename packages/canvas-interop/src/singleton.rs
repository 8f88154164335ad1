//! Weakly held, demand-created shared state.
//!
//! [`SingletonRegistry`] is process-wide: the instance lives as long as somebody holds a
//! strong reference and is recreated on the next access after that. [`PerApplicationManager`]
//! keys the same idea off an application's [`PropertyBag`] instead of a static, so a host
//! that tears down and rebuilds its factory objects still finds the previous instance.

use std::any::Any;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{InteropError, Result};

pub struct SingletonRegistry<T> {
    instance: Mutex<Weak<T>>,
}

impl<T> Default for SingletonRegistry<T> {
    fn default() -> Self {
        Self {
            instance: Mutex::new(Weak::new()),
        }
    }
}

impl<T> SingletonRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_get(&self) -> Option<Arc<T>> {
        self.instance.lock().upgrade()
    }

    /// `create` runs under the registry lock and must not call back into this registry.
    pub fn get_or_create_with(&self, create: impl FnOnce() -> T) -> Arc<T> {
        let mut slot = self.instance.lock();
        if let Some(existing) = slot.upgrade() {
            return existing;
        }
        let instance = Arc::new(create());
        *slot = Arc::downgrade(&instance);
        debug!(ty = std::any::type_name::<T>(), "singleton instance created");
        instance
    }

    /// Install `instance` as the live one. Fails while another instance is still alive,
    /// since that would silently orphan it.
    pub fn set_instance(&self, instance: &Arc<T>) -> Result<()> {
        let mut slot = self.instance.lock();
        if slot.strong_count() > 0 {
            return Err(InteropError::InvalidArgument(
                "a live singleton instance already exists",
            ));
        }
        *slot = Arc::downgrade(instance);
        Ok(())
    }
}

impl<T: Default> SingletonRegistry<T> {
    pub fn get_instance(&self) -> Arc<T> {
        self.get_or_create_with(T::default)
    }
}

/// Property storage owned by the hosting application, outliving any factory object.
#[derive(Default)]
pub struct PropertyBag {
    values: Mutex<FxHashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl PropertyBag {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Any + Send + Sync) {
        self.values.lock().insert(key.into(), Box::new(value));
    }

    pub fn get<V: Any + Clone>(&self, key: &str) -> Option<V> {
        self.values
            .lock()
            .get(key)
            .and_then(|v| v.downcast_ref::<V>())
            .cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        let removed = self.values.lock().remove(key);
        removed.is_some()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A manager instance stored (weakly) in a [`PropertyBag`] under a well-known key.
/// Dropping the last reference removes the entry again.
pub struct PerApplicationManager<T: Send + Sync + 'static> {
    value: T,
    bag: Weak<PropertyBag>,
    key: String,
}

impl<T: Send + Sync + 'static> PerApplicationManager<T> {
    /// Find the manager stored under `key`, or create it with `create` and store it.
    ///
    /// `create` runs under the bag lock and must not touch the bag.
    pub fn get_or_create(
        bag: &Arc<PropertyBag>,
        key: &str,
        create: impl FnOnce() -> T,
    ) -> Result<Arc<Self>> {
        let mut values = bag.values.lock();
        if let Some(entry) = values.get(key) {
            let weak = entry
                .downcast_ref::<Weak<Self>>()
                .ok_or(InteropError::InvalidArgument(
                    "property bag entry has an unexpected type",
                ))?;
            if let Some(existing) = weak.upgrade() {
                return Ok(existing);
            }
        }
        let manager = Arc::new(Self {
            value: create(),
            bag: Arc::downgrade(bag),
            key: key.to_string(),
        });
        values.insert(key.to_string(), Box::new(Arc::downgrade(&manager)));
        debug!(key, "per-application manager created");
        Ok(manager)
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T: Send + Sync + 'static> Deref for PerApplicationManager<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Send + Sync + 'static> Drop for PerApplicationManager<T> {
    fn drop(&mut self) {
        let Some(bag) = self.bag.upgrade() else {
            return;
        };
        let removed = {
            let mut values = bag.values.lock();
            // The slot may already hold a successor; only clear our own dead entry.
            let ours = values
                .get(&self.key)
                .and_then(|entry| entry.downcast_ref::<Weak<Self>>())
                .is_some_and(|weak| weak.strong_count() == 0);
            if ours { values.remove(&self.key) } else { None }
        };
        if removed.is_some() {
            debug!(key = %self.key, "per-application manager removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Manager {
        _state: u32,
    }

    #[test]
    fn get_instance_returns_the_live_instance() {
        let registry = SingletonRegistry::<Manager>::new();
        let first = registry.get_instance();
        let second = registry.get_instance();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn instance_is_recreated_after_last_reference_drops() {
        let registry = SingletonRegistry::<Manager>::new();
        let first = registry.get_instance();
        let weak = Arc::downgrade(&first);
        drop(first);
        assert!(registry.try_get().is_none());
        let second = registry.get_instance();
        assert!(weak.upgrade().is_none());
        assert_eq!(Arc::strong_count(&second), 1);
    }

    #[test]
    fn set_instance_injects_when_nothing_is_live() {
        let registry = SingletonRegistry::<Manager>::new();
        let injected = Arc::new(Manager::default());
        registry.set_instance(&injected).unwrap();
        assert!(Arc::ptr_eq(&registry.get_instance(), &injected));
    }

    #[test]
    fn set_instance_refuses_to_orphan_a_live_instance() {
        let registry = SingletonRegistry::<Manager>::new();
        let _live = registry.get_instance();
        let other = Arc::new(Manager::default());
        assert!(registry.set_instance(&other).is_err());
    }

    #[test]
    fn per_application_manager_survives_factory_recreation() {
        let bag = PropertyBag::new();
        let first = PerApplicationManager::get_or_create(&bag, "manager", || 1u32).unwrap();
        let second = PerApplicationManager::get_or_create(&bag, "manager", || 2u32).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(**second, 1);
    }

    #[test]
    fn per_application_manager_removes_its_entry_on_drop() {
        let bag = PropertyBag::new();
        let manager = PerApplicationManager::get_or_create(&bag, "manager", || 1u32).unwrap();
        assert!(bag.contains_key("manager"));
        drop(manager);
        assert!(!bag.contains_key("manager"));
        let fresh = PerApplicationManager::get_or_create(&bag, "manager", || 9u32).unwrap();
        assert_eq!(**fresh, 9);
    }

    #[test]
    fn mismatched_entry_type_is_rejected() {
        let bag = PropertyBag::new();
        bag.insert("manager", 5u64);
        let result = PerApplicationManager::get_or_create(&bag, "manager", || 1u32);
        assert!(matches!(result, Err(InteropError::InvalidArgument(_))));
        assert_eq!(bag.get::<u64>("manager"), Some(5));
    }
}
