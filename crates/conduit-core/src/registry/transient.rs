//! In-memory registry layer
//!
//! Readers load an immutable snapshot of the object map; writers build a new
//! map under a mutex and swap it in.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::Mutex;

use super::{Registry, RegistryObject};
use crate::error::Result;
use crate::lifecycle::{self, Lifecycle, Phase, PhaseTracker};

/// Read-write registry layer held in memory
pub struct TransientRegistry {
    id: String,
    objects: ArcSwap<IndexMap<String, RegistryObject>>,
    writer: Mutex<()>,
    revision: AtomicU64,
    phase: PhaseTracker,
}

impl TransientRegistry {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            phase: PhaseTracker::new(format!("registry {}", id)),
            id,
            objects: ArcSwap::from_pointee(IndexMap::new()),
            writer: Mutex::new(()),
            revision: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.objects.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.load().is_empty()
    }

    fn update<R>(&self, change: impl FnOnce(&mut IndexMap<String, RegistryObject>) -> R) -> R {
        let _guard = self.writer.lock();
        let mut next = IndexMap::clone(&self.objects.load());
        let outcome = change(&mut next);
        self.objects.store(Arc::new(next));
        self.revision.fetch_add(1, Ordering::SeqCst);
        outcome
    }

    fn lifecycle_objects(&self) -> Vec<RegistryObject> {
        self.objects
            .load()
            .values()
            .filter(|o| o.lifecycle().is_some())
            .cloned()
            .collect()
    }
}

impl Registry for TransientRegistry {
    fn id(&self) -> &str {
        &self.id
    }

    fn lookup(&self, key: &str) -> Option<RegistryObject> {
        self.objects.load().get(key).cloned()
    }

    fn get_all(&self) -> IndexMap<String, RegistryObject> {
        IndexMap::clone(&self.objects.load())
    }

    /// Insert or replace; a replaced lifecycle object is disposed
    fn register(&self, key: &str, object: RegistryObject) -> Result<()> {
        tracing::debug!(registry = %self.id, key, kind = object.type_name(), "Registering object");
        let replaced = self.update(|objects| objects.insert(key.to_string(), object));

        if let Some(lifecycle) = replaced.as_ref().and_then(|old| old.lifecycle()) {
            if let Err(e) = lifecycle.dispose() {
                tracing::warn!(registry = %self.id, key, error = %e, "Failed to dispose replaced object");
            }
        }
        Ok(())
    }

    fn unregister(&self, key: &str) -> Option<RegistryObject> {
        if !self.objects.load().contains_key(key) {
            return None;
        }
        self.update(|objects| objects.shift_remove(key))
    }

    fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }
}

impl Lifecycle for TransientRegistry {
    fn initialise(&self) -> Result<()> {
        self.phase.transition(Phase::Initialised, || {
            let objects = self.lifecycle_objects();
            lifecycle::run_all(objects.iter().filter_map(|o| o.lifecycle()), |o| o.initialise())
        })
    }

    fn start(&self) -> Result<()> {
        self.phase.transition(Phase::Started, || {
            let objects = self.lifecycle_objects();
            lifecycle::run_all(objects.iter().filter_map(|o| o.lifecycle()), |o| o.start())
        })
    }

    fn stop(&self) -> Result<()> {
        self.phase.transition(Phase::Stopped, || {
            let objects = self.lifecycle_objects();
            lifecycle::run_all(objects.iter().filter_map(|o| o.lifecycle()), |o| o.stop())
        })
    }

    /// Dispose every lifecycle object and empty the layer
    fn dispose(&self) -> Result<()> {
        let outcome = self.phase.transition(Phase::Disposed, || {
            let objects = self.lifecycle_objects();
            let failures = lifecycle::dispose_all(&self.id, objects.iter().filter_map(|o| o.lifecycle()));
            self.update(|objects| objects.clear());
            tracing::debug!(registry = %self.id, failures, "Disposed registry layer");
            Ok(())
        });
        if let Err(e) = outcome {
            tracing::debug!(registry = %self.id, error = %e, "Ignoring repeated dispose");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LifecycleError;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct Closeable {
        closed: AtomicBool,
    }

    impl Lifecycle for Closeable {
        fn dispose(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Err(LifecycleError::new("closeable", "dispose", "already closed").into())
        }
    }

    #[test]
    fn test_register_lookup_unregister() {
        let registry = TransientRegistry::new("t");
        registry.register("answer", RegistryObject::new(42u32)).unwrap();

        let found = registry.lookup("answer").unwrap();
        assert_eq!(*found.downcast::<u32>().unwrap(), 42);
        assert!(found.downcast::<String>().is_none());

        let rev = registry.revision();
        assert!(registry.unregister("answer").is_some());
        assert!(registry.revision() > rev);
        assert!(registry.lookup("answer").is_none());
        assert!(registry.unregister("answer").is_none());
    }

    #[test]
    fn test_snapshot_survives_writes() {
        let registry = TransientRegistry::new("t");
        registry.register("a", RegistryObject::new(1u8)).unwrap();

        let snapshot = registry.get_all();
        registry.register("b", RegistryObject::new(2u8)).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_replacing_disposes_previous_object() {
        let registry = TransientRegistry::new("t");
        let first = Arc::new(Closeable::default());
        registry
            .register("closeable", RegistryObject::with_lifecycle(first.clone()))
            .unwrap();

        let second = Arc::new(Closeable::default());
        assert!(registry
            .register("closeable", RegistryObject::with_lifecycle(second.clone()))
            .is_ok());

        assert!(first.closed.load(Ordering::SeqCst));
        assert!(!second.closed.load(Ordering::SeqCst));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_dispose_disposes_lifecycle_objects() {
        let registry = TransientRegistry::new("t");
        let closeable = Arc::new(Closeable::default());
        registry
            .register("closeable", RegistryObject::with_lifecycle(closeable.clone()))
            .unwrap();
        registry.register("plain", RegistryObject::new("text")).unwrap();

        assert!(registry.dispose().is_ok());
        assert!(closeable.closed.load(Ordering::SeqCst));
        assert!(registry.is_empty());
    }
}
