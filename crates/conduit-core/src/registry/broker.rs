//! Registry Broker
//!
//! Searches an ordered list of registry layers. Layer zero is the transient
//! layer: it is searched first and receives every `register`/`unregister`.
//! Layers added later are inserted right after it, so the most recently added
//! layer is searched next.
//!
//! The layer list is a copy-on-write snapshot. A lookup racing with
//! `add_layer`/`remove_layer` sees either the old or the new list, never a
//! partial one.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use parking_lot::Mutex;

use super::{Registry, RegistryObject, TransientRegistry};
use crate::error::{RegistryError, Result};
use crate::lifecycle::{self, Lifecycle};

/// Identifier of the broker's transient layer
pub const TRANSIENT_LAYER_ID: &str = "transient";

/// Ordered view over registry layers
pub struct RegistryBroker {
    transient: Arc<TransientRegistry>,
    layers: ArcSwap<Vec<Arc<dyn Registry>>>,
    writer: Mutex<()>,
    epoch: AtomicU64,
    sequence: AtomicU64,
}

impl RegistryBroker {
    /// Create a broker holding only the transient layer
    pub fn new() -> Self {
        let transient = Arc::new(TransientRegistry::new(TRANSIENT_LAYER_ID));
        let layers: Vec<Arc<dyn Registry>> = vec![transient.clone()];
        Self {
            transient,
            layers: ArcSwap::from_pointee(layers),
            writer: Mutex::new(()),
            epoch: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
        }
    }

    /// Next number in this broker's registration order, starting at zero
    pub fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst)
    }

    /// The transient layer
    pub fn transient(&self) -> &Arc<TransientRegistry> {
        &self.transient
    }

    /// Snapshot of the layers in search order
    pub fn layers(&self) -> Vec<Arc<dyn Registry>> {
        self.layers.load().iter().cloned().collect()
    }

    /// Insert a layer right after the transient layer
    pub fn add_layer(&self, layer: Arc<dyn Registry>) -> Result<()> {
        let _guard = self.writer.lock();
        let current = self.layers.load();
        if current.iter().any(|l| l.id() == layer.id()) {
            return Err(RegistryError::DuplicateLayer(layer.id().to_string()).into());
        }

        let mut next = Vec::with_capacity(current.len() + 1);
        next.push(current[0].clone());
        next.push(layer.clone());
        next.extend(current.iter().skip(1).cloned());

        self.layers.store(Arc::new(next));
        self.epoch.fetch_add(1, Ordering::SeqCst);
        tracing::info!(layer = layer.id(), "Added registry layer");
        Ok(())
    }

    /// Remove a layer and hand it back to the caller, who owns its disposal
    pub fn remove_layer(&self, id: &str) -> Result<Arc<dyn Registry>> {
        if id == TRANSIENT_LAYER_ID {
            return Err(RegistryError::TransientLayerRemoval.into());
        }

        let _guard = self.writer.lock();
        let current = self.layers.load();
        let position = current
            .iter()
            .position(|l| l.id() == id)
            .ok_or_else(|| RegistryError::LayerNotFound(id.to_string()))?;

        let mut next: Vec<Arc<dyn Registry>> = current.iter().cloned().collect();
        let removed = next.remove(position);

        self.layers.store(Arc::new(next));
        // Keeps the broker revision moving forward once the layer's own
        // revision no longer counts towards it.
        self.epoch.fetch_add(removed.revision() + 1, Ordering::SeqCst);
        tracing::info!(layer = id, "Removed registry layer");
        Ok(removed)
    }

    /// First object registered under `key`, searching layers in order
    pub fn lookup(&self, key: &str) -> Option<RegistryObject> {
        self.layers.load().iter().find_map(|layer| layer.lookup(key))
    }

    /// First object registered under `key`, if it is a `T`
    pub fn lookup_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.lookup(key)?.downcast::<T>()
    }

    /// Every visible object; for keys present in several layers the first
    /// layer in search order wins
    pub fn get_all(&self) -> IndexMap<String, RegistryObject> {
        let mut merged = IndexMap::new();
        for layer in self.layers.load().iter() {
            for (key, object) in layer.get_all() {
                merged.entry(key).or_insert(object);
            }
        }
        merged
    }

    /// Every visible object that is a `T`
    pub fn get_all_of<T: Any + Send + Sync>(&self) -> Vec<(String, Arc<T>)> {
        self.get_all()
            .into_iter()
            .filter_map(|(key, object)| object.downcast::<T>().map(|v| (key, v)))
            .collect()
    }

    /// Register into the transient layer
    pub fn register(&self, key: &str, object: RegistryObject) -> Result<()> {
        self.transient.register(key, object)
    }

    /// Remove from the transient layer
    pub fn unregister(&self, key: &str) -> Option<RegistryObject> {
        self.transient.unregister(key)
    }

    /// Counter that changes whenever any visible layer changes
    pub fn revision(&self) -> u64 {
        let layers = self.layers.load();
        self.epoch.load(Ordering::SeqCst) + layers.iter().map(|l| l.revision()).sum::<u64>()
    }
}

impl Default for RegistryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle for RegistryBroker {
    fn initialise(&self) -> Result<()> {
        let layers = self.layers.load();
        lifecycle::run_all(layers.iter().map(|l| l.as_ref()), |l| l.initialise())
    }

    fn start(&self) -> Result<()> {
        let layers = self.layers.load();
        lifecycle::run_all(layers.iter().map(|l| l.as_ref()), |l| l.start())
    }

    fn stop(&self) -> Result<()> {
        let layers = self.layers.load();
        lifecycle::run_all(layers.iter().map(|l| l.as_ref()), |l| l.stop())
    }

    fn dispose(&self) -> Result<()> {
        let layers = self.layers.load();
        let failures = lifecycle::dispose_all("registry broker", layers.iter().map(|l| l.as_ref()));
        if failures > 0 {
            tracing::warn!(failures, "Some registry layers failed to dispose");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn layer(id: &str, entries: &[(&str, &'static str)]) -> Arc<dyn Registry> {
        let registry = TransientRegistry::new(id);
        for (key, value) in entries {
            registry.register(key, RegistryObject::new(*value)).unwrap();
        }
        Arc::new(registry)
    }

    fn text(object: Option<RegistryObject>) -> Option<&'static str> {
        object.and_then(|o| o.downcast::<&'static str>()).map(|v| *v)
    }

    #[test]
    fn test_transient_layer_searched_first() {
        let broker = RegistryBroker::new();
        broker.add_layer(layer("app", &[("key", "from app")])).unwrap();
        assert_eq!(text(broker.lookup("key")), Some("from app"));

        broker.register("key", RegistryObject::new("from transient")).unwrap();
        assert_eq!(text(broker.lookup("key")), Some("from transient"));

        broker.unregister("key");
        assert_eq!(text(broker.lookup("key")), Some("from app"));
    }

    #[test]
    fn test_latest_layer_searched_next() {
        let broker = RegistryBroker::new();
        broker.add_layer(layer("older", &[("key", "older")])).unwrap();
        broker.add_layer(layer("newer", &[("key", "newer")])).unwrap();

        let ids: Vec<String> = broker.layers().iter().map(|l| l.id().to_string()).collect();
        assert_eq!(ids, vec![TRANSIENT_LAYER_ID, "newer", "older"]);
        assert_eq!(text(broker.lookup("key")), Some("newer"));
    }

    #[test]
    fn test_get_all_first_writer_wins() {
        let broker = RegistryBroker::new();
        broker.add_layer(layer("second", &[("k1", "v1-second"), ("k2", "v2")])).unwrap();
        broker.add_layer(layer("first", &[("k1", "v1")])).unwrap();

        let all = broker.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(text(all.get("k1").cloned()), Some("v1"));
        assert_eq!(text(all.get("k2").cloned()), Some("v2"));
    }

    #[test]
    fn test_typed_lookup() {
        let broker = RegistryBroker::new();
        broker.register("port", RegistryObject::new(8080u16)).unwrap();

        assert_eq!(broker.lookup_as::<u16>("port").map(|v| *v), Some(8080));
        assert!(broker.lookup_as::<String>("port").is_none());
        assert!(broker.lookup_as::<u16>("missing").is_none());
        assert_eq!(broker.get_all_of::<u16>().len(), 1);
    }

    #[test]
    fn test_layer_management_errors() {
        let broker = RegistryBroker::new();
        broker.add_layer(layer("app", &[])).unwrap();

        assert!(matches!(
            broker.add_layer(layer("app", &[])),
            Err(Error::Registry(RegistryError::DuplicateLayer(_)))
        ));
        assert!(matches!(
            broker.remove_layer(TRANSIENT_LAYER_ID),
            Err(Error::Registry(RegistryError::TransientLayerRemoval))
        ));
        assert!(matches!(
            broker.remove_layer("nope"),
            Err(Error::Registry(RegistryError::LayerNotFound(_)))
        ));

        let removed = broker.remove_layer("app").unwrap();
        assert_eq!(removed.id(), "app");
        assert_eq!(broker.layers().len(), 1);
    }

    #[test]
    fn test_revision_moves_forward() {
        let broker = RegistryBroker::new();
        let mut last = broker.revision();

        broker.register("a", RegistryObject::new(1u8)).unwrap();
        assert!(broker.revision() > last);
        last = broker.revision();

        broker.add_layer(layer("busy", &[("x", "1"), ("y", "2")])).unwrap();
        assert!(broker.revision() > last);
        last = broker.revision();

        broker.remove_layer("busy").unwrap();
        assert!(broker.revision() > last);
    }
}
