//! Object Registry
//!
//! Named objects live in registry layers. A [`RegistryBroker`] searches an
//! ordered list of layers; its first layer is always a [`TransientRegistry`]
//! that receives every write made through the broker.

mod broker;
mod transient;

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::Result;
use crate::lifecycle::Lifecycle;

pub use broker::{RegistryBroker, TRANSIENT_LAYER_ID};
pub use transient::TransientRegistry;

/// One layer of named objects
pub trait Registry: Lifecycle {
    /// Identifier unique among the layers of a broker
    fn id(&self) -> &str;

    /// Object registered under `key`
    fn lookup(&self, key: &str) -> Option<RegistryObject>;

    /// Every object in this layer, in registration order
    fn get_all(&self) -> IndexMap<String, RegistryObject>;

    /// Register `object` under `key`, replacing any previous entry
    fn register(&self, key: &str, object: RegistryObject) -> Result<()>;

    /// Remove and return the object registered under `key`
    fn unregister(&self, key: &str) -> Option<RegistryObject>;

    /// Counter that changes every time the layer's contents change
    fn revision(&self) -> u64;
}

/// A registered object
///
/// Objects that take part in the lifecycle declare it at registration with
/// [`RegistryObject::with_lifecycle`]; disposing the owning layer then
/// disposes them.
#[derive(Clone)]
pub struct RegistryObject {
    value: Arc<dyn Any + Send + Sync>,
    lifecycle: Option<Arc<dyn Lifecycle>>,
    type_name: &'static str,
}

impl RegistryObject {
    /// Wrap a plain value
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Wrap a shared value
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            lifecycle: None,
            type_name: type_name::<T>(),
        }
    }

    /// Wrap a shared value that takes part in the lifecycle
    pub fn with_lifecycle<T: Lifecycle + Any>(value: Arc<T>) -> Self {
        let lifecycle: Arc<dyn Lifecycle> = value.clone();
        Self {
            value,
            lifecycle: Some(lifecycle),
            type_name: type_name::<T>(),
        }
    }

    /// The object as `T`, if it is one
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn lifecycle(&self) -> Option<&dyn Lifecycle> {
        self.lifecycle.as_deref()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for RegistryObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryObject")
            .field("type", &self.type_name)
            .field("lifecycle", &self.lifecycle.is_some())
            .finish()
    }
}
