//! Transformer Resolution
//!
//! Converters are registered in the registry like any other object. The
//! [`TransformerResolver`] scans them to find the best converter between two
//! data types.
//!
//! A converter is a candidate for `(source, target)` when its source type is
//! `source` or one of its ancestors and its target type is `target` or one of
//! its descendants. Candidates are ranked by:
//!
//! 1. distance from `source` up to the converter's source type (closer wins)
//! 2. priority (higher wins)
//! 3. registration order (earlier wins)

#[cfg(feature = "builtin-converters")]
pub mod builtin;

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{ConversionError, Error, Result};
use crate::registry::{RegistryBroker, RegistryObject};
use crate::types::DataType;

/// Key prefix under which converters are registered
pub const CONVERTER_KEY_PREFIX: &str = "converter:";

/// Converts values of one data type into another
pub trait Converter: Send + Sync {
    fn name(&self) -> &str;

    /// Most general type this converter accepts
    fn source(&self) -> &DataType;

    /// Type this converter produces
    fn target(&self) -> &DataType;

    /// Tie-break between converters equally close to the source type
    fn priority(&self) -> i32 {
        0
    }

    fn convert(&self, value: Value) -> std::result::Result<Value, ConversionError>;
}

type ConvertFn = dyn Fn(Value) -> std::result::Result<Value, ConversionError> + Send + Sync;

/// Converter backed by a closure
#[derive(Clone)]
pub struct FnConverter {
    name: String,
    source: DataType,
    target: DataType,
    priority: i32,
    func: Arc<ConvertFn>,
}

impl FnConverter {
    pub fn new<F>(name: impl Into<String>, source: DataType, target: DataType, func: F) -> Self
    where
        F: Fn(Value) -> std::result::Result<Value, ConversionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            source,
            target,
            priority: 0,
            func: Arc::new(func),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl Converter for FnConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> &DataType {
        &self.source
    }

    fn target(&self) -> &DataType {
        &self.target
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn convert(&self, value: Value) -> std::result::Result<Value, ConversionError> {
        (self.func)(value)
    }
}

impl fmt::Debug for FnConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConverter")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("priority", &self.priority)
            .finish()
    }
}

/// A converter as stored in the registry
#[derive(Clone)]
pub struct ConverterRegistration {
    pub converter: Arc<dyn Converter>,
    /// Registration order within the broker
    pub sequence: u64,
}

/// Register a converter in the broker's transient layer
pub fn register_converter(registry: &RegistryBroker, converter: Arc<dyn Converter>) -> Result<()> {
    let key = format!("{}{}", CONVERTER_KEY_PREFIX, converter.name());
    tracing::debug!(
        converter = converter.name(),
        source = %converter.source(),
        target = %converter.target(),
        priority = converter.priority(),
        "Registering converter"
    );
    let registration = ConverterRegistration {
        converter,
        sequence: registry.next_sequence(),
    };
    registry.register(&key, RegistryObject::new(registration))
}

type CacheKey = (DataType, DataType);

#[derive(Default)]
struct ConverterCache {
    revision: u64,
    entries: HashMap<CacheKey, Option<Arc<dyn Converter>>>,
}

/// Finds the best converter between two data types
pub struct TransformerResolver {
    registry: Arc<RegistryBroker>,
    cache: Option<Mutex<ConverterCache>>,
}

impl TransformerResolver {
    /// Create a resolver with lookup caching enabled
    pub fn new(registry: Arc<RegistryBroker>) -> Self {
        Self {
            registry,
            cache: Some(Mutex::new(ConverterCache::default())),
        }
    }

    /// Enable or disable the lookup cache
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(|| Mutex::new(ConverterCache::default()));
        self
    }

    /// Best converter from `source` to `target`, if any
    pub fn find_converter(&self, source: &DataType, target: &DataType) -> Option<Arc<dyn Converter>> {
        let Some(cache) = &self.cache else {
            return self.rank(source, target).into_iter().next();
        };

        let revision = self.registry.revision();
        let mut cache = cache.lock();
        if cache.revision != revision {
            cache.entries.clear();
            cache.revision = revision;
        }

        let key = (source.clone(), target.clone());
        if let Some(hit) = cache.entries.get(&key) {
            return hit.clone();
        }

        let found = self.rank(source, target).into_iter().next();
        cache.entries.insert(key, found.clone());
        found
    }

    /// Every candidate from `source` to `target`, best first
    pub fn find_converters(&self, source: &DataType, target: &DataType) -> Vec<Arc<dyn Converter>> {
        self.rank(source, target)
    }

    /// Convert `value` to `target`, deriving the source type from the value
    ///
    /// Values already assignable to `target` are returned unchanged.
    pub fn convert(&self, value: Value, target: &DataType) -> Result<Value> {
        let source = DataType::of_value(&value);
        self.convert_from(value, &source, target)
    }

    /// Convert `value`, declared as `source`, to `target`
    pub fn convert_from(&self, value: Value, source: &DataType, target: &DataType) -> Result<Value> {
        if target.is_assignable_from(source) {
            return Ok(value);
        }

        let converter = self
            .find_converter(source, target)
            .ok_or_else(|| Error::conversion_unavailable(source, target))?;
        tracing::debug!(converter = converter.name(), %source, %target, "Converting value");
        Ok(converter.convert(value)?)
    }

    fn rank(&self, source: &DataType, target: &DataType) -> Vec<Arc<dyn Converter>> {
        let mut candidates: Vec<(usize, i32, u64, Arc<dyn Converter>)> = self
            .registry
            .get_all_of::<ConverterRegistration>()
            .into_iter()
            .filter_map(|(_, registration)| {
                let converter = &registration.converter;
                let distance = source.distance_to(converter.source())?;
                if !target.is_assignable_from(converter.target()) {
                    return None;
                }
                Some((distance, converter.priority(), registration.sequence, converter.clone()))
            })
            .collect();

        candidates.sort_by_key(|(distance, priority, sequence, _)| (*distance, Reverse(*priority), *sequence));
        candidates.into_iter().map(|(_, _, _, c)| c).collect()
    }
}
