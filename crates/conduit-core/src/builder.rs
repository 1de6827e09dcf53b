//! Object Builder
//!
//! Builds configuration objects from resolved parameters. A
//! [`ConfigurationModel`] describes how to create the object and which setter
//! applies each property; an [`ObjectBuilder`] combines the model with the
//! resolvers of one configuration instance.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{BuildError, Error, ResolutionError, Result};
use crate::message::Message;
use crate::resolver::{ConfigInstance, ResolverSet, ResolverSetResult};

type InstantiateFn<T> = dyn Fn() -> anyhow::Result<T> + Send + Sync;

/// Applies one resolved value to an object
pub type Setter<T> = Arc<dyn Fn(&mut T, Value) -> std::result::Result<(), serde_json::Error> + Send + Sync>;

/// How new objects are created
pub struct Instantiator<T>(Arc<InstantiateFn<T>>);

impl<T> Instantiator<T> {
    /// Create objects with `T::default()`
    pub fn default_constructor() -> Self
    where
        T: Default,
    {
        Self(Arc::new(|| Ok(T::default())))
    }

    /// Create objects with a factory that may fail
    pub fn factory(factory: impl Fn() -> anyhow::Result<T> + Send + Sync + 'static) -> Self {
        Self(Arc::new(factory))
    }

    pub fn instantiate(&self) -> anyhow::Result<T> {
        (self.0)()
    }
}

impl<T> Clone for Instantiator<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

/// Creation strategy and setter table of a configuration type
pub struct ConfigurationModel<T> {
    instantiator: Instantiator<T>,
    setters: IndexMap<String, Setter<T>>,
}

impl<T: Send + Sync + 'static> ConfigurationModel<T> {
    pub fn new(instantiator: Instantiator<T>) -> Self {
        Self {
            instantiator,
            setters: IndexMap::new(),
        }
    }

    /// Model whose objects start from `T::default()`
    pub fn with_default() -> Self
    where
        T: Default,
    {
        Self::new(Instantiator::default_constructor())
    }

    /// Register a typed setter; resolved values are deserialized into `V`
    pub fn setter<V, F>(self, property: impl Into<String>, apply: F) -> Self
    where
        V: DeserializeOwned,
        F: Fn(&mut T, V) + Send + Sync + 'static,
    {
        self.raw_setter(property, move |target: &mut T, value: Value| {
            apply(target, serde_json::from_value(value)?);
            Ok(())
        })
    }

    /// Register a setter receiving the raw JSON value
    pub fn raw_setter<F>(mut self, property: impl Into<String>, apply: F) -> Self
    where
        F: Fn(&mut T, Value) -> std::result::Result<(), serde_json::Error> + Send + Sync + 'static,
    {
        self.setters.insert(property.into(), Arc::new(apply));
        self
    }

    /// Properties with a setter, in registration order
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.setters.keys().map(String::as_str)
    }

    /// Create a builder for one configuration instance
    ///
    /// Fails if any parameter bound in `resolvers` has no setter.
    pub fn builder(&self, resolvers: Arc<ResolverSet>) -> Result<ObjectBuilder<T>> {
        ObjectBuilder::new(self.instantiator.clone(), self.setters.clone(), resolvers)
    }
}

impl<T> fmt::Debug for ConfigurationModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationModel")
            .field("type", &type_name::<T>())
            .field("properties", &self.setters.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builds objects of `T` from the values of a [`ResolverSet`]
pub struct ObjectBuilder<T> {
    instantiator: Instantiator<T>,
    setters: IndexMap<String, Setter<T>>,
    resolvers: Arc<ResolverSet>,
}

impl<T> ObjectBuilder<T> {
    pub fn new(
        instantiator: Instantiator<T>,
        setters: IndexMap<String, Setter<T>>,
        resolvers: Arc<ResolverSet>,
    ) -> Result<Self> {
        if let Some(parameter) = resolvers.parameters().find(|p| !setters.contains_key(&p.name)) {
            return Err(BuildError::MissingSetter {
                type_name: type_name::<T>(),
                property: parameter.name.clone(),
            }
            .into());
        }

        Ok(Self {
            instantiator,
            setters,
            resolvers,
        })
    }

    pub fn resolvers(&self) -> &Arc<ResolverSet> {
        &self.resolvers
    }

    /// Instantiate a `T` and apply every resolved value to it
    pub fn build(&self, message: &Message) -> Result<T> {
        self.build_with_values(message).map(|(instance, _)| instance)
    }

    /// Like [`ObjectBuilder::build`], also returning the applied values
    pub fn build_with_values(&self, message: &Message) -> Result<(T, ResolverSetResult)> {
        let mut instance = self
            .instantiator
            .instantiate()
            .map_err(|reason| BuildError::Instantiation {
                type_name: type_name::<T>(),
                reason,
            })?;

        let values = self.resolvers.resolve(message)?;
        for (property, value) in values.iter() {
            let Some(setter) = self.setters.get(property) else {
                continue;
            };
            setter(&mut instance, value.clone()).map_err(|source| {
                ResolutionError::new(
                    property,
                    Error::RejectedValue {
                        type_name: type_name::<T>(),
                        property: property.to_string(),
                        source,
                    },
                )
            })?;
        }
        Ok((instance, values))
    }
}

/// Type-erased builder used by configuration resolvers
pub trait InstanceBuilder: Send + Sync {
    /// Build a new instance and report the values applied to it
    fn build_instance(&self, message: &Message) -> Result<(ConfigInstance, ResolverSetResult)>;

    fn resolvers(&self) -> &Arc<ResolverSet>;

    fn type_name(&self) -> &'static str;
}

impl<T: Send + Sync + 'static> InstanceBuilder for ObjectBuilder<T> {
    fn build_instance(&self, message: &Message) -> Result<(ConfigInstance, ResolverSetResult)> {
        let (instance, values) = self.build_with_values(message)?;
        Ok((Arc::new(instance), values))
    }

    fn resolvers(&self) -> &Arc<ResolverSet> {
        &self.resolvers
    }

    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Type-erased [`ConfigurationModel`] held by extension descriptors
pub trait ConfigurationFactory: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn properties(&self) -> Vec<String>;

    fn create_builder(&self, resolvers: Arc<ResolverSet>) -> Result<Box<dyn InstanceBuilder>>;
}

impl<T: Send + Sync + 'static> ConfigurationFactory for ConfigurationModel<T> {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn properties(&self) -> Vec<String> {
        self.setters.keys().cloned().collect()
    }

    fn create_builder(&self, resolvers: Arc<ResolverSet>) -> Result<Box<dyn InstanceBuilder>> {
        Ok(Box::new(self.builder(resolvers)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticValueResolver;
    use crate::types::{DataType, Parameter};
    use serde_json::json;

    #[derive(Debug, Default, PartialEq)]
    struct Personal {
        name: String,
        age: u32,
        nicknames: Vec<String>,
    }

    fn model() -> ConfigurationModel<Personal> {
        ConfigurationModel::with_default()
            .setter("name", |p: &mut Personal, v: String| p.name = v)
            .setter("age", |p: &mut Personal, v: u32| p.age = v)
            .setter("nicknames", |p: &mut Personal, v: Vec<String>| p.nicknames = v)
    }

    fn resolvers(values: &[(&str, Value)]) -> Arc<ResolverSet> {
        let mut set = ResolverSet::new("configuration personal");
        for (name, value) in values {
            set.add(
                Parameter::required(*name, DataType::object()),
                Arc::new(StaticValueResolver::new(value.clone())),
            )
            .unwrap();
        }
        Arc::new(set)
    }

    #[test]
    fn test_builds_and_applies_values() {
        let builder = model()
            .builder(resolvers(&[
                ("name", json!("Heisenberg")),
                ("age", json!(50)),
                ("nicknames", json!(["W", "Walt"])),
            ]))
            .unwrap();

        let built = builder.build(&Message::new("x")).unwrap();
        assert_eq!(
            built,
            Personal {
                name: "Heisenberg".into(),
                age: 50,
                nicknames: vec!["W".into(), "Walt".into()],
            }
        );
    }

    #[test]
    fn test_each_build_is_a_new_object() {
        let builder = model().builder(resolvers(&[("age", json!(1))])).unwrap();
        let first = builder.build_instance(&Message::new("a")).unwrap().0;
        let second = builder.build_instance(&Message::new("b")).unwrap().0;
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_setter_rejected_at_wiring() {
        let result = model().builder(resolvers(&[("weight", json!(80))]));
        assert!(matches!(
            result,
            Err(Error::Build(BuildError::MissingSetter { ref property, .. })) if property == "weight"
        ));
    }

    #[test]
    fn test_instantiation_failure_is_build_error() {
        let failing: ConfigurationModel<Personal> =
            ConfigurationModel::new(Instantiator::factory(|| Err(anyhow::anyhow!("no default"))))
                .setter("name", |p: &mut Personal, v: String| p.name = v);
        let builder = failing.builder(resolvers(&[("name", json!("x"))])).unwrap();

        let err = builder.build(&Message::new("x")).unwrap_err();
        assert!(err.is_build());
    }

    #[test]
    fn test_rejected_value_is_resolution_error() {
        let builder = model().builder(resolvers(&[("age", json!("old"))])).unwrap();
        match builder.build(&Message::new("x")) {
            Err(Error::Resolution(e)) => assert_eq!(e.parameter, "age"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
