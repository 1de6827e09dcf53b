//! Resolver sets
//!
//! A [`ResolverSet`] binds the parameters of one configuration or operation to
//! their resolvers and resolves all of them against a message at once.

use indexmap::IndexMap;
use serde_json::Value;

use super::{SharedResolver, ValueResolver};
use crate::error::{Error, LifecycleError, ResolutionError, Result};
use crate::lifecycle::{self, Lifecycle, Phase, PhaseTracker};
use crate::message::Message;
use crate::types::Parameter;

/// Ordered parameter bindings of a configuration or operation
pub struct ResolverSet {
    owner: String,
    entries: IndexMap<String, (Parameter, SharedResolver)>,
    phase: PhaseTracker,
}

impl ResolverSet {
    /// Create an empty set; `owner` names the configuration or operation in errors
    pub fn new(owner: impl Into<String>) -> Self {
        let owner = owner.into();
        Self {
            phase: PhaseTracker::new(owner.clone()),
            owner,
            entries: IndexMap::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Bind a resolver to a parameter
    ///
    /// Each parameter may be bound once.
    pub fn add(&mut self, parameter: Parameter, resolver: SharedResolver) -> Result<()> {
        if self.entries.contains_key(&parameter.name) {
            return Err(Error::DuplicateParameter {
                owner: self.owner.clone(),
                parameter: parameter.name,
            });
        }
        self.entries.insert(parameter.name.clone(), (parameter, resolver));
        Ok(())
    }

    /// Check that every required parameter in `parameters` is bound
    pub fn validate(&self, parameters: &[Parameter]) -> Result<()> {
        match parameters
            .iter()
            .find(|p| p.required && !self.entries.contains_key(&p.name))
        {
            Some(missing) => Err(Error::missing_parameter(&self.owner, &missing.name)),
            None => Ok(()),
        }
    }

    /// Resolve every parameter in declaration order
    ///
    /// The first failure aborts the resolution and is returned wrapped with
    /// the failing parameter's name.
    pub fn resolve(&self, message: &Message) -> Result<ResolverSetResult> {
        if self.phase.current() == Phase::Disposed {
            return Err(LifecycleError::new(&self.owner, "resolve", "resolver set has been disposed").into());
        }

        let mut values = IndexMap::with_capacity(self.entries.len());
        for (name, (_, resolver)) in &self.entries {
            let value = resolver
                .resolve(message)
                .map_err(|cause| ResolutionError::new(name.clone(), cause))?;
            values.insert(name.clone(), value);
        }
        Ok(ResolverSetResult { values })
    }

    /// Whether any bound resolver is dynamic
    pub fn is_dynamic(&self) -> bool {
        self.entries.values().any(|(_, r)| r.is_dynamic())
    }

    /// Bound parameters in declaration order
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.entries.values().map(|(p, _)| p)
    }

    pub fn resolver(&self, name: &str) -> Option<&SharedResolver> {
        self.entries.get(name).map(|(_, r)| r)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn phase(&self) -> Phase {
        self.phase.current()
    }

    fn resolvers(&self) -> impl Iterator<Item = &dyn ValueResolver<Value>> {
        self.entries.values().map(|(_, r)| r.as_ref())
    }
}

impl Lifecycle for ResolverSet {
    fn initialise(&self) -> Result<()> {
        self.phase.transition(Phase::Initialised, || {
            lifecycle::run_all(self.resolvers(), |r| r.initialise())
        })
    }

    fn start(&self) -> Result<()> {
        self.phase
            .transition(Phase::Started, || lifecycle::run_all(self.resolvers(), |r| r.start()))
    }

    fn stop(&self) -> Result<()> {
        self.phase
            .transition(Phase::Stopped, || lifecycle::run_all(self.resolvers(), |r| r.stop()))
    }

    /// Dispose every resolver; failures are logged, never returned
    fn dispose(&self) -> Result<()> {
        let outcome = self.phase.transition(Phase::Disposed, || {
            lifecycle::dispose_all(&self.owner, self.resolvers());
            Ok(())
        });
        if let Err(e) = outcome {
            tracing::debug!(owner = %self.owner, error = %e, "Ignoring repeated dispose");
        }
        Ok(())
    }
}

/// Values produced by one [`ResolverSet::resolve`] call, in declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolverSetResult {
    values: IndexMap<String, Value>,
}

impl ResolverSetResult {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.values.values()
    }

    /// The resolved values as a JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}
