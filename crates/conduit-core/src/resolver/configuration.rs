use std::any::Any;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde_json::Value;

use super::{ResolverSetResult, ValueResolver};
use crate::builder::InstanceBuilder;
use crate::error::{BuildError, Error, ResolutionError, Result};
use crate::lifecycle::Lifecycle;
use crate::message::Message;
use crate::registry::RegistryBroker;

/// A built configuration object
pub type ConfigInstance = Arc<dyn Any + Send + Sync>;

enum Slot {
    Empty,
    /// Being built by the given thread; the lock is released meanwhile
    Building(ThreadId),
    Built {
        instance: ConfigInstance,
        properties: ResolverSetResult,
    },
    Disposed,
}

/// Owns the single instance of a named configuration
///
/// The first `resolve` builds the instance against that message; every later
/// call returns the same instance, even when the configuration's resolvers
/// are dynamic. Concurrent first calls build exactly once; the others wait
/// for the build. A build that reaches back into its own configuration, for
/// example through a cycle of configuration references, fails with
/// [`BuildError::Cyclic`].
pub struct ConfigurationValueResolver {
    name: String,
    builder: Box<dyn InstanceBuilder>,
    slot: Mutex<Slot>,
    built: Condvar,
}

impl ConfigurationValueResolver {
    pub fn new(name: impl Into<String>, builder: Box<dyn InstanceBuilder>) -> Self {
        Self {
            name: name.into(),
            builder,
            slot: Mutex::new(Slot::Empty),
            built: Condvar::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the instance has been built
    pub fn is_built(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Built { .. })
    }

    /// Values applied to the instance, building it first if needed
    pub fn resolve_properties(&self, message: &Message) -> Result<Value> {
        let slot = self.ensure_built(message)?;
        match &*slot {
            Slot::Built { properties, .. } => Ok(properties.to_json()),
            _ => Err(BuildError::Disposed(self.name.clone()).into()),
        }
    }

    /// Lock the slot once it holds a built instance
    fn ensure_built(&self, message: &Message) -> Result<MutexGuard<'_, Slot>> {
        let mut slot = self.slot.lock();
        loop {
            match &*slot {
                Slot::Built { .. } => return Ok(slot),
                Slot::Disposed => return Err(BuildError::Disposed(self.name.clone()).into()),
                Slot::Building(owner) if *owner == thread::current().id() => {
                    return Err(BuildError::Cyclic(self.name.clone()).into());
                }
                Slot::Building(_) => self.built.wait(&mut slot),
                Slot::Empty => {
                    *slot = Slot::Building(thread::current().id());
                    let outcome = MutexGuard::unlocked(&mut slot, || self.builder.build_instance(message));
                    let building = matches!(*slot, Slot::Building(_));
                    match outcome {
                        Ok((instance, properties)) if building => {
                            tracing::debug!(
                                configuration = %self.name,
                                kind = self.builder.type_name(),
                                "Built configuration instance"
                            );
                            *slot = Slot::Built { instance, properties };
                        }
                        Ok(_) => {}
                        Err(e) => {
                            if building {
                                *slot = Slot::Empty;
                            }
                            self.built.notify_all();
                            return Err(e);
                        }
                    }
                    self.built.notify_all();
                }
            }
        }
    }
}

impl Lifecycle for ConfigurationValueResolver {
    fn initialise(&self) -> Result<()> {
        self.builder.resolvers().initialise()
    }

    fn start(&self) -> Result<()> {
        self.builder.resolvers().start()
    }

    fn stop(&self) -> Result<()> {
        self.builder.resolvers().stop()
    }

    /// Drop the cached instance; later calls to `resolve` fail
    fn dispose(&self) -> Result<()> {
        *self.slot.lock() = Slot::Disposed;
        self.built.notify_all();
        tracing::debug!(configuration = %self.name, "Disposed configuration instance");
        self.builder.resolvers().dispose()
    }
}

impl ValueResolver<ConfigInstance> for ConfigurationValueResolver {
    fn resolve(&self, message: &Message) -> Result<ConfigInstance> {
        match &*self.ensure_built(message)? {
            Slot::Built { instance, .. } => Ok(instance.clone()),
            _ => Err(BuildError::Disposed(self.name.clone()).into()),
        }
    }

    fn is_dynamic(&self) -> bool {
        false
    }
}

/// Resolves a configuration instance registered under a name
///
/// The registry is searched on every call, so re-registering a name takes
/// effect for the next message.
pub struct ConfigurationReference {
    name: String,
    registry: Arc<RegistryBroker>,
}

impl ConfigurationReference {
    pub fn new(name: impl Into<String>, registry: Arc<RegistryBroker>) -> Self {
        Self {
            name: name.into(),
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The referenced configuration resolver
    pub fn target(&self) -> Result<Arc<ConfigurationValueResolver>> {
        self.registry
            .lookup_as::<ConfigurationValueResolver>(&self.name)
            .ok_or_else(|| ResolutionError::new(&self.name, Error::NotRegistered(self.name.clone())).into())
    }
}

impl Lifecycle for ConfigurationReference {}

impl ValueResolver<ConfigInstance> for ConfigurationReference {
    fn resolve(&self, message: &Message) -> Result<ConfigInstance> {
        self.target()?.resolve(message)
    }

    fn is_dynamic(&self) -> bool {
        false
    }
}

/// Resolves to the properties of a referenced configuration, as a JSON object
pub struct ConfigurationPropertiesResolver {
    reference: ConfigurationReference,
}

impl ConfigurationPropertiesResolver {
    pub fn new(reference: ConfigurationReference) -> Self {
        Self { reference }
    }
}

impl Lifecycle for ConfigurationPropertiesResolver {}

impl ValueResolver<Value> for ConfigurationPropertiesResolver {
    fn resolve(&self, message: &Message) -> Result<Value> {
        self.reference.target()?.resolve_properties(message)
    }

    fn is_dynamic(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ConfigurationModel;
    use crate::expression::MessageExpressionEvaluator;
    use crate::registry::RegistryObject;
    use crate::resolver::{ExpressionValueResolver, ResolverSet};
    use crate::types::{DataType, Parameter};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct Greeter {
        greeting: String,
    }

    fn dynamic_resolver(builds: Arc<AtomicUsize>) -> ConfigurationValueResolver {
        let model = ConfigurationModel::new(crate::builder::Instantiator::factory(move || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Greeter::default())
        }))
        .setter("greeting", |g: &mut Greeter, v: String| g.greeting = v);

        let mut set = ResolverSet::new("configuration greeter");
        set.add(
            Parameter::required("greeting", DataType::string()),
            Arc::new(ExpressionValueResolver::new(
                "#[payload]",
                Arc::new(MessageExpressionEvaluator::new()),
            )),
        )
        .unwrap();

        let builder = model.builder(Arc::new(set)).unwrap();
        ConfigurationValueResolver::new("greeter", Box::new(builder))
    }

    #[test]
    fn test_same_instance_every_time() {
        let builds = Arc::new(AtomicUsize::new(0));
        let resolver = dynamic_resolver(builds.clone());

        let first = resolver.resolve(&Message::new("hello")).unwrap();
        for payload in ["bonjour", "hola", "ciao"] {
            let next = resolver.resolve(&Message::new(payload)).unwrap();
            assert!(Arc::ptr_eq(&first, &next));
        }

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        let greeter = first.downcast::<Greeter>().unwrap();
        assert_eq!(greeter.greeting, "hello");
    }

    #[test]
    fn test_concurrent_first_access_builds_once() {
        let builds = Arc::new(AtomicUsize::new(0));
        let resolver = Arc::new(dynamic_resolver(builds.clone()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let resolver = resolver.clone();
                std::thread::spawn(move || resolver.resolve(&Message::new(format!("m{}", i))).unwrap())
            })
            .collect();
        let instances: Vec<ConfigInstance> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(instances.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn test_dispose_drops_instance() {
        let resolver = dynamic_resolver(Arc::new(AtomicUsize::new(0)));
        resolver.resolve(&Message::new("hi")).unwrap();
        assert!(resolver.is_built());

        resolver.dispose().unwrap();
        assert!(!resolver.is_built());
        assert!(matches!(
            resolver.resolve(&Message::new("hi")),
            Err(Error::Build(BuildError::Disposed(_)))
        ));
    }

    #[derive(Debug, Default)]
    struct Holder {
        other: Value,
    }

    fn referencing_resolver(name: &str, target: &str, registry: &Arc<RegistryBroker>) -> Arc<ConfigurationValueResolver> {
        let model = ConfigurationModel::<Holder>::with_default().setter("other", |h: &mut Holder, v: Value| h.other = v);
        let mut set = ResolverSet::new(format!("configuration {}", name));
        set.add(
            Parameter::required("other", DataType::object()),
            Arc::new(ConfigurationPropertiesResolver::new(ConfigurationReference::new(
                target,
                registry.clone(),
            ))),
        )
        .unwrap();
        let builder = model.builder(Arc::new(set)).unwrap();
        let resolver = Arc::new(ConfigurationValueResolver::new(name, Box::new(builder)));
        registry
            .register(name, RegistryObject::with_lifecycle(resolver.clone()))
            .unwrap();
        resolver
    }

    #[test]
    fn test_self_reference_fails_instead_of_blocking() {
        let registry = Arc::new(RegistryBroker::new());
        let resolver = referencing_resolver("a", "a", &registry);

        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(resolver.resolve(&Message::new("x")).map(|_| ()));
        });

        let outcome = rx
            .recv_timeout(std::time::Duration::from_secs(3))
            .expect("resolve did not return");
        let err = outcome.unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
        assert!(err.to_string().contains("references itself"));
    }

    #[test]
    fn test_reference_cycle_fails_and_can_retry() {
        let registry = Arc::new(RegistryBroker::new());
        let a = referencing_resolver("a", "b", &registry);
        referencing_resolver("b", "a", &registry);

        let (tx, rx) = std::sync::mpsc::channel();
        let first = a.clone();
        std::thread::spawn(move || {
            let _ = tx.send(first.resolve(&Message::new("x")).is_err());
        });
        assert!(rx.recv_timeout(std::time::Duration::from_secs(3)).expect("resolve did not return"));

        // a failed build leaves the slot empty, so the cycle is reported again
        assert!(!a.is_built());
        assert!(a.resolve(&Message::new("x")).is_err());
    }

    #[test]
    fn test_reference_looks_up_registry() {
        let registry = Arc::new(RegistryBroker::new());
        let reference = ConfigurationReference::new("greeter", registry.clone());
        assert!(matches!(
            reference.resolve(&Message::new("x")),
            Err(Error::Resolution(_))
        ));

        let resolver = Arc::new(dynamic_resolver(Arc::new(AtomicUsize::new(0))));
        registry
            .register("greeter", RegistryObject::with_lifecycle(resolver.clone()))
            .unwrap();

        let instance = reference.resolve(&Message::new("hey")).unwrap();
        assert!(Arc::ptr_eq(&instance, &resolver.resolve(&Message::new("x")).unwrap()));

        let properties = ConfigurationPropertiesResolver::new(reference);
        assert_eq!(
            properties.resolve(&Message::new("x")).unwrap(),
            json!({"greeting": "hey"})
        );
    }
}
