//! Runtime Entry Point
//!
//! Ties the registry, transformer resolution, expression evaluation and the
//! extension manager together behind one handle.

use std::sync::Arc;

use crate::config::{ExpressionLanguage, RuntimeConfig};
use crate::error::Result;
use crate::expression::{ExpressionEvaluator, LiteralEvaluator, MessageExpressionEvaluator};
use crate::extension::ExtensionManager;
use crate::lifecycle::{Lifecycle, Phase, PhaseTracker};
use crate::registry::RegistryBroker;
use crate::transformer::TransformerResolver;

/// Conduit runtime - main entry point
///
/// Owns the layered registry that configuration instances and converters are
/// registered in. Lifecycle calls on the runtime are forwarded to the
/// registry, which in turn reaches every registered instance.
///
/// # Example
///
/// ```rust,no_run
/// use conduit_core::{Conduit, Lifecycle, RuntimeConfig};
///
/// async fn example() -> anyhow::Result<()> {
///     let conduit = Conduit::new(RuntimeConfig::new("orders"))?;
///     conduit.initialise()?;
///     conduit.start()?;
///
///     for extension in conduit.extensions().extensions().await {
///         println!("{} {}", extension.name, extension.version);
///     }
///
///     conduit.stop()?;
///     conduit.dispose()?;
///     Ok(())
/// }
/// ```
pub struct Conduit {
    /// Runtime configuration
    config: RuntimeConfig,

    /// Layered object registry
    registry: Arc<RegistryBroker>,

    /// Converter lookup over the registry
    transformer: Arc<TransformerResolver>,

    /// Evaluator used for expression parameters
    evaluator: Arc<dyn ExpressionEvaluator>,

    /// Registered extensions and wiring
    extensions: ExtensionManager,

    phase: PhaseTracker,
}

impl Conduit {
    /// Create a new runtime
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The built-in converters cannot be registered
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(RegistryBroker::new());

        #[cfg(feature = "builtin-converters")]
        if config.converters.builtin {
            crate::transformer::builtin::register(&registry)?;
        }

        let transformer = Arc::new(TransformerResolver::new(registry.clone()).with_cache(config.converters.cache));

        let evaluator: Arc<dyn ExpressionEvaluator> = match config.expressions.language {
            ExpressionLanguage::Message => Arc::new(MessageExpressionEvaluator::new()),
            ExpressionLanguage::Disabled => Arc::new(LiteralEvaluator),
        };

        let extensions = ExtensionManager::new(registry.clone(), transformer.clone(), evaluator.clone());

        tracing::debug!(runtime = %config.name, "Created runtime");

        Ok(Self {
            phase: PhaseTracker::new(config.name.clone()),
            config,
            registry,
            transformer,
            evaluator,
            extensions,
        })
    }

    /// Get the runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Get the registry
    pub fn registry(&self) -> &Arc<RegistryBroker> {
        &self.registry
    }

    /// Get the transformer resolver
    pub fn transformer(&self) -> &Arc<TransformerResolver> {
        &self.transformer
    }

    /// Get the expression evaluator
    pub fn evaluator(&self) -> &Arc<dyn ExpressionEvaluator> {
        &self.evaluator
    }

    /// Get the extension manager
    pub fn extensions(&self) -> &ExtensionManager {
        &self.extensions
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.phase.current()
    }
}

impl Lifecycle for Conduit {
    fn initialise(&self) -> Result<()> {
        self.phase.transition(Phase::Initialised, || self.registry.initialise())
    }

    fn start(&self) -> Result<()> {
        self.phase.transition(Phase::Started, || self.registry.start())?;
        tracing::info!(runtime = %self.config.name, "Runtime started");
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.phase.transition(Phase::Stopped, || self.registry.stop())?;
        tracing::info!(runtime = %self.config.name, "Runtime stopped");
        Ok(())
    }

    fn dispose(&self) -> Result<()> {
        if self.phase.current() == Phase::Disposed {
            tracing::debug!(runtime = %self.config.name, "Runtime already disposed");
            return Ok(());
        }
        self.phase.transition(Phase::Disposed, || self.registry.dispose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use serde_json::json;

    #[test]
    fn test_new_registers_builtin_converters() {
        let conduit = Conduit::new(RuntimeConfig::default()).unwrap();
        let value = conduit
            .transformer()
            .convert(json!("42"), &DataType::integer())
            .unwrap();
        assert_eq!(value, json!(42));
    }

    #[test]
    fn test_builtin_converters_can_be_skipped() {
        let conduit = Conduit::new(RuntimeConfig::default().with_builtin_converters(false)).unwrap();
        assert!(conduit.registry().get_all().is_empty());
        assert!(conduit.transformer().convert(json!("42"), &DataType::integer()).is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(Conduit::new(RuntimeConfig::new("")).is_err());
    }

    #[test]
    fn test_expression_language_selection() {
        let conduit = Conduit::new(RuntimeConfig::default()).unwrap();
        assert!(conduit.evaluator().is_expression("#[payload]"));

        let literal =
            Conduit::new(RuntimeConfig::default().with_expression_language(ExpressionLanguage::Disabled)).unwrap();
        assert!(!literal.evaluator().is_expression("#[payload]"));
    }

    #[test]
    fn test_lifecycle_order() {
        let conduit = Conduit::new(RuntimeConfig::default()).unwrap();
        assert!(conduit.start().is_err());

        conduit.initialise().unwrap();
        conduit.start().unwrap();
        assert_eq!(conduit.phase(), Phase::Started);

        conduit.stop().unwrap();
        conduit.dispose().unwrap();
        conduit.dispose().unwrap();
        assert_eq!(conduit.phase(), Phase::Disposed);
        assert!(conduit.registry().get_all().is_empty());
    }
}
