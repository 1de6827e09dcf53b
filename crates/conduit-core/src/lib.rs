//! Conduit Core - Parameter Resolution and Operation Invocation
//!
//! This crate wires pluggable extensions into message pipelines. Extensions
//! declare configurations and operations; the runtime turns the plain values a
//! flow supplies into per-message resolvers, builds configuration objects once
//! and invokes operations for every message.
//!
//! # Modules
//!
//! - **message** - Message model (payload, scoped properties, flow variables)
//! - **expression** - `#[...]` expression evaluation against a message
//! - **resolver** - Value resolvers, resolver sets and configuration resolvers
//! - **builder** - Setter tables that build typed objects from resolved values
//! - **operation** - Operation context, invocation, processors and pipelines
//! - **registry** - Layered object registry with a transient write layer
//! - **transformer** - Converter registration and best-converter lookup
//! - **extension** - Extension descriptors and the extension manager
//! - **runtime** - The [`Conduit`] handle tying it all together
//!
//! # Example
//!
//! ```rust,no_run
//! use conduit_core::{Conduit, Message, MessageProcessor, ParameterValues, RuntimeConfig};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let conduit = Conduit::new(RuntimeConfig::default())?;
//!
//!     // Extensions are registered with `conduit.extensions().register_extension(...)`
//!     conduit
//!         .extensions()
//!         .configure("text", "formatter", "fmt", ParameterValues::new())
//!         .await?;
//!     let format = conduit
//!         .extensions()
//!         .operation("text", "format", "fmt", ParameterValues::new())
//!         .await?;
//!
//!     let result = format.process(Message::new("hello")).await?;
//!     println!("{}", result.payload());
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod expression;
pub mod extension;
pub mod lifecycle;
pub mod message;
pub mod operation;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod transformer;
pub mod types;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports
// ─────────────────────────────────────────────────────────────────────────────

pub use builder::{ConfigurationFactory, ConfigurationModel, InstanceBuilder, Instantiator, ObjectBuilder};
pub use config::{ConverterConfig, ExpressionConfig, ExpressionLanguage, RuntimeConfig};
pub use error::{
    BuildError, ConversionError, Error, ExpressionError, InvocationError, LifecycleError, ProcessingError,
    RegistryError, ResolutionError, Result,
};
pub use expression::{ExpressionEvaluator, LiteralEvaluator, MessageExpressionEvaluator};
pub use extension::{
    ConfigurationDescriptor, ExtensionDescriptor, ExtensionManager, ExtensionSummary, OperationDescriptor,
    ParameterValues,
};
pub use lifecycle::{Lifecycle, Phase};
pub use message::{Message, MessageBody, PropertyScope};
pub use operation::{
    Completion, MessageProcessor, OperationCall, OperationContext, OperationImplementation, OperationMessageProcessor,
    OperationResult, OperationUnit, Output, Pipeline, ReturnType, UnitFactory, unit_factory,
};
pub use registry::{Registry, RegistryBroker, RegistryObject, TransientRegistry};
pub use resolver::{ConfigInstance, ResolverSet, ResolverSetResult, ValueResolver};
pub use runtime::Conduit;
pub use transformer::{Converter, FnConverter, TransformerResolver};
pub use types::{DataType, Parameter, ParameterValue};
