//! Value Resolvers
//!
//! A value resolver turns the current message into the value of one logical
//! parameter. Static resolvers always produce the same value; dynamic ones
//! recompute it for every message.
//!
//! # Variants
//!
//! - [`StaticValueResolver`] - a fixed value
//! - [`ExpressionValueResolver`] - an expression evaluated per message
//! - [`CollectionValueResolver`] - a list or set assembled from child resolvers
//! - [`ConvertingValueResolver`] - coerces a child's value to a declared type
//! - [`ConfigurationValueResolver`] / [`ConfigurationReference`] - configuration instances

mod configuration;
mod converting;
mod set;

use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::expression::ExpressionEvaluator;
use crate::lifecycle::{self, Lifecycle};
use crate::message::Message;

pub use configuration::{
    ConfigInstance, ConfigurationPropertiesResolver, ConfigurationReference, ConfigurationValueResolver,
};
pub use converting::ConvertingValueResolver;
pub use set::{ResolverSet, ResolverSetResult};

/// Resolves a value for a message
pub trait ValueResolver<T>: Lifecycle {
    /// Compute the value for `message`
    fn resolve(&self, message: &Message) -> Result<T>;

    /// Whether resolving against different messages can yield different values
    fn is_dynamic(&self) -> bool;
}

/// Shared handle to a resolver producing JSON values
pub type SharedResolver = Arc<dyn ValueResolver<Value>>;

/// Whether any of the given resolvers is dynamic
pub fn has_any_dynamic(resolvers: &[SharedResolver]) -> bool {
    resolvers.iter().any(|r| r.is_dynamic())
}

// ─────────────────────────────────────────────────────────────────────────────
// Static
// ─────────────────────────────────────────────────────────────────────────────

/// Always resolves to the same value
#[derive(Debug, Clone)]
pub struct StaticValueResolver<T> {
    value: T,
}

impl<T> StaticValueResolver<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Send + Sync> Lifecycle for StaticValueResolver<T> {}

impl<T: Clone + Send + Sync> ValueResolver<T> for StaticValueResolver<T> {
    fn resolve(&self, _message: &Message) -> Result<T> {
        Ok(self.value.clone())
    }

    fn is_dynamic(&self) -> bool {
        false
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Expression
// ─────────────────────────────────────────────────────────────────────────────

/// Evaluates an expression against every message
///
/// Text that is exactly one expression resolves to the expression's typed
/// value; text mixing expressions and characters resolves to a string.
pub struct ExpressionValueResolver {
    expression: String,
    evaluator: Arc<dyn ExpressionEvaluator>,
}

impl ExpressionValueResolver {
    pub fn new(expression: impl Into<String>, evaluator: Arc<dyn ExpressionEvaluator>) -> Self {
        Self {
            expression: expression.into(),
            evaluator,
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }
}

impl Lifecycle for ExpressionValueResolver {}

impl ValueResolver<Value> for ExpressionValueResolver {
    fn resolve(&self, message: &Message) -> Result<Value> {
        if self.evaluator.single_expression(&self.expression).is_some() {
            return Ok(self.evaluator.evaluate(&self.expression, message)?);
        }
        Ok(Value::String(self.evaluator.parse(&self.expression, message)?))
    }

    fn is_dynamic(&self) -> bool {
        self.evaluator.is_expression(&self.expression)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Collection
// ─────────────────────────────────────────────────────────────────────────────

/// Shape of a resolved collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    /// Every element, in order
    List,
    /// Distinct elements, first occurrence kept
    Set,
}

/// Resolves each child against the same message and collects the results
pub struct CollectionValueResolver {
    kind: CollectionKind,
    resolvers: Vec<SharedResolver>,
}

impl CollectionValueResolver {
    pub fn new(kind: CollectionKind, resolvers: Vec<SharedResolver>) -> Self {
        Self { kind, resolvers }
    }

    pub fn list(resolvers: Vec<SharedResolver>) -> Self {
        Self::new(CollectionKind::List, resolvers)
    }

    pub fn set(resolvers: Vec<SharedResolver>) -> Self {
        Self::new(CollectionKind::Set, resolvers)
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }
}

impl Lifecycle for CollectionValueResolver {
    fn initialise(&self) -> Result<()> {
        lifecycle::run_all(self.children(), |r| r.initialise())
    }

    fn start(&self) -> Result<()> {
        lifecycle::run_all(self.children(), |r| r.start())
    }

    fn stop(&self) -> Result<()> {
        lifecycle::run_all(self.children(), |r| r.stop())
    }

    fn dispose(&self) -> Result<()> {
        lifecycle::dispose_all("collection resolver", self.children());
        Ok(())
    }
}

impl CollectionValueResolver {
    fn children(&self) -> impl Iterator<Item = &dyn ValueResolver<Value>> {
        self.resolvers.iter().map(|r| r.as_ref())
    }
}

impl ValueResolver<Value> for CollectionValueResolver {
    fn resolve(&self, message: &Message) -> Result<Value> {
        let mut items: Vec<Value> = Vec::with_capacity(self.resolvers.len());
        for resolver in &self.resolvers {
            let value = resolver.resolve(message)?;
            if self.kind == CollectionKind::Set && items.contains(&value) {
                continue;
            }
            items.push(value);
        }
        Ok(Value::Array(items))
    }

    fn is_dynamic(&self) -> bool {
        has_any_dynamic(&self.resolvers)
    }
}
