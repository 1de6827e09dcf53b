//! Operations
//!
//! An operation is invoked once per message. The [`OperationMessageProcessor`]
//! resolves the configuration and parameters, hands an [`OperationContext`] to
//! the [`OperationImplementation`] and folds the [`OperationResult`] back into
//! the message. A [`Pipeline`] chains processors into a flow.

mod context;
mod implementation;
mod pipeline;
mod processor;

pub use context::OperationContext;
pub use implementation::{
    Completion, FnUnit, OperationCall, OperationImplementation, OperationResult, OperationUnit, Output, ReturnType,
    TypedOperationImplementation, UnitFactory, unit_factory,
};
pub use pipeline::Pipeline;
pub use processor::{MessageProcessor, OperationMessageProcessor};
