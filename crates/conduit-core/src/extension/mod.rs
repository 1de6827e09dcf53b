//! Extensions
//!
//! Extensions are described by an [`ExtensionDescriptor`] and wired through
//! the [`ExtensionManager`].

mod descriptor;
mod manager;

pub use descriptor::{
    ComponentSummary, ConfigurationDescriptor, ExtensionDescriptor, ExtensionSummary, OperationDescriptor,
    ParameterSummary,
};
pub use manager::{ExtensionManager, ParameterValues};
