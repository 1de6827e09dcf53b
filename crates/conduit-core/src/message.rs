//! Message Model
//!
//! The in-flight unit a pipeline processes: a body (payload plus scoped
//! properties) and flow variables that live for the whole flow.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Scope of a message property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyScope {
    /// Set by whatever delivered the message
    Inbound,
    /// Visible while the current flow runs
    Invocation,
    /// Handed to whatever receives the message next
    Outbound,
}

/// Payload and scoped properties of a message
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MessageBody {
    /// Main content
    pub payload: Value,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub inbound: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub invocation: IndexMap<String, Value>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub outbound: IndexMap<String, Value>,
}

impl MessageBody {
    /// Create a body carrying the given payload
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    /// Get a property from a scope
    pub fn property(&self, scope: PropertyScope, name: &str) -> Option<&Value> {
        self.scope(scope).get(name)
    }

    /// Set a property in a scope
    pub fn set_property(&mut self, scope: PropertyScope, name: impl Into<String>, value: impl Into<Value>) {
        self.scope_mut(scope).insert(name.into(), value.into());
    }

    /// Remove a property from a scope
    pub fn remove_property(&mut self, scope: PropertyScope, name: &str) -> Option<Value> {
        self.scope_mut(scope).shift_remove(name)
    }

    /// All properties of a scope
    pub fn scope(&self, scope: PropertyScope) -> &IndexMap<String, Value> {
        match scope {
            PropertyScope::Inbound => &self.inbound,
            PropertyScope::Invocation => &self.invocation,
            PropertyScope::Outbound => &self.outbound,
        }
    }

    fn scope_mut(&mut self, scope: PropertyScope) -> &mut IndexMap<String, Value> {
        match scope {
            PropertyScope::Inbound => &mut self.inbound,
            PropertyScope::Invocation => &mut self.invocation,
            PropertyScope::Outbound => &mut self.outbound,
        }
    }
}

/// A message travelling through a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: Uuid,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Payload and properties
    pub body: MessageBody,
    /// Flow-local variables
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub flow_vars: IndexMap<String, Value>,
}

impl Message {
    /// Create a new message with the given payload
    pub fn new(payload: impl Into<Value>) -> Self {
        Self::with_body(MessageBody::new(payload))
    }

    /// Create a new message with the given body
    pub fn with_body(body: MessageBody) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            body,
            flow_vars: IndexMap::new(),
        }
    }

    pub fn payload(&self) -> &Value {
        &self.body.payload
    }

    pub fn set_payload(&mut self, payload: impl Into<Value>) {
        self.body.payload = payload.into();
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Replace the body, keeping the message identity and flow variables
    pub fn set_body(&mut self, body: MessageBody) {
        self.body = body;
    }

    pub fn flow_var(&self, name: &str) -> Option<&Value> {
        self.flow_vars.get(name)
    }

    pub fn set_flow_var(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.flow_vars.insert(name.into(), value.into());
    }

    pub fn remove_flow_var(&mut self, name: &str) -> Option<Value> {
        self.flow_vars.shift_remove(name)
    }

    pub fn property(&self, scope: PropertyScope, name: &str) -> Option<&Value> {
        self.body.property(scope, name)
    }

    pub fn set_property(&mut self, scope: PropertyScope, name: impl Into<String>, value: impl Into<Value>) {
        self.body.set_property(scope, name, value);
    }

    /// Builder-style flow variable setter
    pub fn with_flow_var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_flow_var(name, value);
        self
    }

    /// Builder-style property setter
    pub fn with_property(
        mut self,
        scope: PropertyScope,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.set_property(scope, name, value);
        self
    }

    /// Payload rendered as text: strings verbatim, everything else as JSON
    pub fn payload_as_string(&self) -> String {
        match &self.body.payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
