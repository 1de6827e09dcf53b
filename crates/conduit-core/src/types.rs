//! Data Types and Parameters
//!
//! Semantic data types form a single-inheritance hierarchy rooted at
//! `object`. Parameters pair a name with one of those types.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Data Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct DataTypeInner {
    name: String,
    parent: Option<DataType>,
}

/// A named semantic data type with an optional parent
///
/// Two data types are equal when their names are equal, so type names must be
/// unique across a runtime.
#[derive(Clone)]
pub struct DataType(Arc<DataTypeInner>);

static OBJECT: LazyLock<DataType> = LazyLock::new(|| DataType::root("object"));
static STRING: LazyLock<DataType> = LazyLock::new(|| DataType::child_of("string", &OBJECT));
static NUMBER: LazyLock<DataType> = LazyLock::new(|| DataType::child_of("number", &OBJECT));
static INTEGER: LazyLock<DataType> = LazyLock::new(|| DataType::child_of("integer", &NUMBER));
static BOOLEAN: LazyLock<DataType> = LazyLock::new(|| DataType::child_of("boolean", &OBJECT));
static ARRAY: LazyLock<DataType> = LazyLock::new(|| DataType::child_of("array", &OBJECT));
static MAP: LazyLock<DataType> = LazyLock::new(|| DataType::child_of("map", &OBJECT));
static NULL: LazyLock<DataType> = LazyLock::new(|| DataType::child_of("null", &OBJECT));

impl DataType {
    fn root(name: &str) -> Self {
        Self(Arc::new(DataTypeInner {
            name: name.to_string(),
            parent: None,
        }))
    }

    /// Declare a new type directly under `object`
    pub fn new(name: impl Into<String>) -> Self {
        Self::child_of(name, &OBJECT)
    }

    /// Declare a new type as a child of `parent`
    pub fn child_of(name: impl Into<String>, parent: &DataType) -> Self {
        Self(Arc::new(DataTypeInner {
            name: name.into(),
            parent: Some(parent.clone()),
        }))
    }

    pub fn object() -> Self {
        OBJECT.clone()
    }

    pub fn string() -> Self {
        STRING.clone()
    }

    pub fn number() -> Self {
        NUMBER.clone()
    }

    pub fn integer() -> Self {
        INTEGER.clone()
    }

    pub fn boolean() -> Self {
        BOOLEAN.clone()
    }

    pub fn array() -> Self {
        ARRAY.clone()
    }

    pub fn map() -> Self {
        MAP.clone()
    }

    pub fn null() -> Self {
        NULL.clone()
    }

    /// All built-in types, root first
    pub fn builtins() -> Vec<Self> {
        vec![
            Self::object(),
            Self::string(),
            Self::number(),
            Self::integer(),
            Self::boolean(),
            Self::array(),
            Self::map(),
            Self::null(),
        ]
    }

    /// Look up a built-in type by name
    pub fn builtin(name: &str) -> Option<Self> {
        Self::builtins().into_iter().find(|t| t.name() == name)
    }

    /// The built-in type describing a JSON value
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::null(),
            Value::Bool(_) => Self::boolean(),
            Value::Number(n) if n.is_i64() || n.is_u64() => Self::integer(),
            Value::Number(_) => Self::number(),
            Value::String(_) => Self::string(),
            Value::Array(_) => Self::array(),
            Value::Object(_) => Self::map(),
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&DataType> {
        self.0.parent.as_ref()
    }

    /// Iterate this type and its ancestors, nearest first
    pub fn ancestry(&self) -> impl Iterator<Item = &DataType> {
        std::iter::successors(Some(self), |t| t.parent())
    }

    /// Number of steps up the hierarchy from `self` to `ancestor`,
    /// or `None` if `ancestor` is not `self` or one of its ancestors
    pub fn distance_to(&self, ancestor: &DataType) -> Option<usize> {
        self.ancestry().position(|t| t == ancestor)
    }

    /// Whether a value of type `other` can be used where `self` is expected
    pub fn is_assignable_from(&self, other: &DataType) -> bool {
        other.distance_to(self).is_some()
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.name == other.0.name
    }
}

impl Eq for DataType {}

impl Hash for DataType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataType({})", self.name())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parameters
// ─────────────────────────────────────────────────────────────────────────────

/// A declared parameter of a configuration or operation
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Parameter name (unique within its owner)
    pub name: String,
    /// Semantic data type
    pub data_type: DataType,
    /// Whether a value must be supplied
    pub required: bool,
    /// Value used when none is supplied; strings may be expressions
    pub default: Option<Value>,
    /// Description for listings
    pub description: Option<String>,
}

impl Parameter {
    /// A required parameter
    pub fn required(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: true,
            default: None,
            description: None,
        }
    }

    /// An optional parameter with no default
    pub fn optional(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            required: false,
            ..Self::required(name, data_type)
        }
    }

    /// Set the default value (makes the parameter optional)
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self.required = false;
        self
    }

    /// Set the description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// How a value supplied for a parameter at wiring time should be resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    /// A fixed value; strings holding expressions become dynamic
    Literal(Value),
    /// An expression evaluated per message
    Expression(String),
    /// An ordered list of values
    List(Vec<ParameterValue>),
    /// A list without duplicates, first occurrence kept
    Set(Vec<ParameterValue>),
    /// The instance of a named configuration
    ConfigRef(String),
}

impl ParameterValue {
    /// Convert a plain JSON value: arrays become lists, everything else a literal
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            other => Self::Literal(other),
        }
    }
}

impl From<Value> for ParameterValue {
    fn from(value: Value) -> Self {
        Self::from_json(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_distance_and_assignability() {
        let fruit = DataType::new("fruit");
        let orange = DataType::child_of("orange", &fruit);
        let blood_orange = DataType::child_of("blood-orange", &orange);

        assert_eq!(blood_orange.distance_to(&blood_orange), Some(0));
        assert_eq!(blood_orange.distance_to(&orange), Some(1));
        assert_eq!(blood_orange.distance_to(&DataType::object()), Some(3));
        assert_eq!(orange.distance_to(&blood_orange), None);

        assert!(fruit.is_assignable_from(&blood_orange));
        assert!(!blood_orange.is_assignable_from(&fruit));
        assert!(DataType::object().is_assignable_from(&fruit));
    }

    #[test]
    fn test_of_value() {
        assert_eq!(DataType::of_value(&json!(1)), DataType::integer());
        assert_eq!(DataType::of_value(&json!(1.5)), DataType::number());
        assert_eq!(DataType::of_value(&json!("x")), DataType::string());
        assert_eq!(DataType::of_value(&json!({"a": 1})), DataType::map());
        assert!(DataType::number().is_assignable_from(&DataType::of_value(&json!(3))));
    }

    #[test]
    fn test_parameter_default_makes_optional() {
        let p = Parameter::required("separator", DataType::string()).with_default(" ");
        assert!(!p.required);
        assert_eq!(p.default, Some(json!(" ")));
    }

    #[test]
    fn test_parameter_value_from_json() {
        let value = ParameterValue::from_json(json!(["a", 1]));
        assert_eq!(
            value,
            ParameterValue::List(vec![
                ParameterValue::Literal(json!("a")),
                ParameterValue::Literal(json!(1)),
            ])
        );
    }
}
