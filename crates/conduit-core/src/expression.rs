//! Expression Evaluation
//!
//! Dynamic parameter values are written as `#[...]` expressions evaluated
//! against the current message. The evaluator is a capability the runtime
//! receives; [`MessageExpressionEvaluator`] is the built-in one.
//!
//! Supported expressions:
//!
//! - `#[payload]`, `#[payload.field]`, `#[payload[0]]`, `#[payload['some key']]`
//! - `#[flowVars.name]`, `#[flowVars['name']]`
//! - `#[message.id]`, `#[message.createdAt]`, `#[message.payload.field]`
//! - `#[inboundProperties.name]`, `#[invocationProperties.name]`,
//!   `#[outboundProperties.name]`
//! - literals: `#['text']`, `#[42]`, `#[1.5]`, `#[true]`, `#[null]`
//!
//! Text mixing expressions with other characters is a template: every
//! expression is rendered to text and spliced in place.

use serde_json::Value;

use crate::error::ExpressionError;
use crate::message::{Message, PropertyScope};

const OPEN: &str = "#[";

/// Evaluates expressions against messages
pub trait ExpressionEvaluator: Send + Sync {
    /// Whether `text` contains at least one expression
    fn is_expression(&self, text: &str) -> bool;

    /// Evaluate a single `#[...]` expression to a typed value
    fn evaluate(&self, expression: &str, message: &Message) -> Result<Value, ExpressionError>;

    /// Render a template, replacing every expression with its text form
    fn parse(&self, template: &str, message: &Message) -> Result<String, ExpressionError>;

    /// If `text` is exactly one expression, return its inner source
    fn single_expression<'a>(&self, text: &'a str) -> Option<&'a str> {
        let trimmed = text.trim();
        let inner = trimmed.strip_prefix(OPEN)?;
        let end = find_close(inner)?;
        (end == inner.len() - 1).then(|| &inner[..end])
    }
}

/// Built-in evaluator over payload, flow variables and properties
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageExpressionEvaluator;

impl MessageExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn eval_inner(&self, source: &str, message: &Message) -> Result<Value, ExpressionError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(ExpressionError::syntax(source, "empty expression"));
        }

        if let Some(literal) = parse_literal(source)? {
            return Ok(literal);
        }

        let (root, segments) = parse_path(source)?;
        let mut segments = segments.into_iter();

        let start = match root.as_str() {
            "payload" => message.payload().clone(),
            "flowVars" => {
                let Some(name) = segments.next() else {
                    return Ok(Value::Object(
                        message.flow_vars.clone().into_iter().collect(),
                    ));
                };
                message
                    .flow_var(&name.as_key())
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            "message" => {
                let Some(field) = segments.next() else {
                    return serde_json::to_value(message)
                        .map_err(|e| ExpressionError::evaluation(source, e.to_string()));
                };
                match field.as_key().as_str() {
                    "id" => Value::String(message.id.to_string()),
                    "createdAt" => Value::String(message.created_at.to_rfc3339()),
                    "payload" => message.payload().clone(),
                    other => {
                        return Err(ExpressionError::evaluation(
                            source,
                            format!("message has no field '{}'", other),
                        ));
                    }
                }
            }
            "inboundProperties" | "invocationProperties" | "outboundProperties" => {
                let scope = match root.as_str() {
                    "inboundProperties" => PropertyScope::Inbound,
                    "invocationProperties" => PropertyScope::Invocation,
                    _ => PropertyScope::Outbound,
                };
                let Some(name) = segments.next() else {
                    return Ok(Value::Object(
                        message.body().scope(scope).clone().into_iter().collect(),
                    ));
                };
                message
                    .property(scope, &name.as_key())
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            _ => {
                return Err(ExpressionError::UnknownRoot {
                    expression: source.to_string(),
                    root: root.clone(),
                });
            }
        };

        Ok(segments.fold(start, |value, segment| segment.apply(value)))
    }
}

impl ExpressionEvaluator for MessageExpressionEvaluator {
    fn is_expression(&self, text: &str) -> bool {
        text.contains(OPEN)
    }

    fn evaluate(&self, expression: &str, message: &Message) -> Result<Value, ExpressionError> {
        match self.single_expression(expression) {
            Some(inner) => self.eval_inner(inner, message),
            None if expression.trim_start().starts_with(OPEN) => Err(ExpressionError::syntax(
                expression,
                "unterminated expression",
            )),
            None => self.eval_inner(expression, message),
        }
    }

    fn parse(&self, template: &str, message: &Message) -> Result<String, ExpressionError> {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let inner = &rest[start + OPEN.len()..];
            let end = find_close(inner)
                .ok_or_else(|| ExpressionError::syntax(template, "unterminated expression"))?;

            match self.eval_inner(&inner[..end], message)? {
                Value::String(s) => out.push_str(&s),
                other => out.push_str(&other.to_string()),
            }
            rest = &inner[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}

/// Evaluator for runtimes with expressions switched off
///
/// No text is an expression, so every string parameter stays a literal.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralEvaluator;

impl ExpressionEvaluator for LiteralEvaluator {
    fn is_expression(&self, _text: &str) -> bool {
        false
    }

    fn evaluate(&self, expression: &str, _message: &Message) -> Result<Value, ExpressionError> {
        Err(ExpressionError::evaluation(expression, "expressions are disabled"))
    }

    fn parse(&self, template: &str, _message: &Message) -> Result<String, ExpressionError> {
        Ok(template.to_string())
    }

    fn single_expression<'a>(&self, _text: &'a str) -> Option<&'a str> {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Field(String),
    Index(usize),
}

impl Segment {
    fn as_key(&self) -> String {
        match self {
            Segment::Field(name) => name.clone(),
            Segment::Index(i) => i.to_string(),
        }
    }

    fn apply(&self, value: Value) -> Value {
        match (self, value) {
            (Segment::Field(name), Value::Object(mut map)) => map.remove(name).unwrap_or(Value::Null),
            (Segment::Index(i), Value::Array(mut items)) if *i < items.len() => items.swap_remove(*i),
            (Segment::Field(name), Value::Array(items)) if name == "length" => Value::from(items.len()),
            (Segment::Field(name), Value::String(s)) if name == "length" => Value::from(s.chars().count()),
            _ => Value::Null,
        }
    }
}

/// Position of the `]` closing an expression whose `#[` was already consumed
fn find_close(inner: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for (i, c) in inner.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '[' => depth += 1,
                ']' if depth == 0 => return Some(i),
                ']' => depth -= 1,
                _ => {}
            },
        }
    }

    None
}

fn parse_literal(source: &str) -> Result<Option<Value>, ExpressionError> {
    let first = source.chars().next().unwrap_or_default();

    if first == '\'' || first == '"' {
        let body = &source[1..];
        return match body.strip_suffix(first) {
            Some(text) if !text.contains(first) => Ok(Some(Value::String(text.to_string()))),
            _ => Err(ExpressionError::syntax(source, "unterminated string literal")),
        };
    }

    match source {
        "true" => return Ok(Some(Value::Bool(true))),
        "false" => return Ok(Some(Value::Bool(false))),
        "null" => return Ok(Some(Value::Null)),
        _ => {}
    }

    if first.is_ascii_digit() || first == '-' {
        if let Ok(i) = source.parse::<i64>() {
            return Ok(Some(Value::from(i)));
        }
        if let Ok(f) = source.parse::<f64>() {
            return Ok(Some(Value::from(f)));
        }
        return Err(ExpressionError::syntax(source, "invalid number literal"));
    }

    Ok(None)
}

fn parse_path(source: &str) -> Result<(String, Vec<Segment>), ExpressionError> {
    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0;

    let root = read_ident(&chars, &mut pos);
    if root.is_empty() {
        return Err(ExpressionError::syntax(source, "expected an identifier"));
    }

    let mut segments = Vec::new();
    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                pos += 1;
                let ident = read_ident(&chars, &mut pos);
                if ident.is_empty() {
                    return Err(ExpressionError::syntax(source, "expected a field name after '.'"));
                }
                segments.push(Segment::Field(ident));
            }
            '[' => {
                pos += 1;
                let close = chars[pos..]
                    .iter()
                    .position(|&c| c == ']')
                    .map(|offset| pos + offset)
                    .ok_or_else(|| ExpressionError::syntax(source, "missing ']'"))?;
                let key: String = chars[pos..close].iter().collect();
                let key = key.trim();

                let segment = if let Some(Value::String(s)) = parse_literal(key)? {
                    Segment::Field(s)
                } else if let Ok(i) = key.parse::<usize>() {
                    Segment::Index(i)
                } else {
                    return Err(ExpressionError::syntax(
                        source,
                        format!("invalid index '{}'", key),
                    ));
                };
                segments.push(segment);
                pos = close + 1;
            }
            c if c.is_whitespace() => pos += 1,
            c => {
                return Err(ExpressionError::syntax(
                    source,
                    format!("unexpected character '{}'", c),
                ));
            }
        }
    }

    Ok((root, segments))
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && (chars[*pos].is_alphanumeric() || matches!(chars[*pos], '_' | '-')) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}
