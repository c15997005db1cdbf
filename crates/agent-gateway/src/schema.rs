//! Typed input schemas for tool arguments.
//!
//! Validation runs before the handler: a failing argument set returns
//! `invalid_params` and the handler is never invoked.

use serde_json::{json, Map, Value};

use host_types::{HostError, HostResult};

/// Primitive kinds accepted in tool arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    StringArray,
    Object,
}

impl FieldKind {
    fn json_name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::StringArray => "array",
            FieldKind::Object => "object",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Integer => value.is_i64() || value.is_u64(),
            FieldKind::Boolean => value.is_boolean(),
            FieldKind::StringArray => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            FieldKind::Object => value.is_object(),
        }
    }
}

/// One argument field with its constraints.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub description: &'static str,
    /// Closed value set, for string fields.
    pub allowed: Option<&'static [&'static str]>,
}

impl FieldSpec {
    pub fn required(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
            allowed: None,
        }
    }

    pub fn optional(name: &'static str, kind: FieldKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
            allowed: None,
        }
    }

    pub fn with_allowed(mut self, allowed: &'static [&'static str]) -> Self {
        self.allowed = Some(allowed);
        self
    }
}

/// The full argument schema of a tool.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: Vec<FieldSpec>,
}

impl InputSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Validate an argument object against the schema.
    ///
    /// Unknown fields pass through untouched; missing required fields,
    /// type mismatches, and out-of-set values fail.
    pub fn validate(&self, args: &Value) -> HostResult<()> {
        let object: &Map<String, Value> = match args {
            Value::Object(map) => map,
            Value::Null => {
                if self.fields.iter().any(|f| f.required) {
                    return Err(HostError::invalid_params("missing arguments"));
                }
                return Ok(());
            }
            _ => return Err(HostError::invalid_params("arguments must be an object")),
        };

        for field in &self.fields {
            let value = match object.get(field.name) {
                Some(value) if !value.is_null() => value,
                _ => {
                    if field.required {
                        return Err(HostError::invalid_params(format!(
                            "missing required field: {}",
                            field.name
                        )));
                    }
                    continue;
                }
            };

            if !field.kind.matches(value) {
                return Err(HostError::invalid_params(format!(
                    "field {} must be of type {}",
                    field.name,
                    field.kind.json_name()
                )));
            }

            if let (Some(allowed), Some(s)) = (field.allowed, value.as_str()) {
                if !allowed.contains(&s) {
                    return Err(HostError::invalid_params(format!(
                        "field {} must be one of: {}",
                        field.name,
                        allowed.join(", ")
                    )));
                }
            }
        }

        Ok(())
    }

    /// JSON-schema rendering for `tools/list`.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in &self.fields {
            let mut spec = Map::new();
            spec.insert("type".into(), json!(field.kind.json_name()));
            spec.insert("description".into(), json!(field.description));
            if field.kind == FieldKind::StringArray {
                spec.insert("items".into(), json!({"type": "string"}));
            }
            if let Some(allowed) = field.allowed {
                spec.insert("enum".into(), json!(allowed));
            }
            properties.insert(field.name.to_string(), Value::Object(spec));
            if field.required {
                required.push(json!(field.name));
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}
