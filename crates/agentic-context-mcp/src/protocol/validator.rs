//! Parameter schemas checked before a handler runs.

use serde_json::{json, Map, Value};

use crate::types::{McpError, McpResult};

/// JSON type a parameter must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Any => "any",
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::Array => value.is_array(),
            ParamType::Any => true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub description: &'static str,
}

/// Named parameters of one method. Unknown parameters are ignored.
#[derive(Debug, Clone, Default)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
}

impl ParamSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, ty: ParamType, description: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            ty,
            required: true,
            description,
        });
        self
    }

    pub fn optional(mut self, name: &'static str, ty: ParamType, description: &'static str) -> Self {
        self.params.push(ParamSpec {
            name,
            ty,
            required: false,
            description,
        });
        self
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Reject missing required params and values of the wrong type.
    /// An optional param given as `null` counts as absent.
    pub fn validate(&self, params: &Map<String, Value>) -> McpResult<()> {
        for param in &self.params {
            match params.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(McpError::InvalidParams(format!(
                        "Missing required parameter '{}'",
                        param.name
                    )));
                }
                None | Some(Value::Null) => {}
                Some(value) if !param.ty.matches(value) => {
                    return Err(McpError::InvalidParams(format!(
                        "Parameter '{}' must be of type {}",
                        param.name,
                        param.ty.as_str()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Render as a JSON Schema object for `tools/list`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        for param in &self.params {
            let mut property = Map::new();
            if param.ty != ParamType::Any {
                property.insert("type".into(), json!(param.ty.as_str()));
            }
            if !param.description.is_empty() {
                property.insert("description".into(), json!(param.description));
            }
            properties.insert(param.name.to_string(), Value::Object(property));
            if param.required {
                required.push(param.name);
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A string param that the schema has already marked required.
pub fn required_str<'a>(params: &'a Map<String, Value>, name: &str) -> McpResult<&'a str> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::InvalidParams(format!("Missing required parameter '{name}'")))
}

pub fn optional_str<'a>(params: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    params.get(name).and_then(Value::as_str)
}
