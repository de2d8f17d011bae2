//! Argument schemas advertised to the model alongside each tool.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// The `input_schema` sent with a tool definition. Always an object schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentToolParameters {
    pub schema: Value,
}

impl AgentToolParameters {
    /// Use a schema published elsewhere, such as by an MCP server.
    pub fn from_schema(schema: Value) -> Self {
        Self { schema }
    }

    /// For tools that take no arguments.
    pub fn empty() -> Self {
        Self::object().build()
    }

    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

/// Flat object schema: every GitHub tool argument is a string or an integer.
pub struct ParameterBuilder {
    properties: Map<String, Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    fn property(mut self, name: impl Into<String>, kind: &str, description: impl Into<String>, required: bool) -> Self {
        let name = name.into();
        self.properties
            .insert(name.clone(), json!({ "type": kind, "description": description.into() }));
        if required {
            self.required.push(name);
        }
        self
    }

    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(name, "string", description, required)
    }

    pub fn integer(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(name, "integer", description, required)
    }

    pub fn build(self) -> AgentToolParameters {
        AgentToolParameters {
            schema: json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}
