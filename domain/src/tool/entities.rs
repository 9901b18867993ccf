//! Tool domain entities

use serde::{Deserialize, Serialize};

/// Description of a tool offered to the model (what `BindTools` receives)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique name of the tool (e.g., "current_time")
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: serde_json::Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back with the result
    pub id: String,
    pub name: String,
    /// Raw JSON arguments, as produced by the model
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the arguments as JSON. An empty argument string is an empty object.
    pub fn parsed_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_arguments() {
        let call = ToolCall::new("c1", "lookup", r#"{"query": "kant"}"#);
        assert_eq!(call.parsed_arguments().unwrap()["query"], "kant");

        let empty = ToolCall::new("c2", "current_time", "");
        assert_eq!(empty.parsed_arguments().unwrap(), serde_json::json!({}));

        let broken = ToolCall::new("c3", "lookup", "{");
        assert!(broken.parsed_arguments().is_err());
    }
}
