use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{AgentError, AgentResult};

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// A JSON Schema object describing the input the tool accepts
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Names of the required input properties, in schema order
    pub fn required(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default()
    }

    /// Check that every required property is present in the input object
    pub fn validate_input(&self, input: &Value) -> AgentResult<()> {
        let object = input.as_object().ok_or_else(|| {
            AgentError::InvalidParameters(format!("{} expects an object input", self.name))
        })?;
        for field in self.required() {
            if !object.contains_key(field) {
                return Err(AgentError::InvalidParameters(format!(
                    "{} parameter required",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// A tool call request that a system can execute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// The name of the tool to execute
    pub name: String,
    /// The input for the execution
    pub input: Value,
}

impl ToolCall {
    pub fn new<S: Into<String>>(name: S, input: Value) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }
}

/// The outcome of executing a tool, as carried back to the model and to the client.
///
/// Each outcome is an object with exactly one key naming it: `{"ok": <tool output>}`,
/// `{"error": "..."}` for a failure reported by the tool and `{"unavailable": "..."}` when the
/// tool could not be reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ToolOutput {
    #[serde(rename = "ok")]
    Success(Value),
    #[serde(rename = "error")]
    Failure(String),
    #[serde(rename = "unavailable")]
    Unavailable(String),
}

impl ToolOutput {
    pub fn success(value: Value) -> Self {
        ToolOutput::Success(value)
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, ToolOutput::Success(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ToolOutput::Unavailable(_))
    }

    /// The content handed back to the model: the raw output on success
    pub fn to_value(&self) -> Value {
        match self {
            ToolOutput::Success(value) => value.clone(),
            ToolOutput::Failure(error) => json!({ "error": error }),
            ToolOutput::Unavailable(reason) => json!({ "unavailable": reason }),
        }
    }
}

impl From<AgentResult<Value>> for ToolOutput {
    fn from(result: AgentResult<Value>) -> Self {
        match result {
            Ok(value) => ToolOutput::Success(value),
            Err(err) if err.is_infrastructure() => ToolOutput::Unavailable(err.to_string()),
            Err(err) => ToolOutput::Failure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_output_shapes() {
        let ok: ToolOutput = Ok(json!({"result": "y"})).into();
        assert_eq!(ok.to_value(), json!({"result": "y"}));
        assert!(!ok.is_error());

        let failed: ToolOutput = Err(AgentError::ToolNotFound("nope".into())).into();
        assert_eq!(failed.to_value(), json!({"error": "Tool not found: nope"}));
        assert!(failed.is_error());
        assert!(!failed.is_unavailable());

        let down: ToolOutput = Err(AgentError::Unavailable("connection refused".into())).into();
        assert_eq!(
            down.to_value(),
            json!({"unavailable": "Tool unavailable: connection refused"})
        );
        assert!(down.is_unavailable());
    }

    #[test]
    fn test_tool_output_wire_shapes() {
        assert_eq!(
            serde_json::to_value(ToolOutput::success(json!({"result": "y"}))).unwrap(),
            json!({"ok": {"result": "y"}})
        );
        assert_eq!(
            serde_json::to_value(ToolOutput::Failure("bad".into())).unwrap(),
            json!({"error": "bad"})
        );
        assert_eq!(
            serde_json::to_value(ToolOutput::Unavailable("gone".into())).unwrap(),
            json!({"unavailable": "gone"})
        );

        let down: ToolOutput = serde_json::from_value(json!({"unavailable": "gone"})).unwrap();
        assert!(down.is_unavailable());
        let ok: ToolOutput = serde_json::from_value(json!({"ok": ["a", 1]})).unwrap();
        assert_eq!(ok, ToolOutput::Success(json!(["a", 1])));
    }

    #[test]
    fn test_success_that_looks_like_a_failure_stays_a_success() {
        let output = ToolOutput::success(json!({"error": "none", "rooms": [1, 2]}));
        let decoded: ToolOutput =
            serde_json::from_str(&serde_json::to_string(&output).unwrap()).unwrap();
        assert_eq!(decoded, output);
        assert!(!decoded.is_error());
    }

    #[test]
    fn test_ambiguous_outcomes_are_rejected() {
        // Untagged values and objects naming more than one outcome do not decode
        assert!(serde_json::from_value::<ToolOutput>(json!({"result": "y"})).is_err());
        assert!(
            serde_json::from_value::<ToolOutput>(json!({"error": "bad", "ok": 1})).is_err()
        );
        assert!(serde_json::from_str::<ToolOutput>(r#"{"error":"bad","rooms":[1]}"#).is_err());
    }

    #[test]
    fn test_validate_input() {
        let tool = Tool::new(
            "lookup",
            "Look something up",
            json!({"type": "object", "properties": {"q": {"type": "string"}}, "required": ["q"]}),
        );
        assert_eq!(tool.required(), vec!["q"]);
        assert!(tool.validate_input(&json!({"q": "x"})).is_ok());
        assert_eq!(
            tool.validate_input(&json!({})),
            Err(AgentError::InvalidParameters("q parameter required".into()))
        );
        assert!(tool.validate_input(&json!("x")).is_err());
    }
}
