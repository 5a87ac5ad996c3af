use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String, // "function"
    pub function: Function,
}

impl Tool {
    /// Build a function tool from a name, description and JSON schema
    pub fn function(
        name: impl Into<String>,
        description: Option<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: Function {
                name: name.into(),
                description,
                parameters,
                strict: None,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Function {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Value, // JSON Schema
    /// Whether to enable strict schema adherence (OpenAI structured outputs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
}

/// Tool choice value for simple string options
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoiceValue {
    Auto,
    Required,
    None,
}

/// Tool choice as sent by the client
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ToolChoice {
    Value(ToolChoiceValue),
    Function {
        #[serde(rename = "type")]
        tool_type: String, // "function"
        function: FunctionChoice,
    },
}

impl Default for ToolChoice {
    fn default() -> Self {
        Self::Value(ToolChoiceValue::Auto)
    }
}

/// Named function selected by ToolChoice::Function
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FunctionChoice {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_choice_deserialize_value() {
        let choice: ToolChoice = serde_json::from_value(json!("required")).unwrap();
        assert!(matches!(
            choice,
            ToolChoice::Value(ToolChoiceValue::Required)
        ));
    }

    #[test]
    fn test_tool_choice_deserialize_function() {
        let choice: ToolChoice = serde_json::from_value(json!({
            "type": "function",
            "function": {"name": "get_weather"}
        }))
        .unwrap();
        match choice {
            ToolChoice::Function { function, .. } => assert_eq!(function.name, "get_weather"),
            other => panic!("unexpected tool choice: {:?}", other),
        }
    }

    #[test]
    fn test_tool_deserialize_without_description() {
        let tool: Tool = serde_json::from_value(json!({
            "type": "function",
            "function": {"name": "noop", "parameters": {"type": "object"}}
        }))
        .unwrap();
        assert_eq!(tool.function.name, "noop");
        assert!(tool.function.description.is_none());
    }
}
