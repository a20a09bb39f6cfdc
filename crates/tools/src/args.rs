//! Argument helpers shared by the hotel tools.

use serde::Deserialize;
use staybot_core::error::ToolError;

/// A numeric argument. Models occasionally quote numbers, so numeric strings
/// are accepted too.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberArg {
    Number(serde_json::Number),
    Text(String),
}

impl NumberArg {
    /// The argument as a JSON number.
    pub fn to_number(&self, tool_name: &str, field: &str) -> Result<serde_json::Number, ToolError> {
        match self {
            NumberArg::Number(n) => Ok(n.clone()),
            NumberArg::Text(s) => {
                let s = s.trim();
                if let Ok(i) = s.parse::<i64>() {
                    return Ok(i.into());
                }
                s.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .ok_or_else(|| invalid(tool_name, field, s))
            }
        }
    }

    /// The argument as a float.
    pub fn to_f64(&self, tool_name: &str, field: &str) -> Result<f64, ToolError> {
        let n = self.to_number(tool_name, field)?;
        n.as_f64().ok_or_else(|| invalid(tool_name, field, &n.to_string()))
    }
}

fn invalid(tool_name: &str, field: &str, value: &str) -> ToolError {
    ToolError::InvalidArguments {
        tool_name: tool_name.to_string(),
        reason: format!("'{field}' must be a number, got '{value}'"),
    }
}
