//! Documents exchanged with the caller.

use serde::{Deserialize, Deserializer, Serialize};

/// Input document read from stdin.
///
/// Unknown top-level fields are ignored.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Input {
    /// Named parameters, in arrival order. `null` reads as none.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub params: Vec<Parameter>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Parameter>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

/// A single named parameter. Both halves are plain text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Parameter {
    /// Parameter name, matched case-insensitively.
    #[serde(rename = "inputname", default)]
    pub name: String,
    /// Parameter value, trimmed before use.
    #[serde(rename = "compvalue", default)]
    pub value: String,
}

impl Parameter {
    /// Create a parameter from a name and a value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Parameter {
        Parameter {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Output document written to stdout, exactly once per invocation.
///
/// `error` is empty on success. A `null` result with an empty error means
/// the key was not found.
#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Output {
    /// Outcome of the operation, `null` when absent or failed.
    pub result: serde_json::Value,
    /// Human-readable failure, empty on success.
    pub error: String,
}

impl Output {
    /// Successful envelope.
    pub fn result(result: impl Into<serde_json::Value>) -> Output {
        Output {
            result: result.into(),
            error: String::new(),
        }
    }

    /// Failed envelope; `result` stays `null`.
    pub fn error(error: impl ToString) -> Output {
        Output {
            result: serde_json::Value::Null,
            error: error.to_string(),
        }
    }

    /// Whether this envelope reports a failure.
    pub fn is_error(&self) -> bool {
        !self.error.is_empty()
    }
}
