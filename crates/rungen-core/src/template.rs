//! Command templates loaded from the caller's JSON config.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, RungenError};

/// Keys stamped by the builder; stale copies in a template are discarded.
const RESERVED_KEYS: &[&str] = &[
    "message_id",
    "message_type",
    "timestamp_created",
    "command_id",
    "timestamp_command_created",
];

/// Base command template shared by every run in one invocation.
///
/// Either `positional_arguments_before_flagged_arguments` (pipeline style,
/// first element is the pipeline name) or `base_command` (plain command style)
/// must name the command. Unknown fields are carried into every message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CommandTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positional_arguments: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positional_arguments_before_flagged_arguments: Vec<String>,

    #[serde(default)]
    pub flagged_arguments: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_invocation_directory: Option<String>,

    /// Pre-set correlation id, carried through unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommandTemplate {
    /// Parse and validate a template.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let mut template: CommandTemplate = serde_json::from_str(json)
            .map_err(|e| RungenError::Config(format!("template is not valid JSON: {e}")))?;
        for key in RESERVED_KEYS {
            template.extra.remove(*key);
        }
        if template
            .correlation_id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            template.correlation_id = None;
        }
        template.command_name()?;
        Ok(template)
    }

    /// Pipeline or base command name.
    pub fn command_name(&self) -> Result<&str> {
        self.positional_arguments_before_flagged_arguments
            .first()
            .or(self.base_command.as_ref())
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                RungenError::Config(
                    "template names no command: set positional_arguments_before_flagged_arguments[0] or base_command"
                        .to_string(),
                )
            })
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flagged_arguments.contains_key(flag)
    }
}

/// Whether a flag value counts as "not filled in yet".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}
