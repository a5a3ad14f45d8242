//! Output message shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One line of generator output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "message_type")]
pub enum Message {
    #[serde(rename = "command_creation")]
    Command(CommandMessage),
    #[serde(rename = "sentinel")]
    Sentinel(SentinelMessage),
}

impl Message {
    pub fn message_id(&self) -> &str {
        match self {
            Message::Command(c) => &c.message_id,
            Message::Sentinel(s) => &s.message_id,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            Message::Command(c) => c.correlation_id.as_deref(),
            Message::Sentinel(s) => Some(&s.correlation_id),
        }
    }
}

impl From<CommandMessage> for Message {
    fn from(m: CommandMessage) -> Self {
        Message::Command(m)
    }
}

impl From<SentinelMessage> for Message {
    fn from(m: SentinelMessage) -> Self {
        Message::Sentinel(m)
    }
}

/// A command for the consumer to execute.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandMessage {
    pub message_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    pub command_invocation_directory: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_command: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positional_arguments: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positional_arguments_before_flagged_arguments: Vec<String>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub flagged_arguments: Map<String, Value>,

    /// ISO-8601, second precision.
    pub timestamp_created: String,

    /// Template fields passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Marks the correlated work complete once `completion_marker_file` exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentinelMessage {
    pub message_id: String,
    pub correlation_id: String,
    pub context: SentinelContext,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SentinelContext {
    pub completion_marker_file: String,
}
