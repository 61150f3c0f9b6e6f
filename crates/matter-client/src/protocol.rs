//! JSON messages exchanged with the Matter server over its WebSocket API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Highest server schema this client understands.
pub const SCHEMA_VERSION: u32 = 11;

/// API commands issued by this client.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApiCommand {
    StartListening,
    ReadAttribute,
    WriteAttribute,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CommandMessage {
    pub message_id: String,
    pub command: ApiCommand,
    pub args: Value,
}

/// Sent by the server once, right after the WebSocket handshake.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ServerInfoMessage {
    pub fabric_id: u64,
    pub compressed_fabric_id: u64,
    pub schema_version: u32,
    pub min_supported_schema_version: u32,
    pub sdk_version: String,
    #[serde(default)]
    pub wifi_credentials_set: bool,
    #[serde(default)]
    pub thread_credentials_set: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SuccessResultMessage {
    pub message_id: String,
    pub result: Value,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResultMessage {
    pub message_id: String,
    pub error_code: i32,
    #[serde(default)]
    pub details: Option<String>,
}

/// Unsolicited events (node updates, attribute changes, shutdown).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

/// Anything the server may send after the handshake.
///
/// Variant order matters: an error reply also carries `message_id`, so it has
/// to be tried before the success shape.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum IncomingMessage {
    Error(ErrorResultMessage),
    Success(SuccessResultMessage),
    Event(EventMessage),
    ServerInfo(ServerInfoMessage),
}

impl IncomingMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Serialize, Debug)]
pub(crate) struct ReadAttributeArgs<'a> {
    pub node_id: u64,
    pub attribute_path: &'a str,
}

#[derive(Serialize, Debug)]
pub(crate) struct WriteAttributeArgs<'a> {
    pub node_id: u64,
    pub attribute_path: &'a str,
    pub value: i64,
}

/// Pull the value for `path` out of a `read_attribute` result.
///
/// The server answers with a map keyed by path string. A `null` result, or a
/// map that lacks the requested key, means the attribute was not reported.
/// Any other shape is passed through unchanged.
pub fn extract_attribute_value(path: &str, result: Value) -> Option<Value> {
    match result {
        Value::Null => None,
        Value::Object(mut map) => map.remove(path),
        other => Some(other),
    }
}

/// First non-zero `Status` in a `write_attribute` result, if any.
pub fn write_failure_status(result: &Value) -> Option<i64> {
    let entries = result.as_array()?;
    entries
        .iter()
        .filter_map(|entry| entry.get("Status").and_then(Value::as_i64))
        .find(|status| *status != 0)
}
