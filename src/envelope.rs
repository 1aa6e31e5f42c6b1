//! Wire envelope definitions
//!
//! A single JSON envelope shape serves as both request and response: a reply
//! is built by mutating a copy of the inbound envelope and re-encoding it.
//! Field names and discriminant strings are fixed by the wire protocol
//! (camelCase keys, kebab-case commands).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{ChannelId, GroupId, UserId};

/// Canned text placed in the reply to a successful connect
pub const MSG_CONNECTED: &str = "user connected successfully";
/// Canned text placed in the reply to a successful group join
pub const MSG_GROUP_JOINED: &str = "group joined successfully";

/// Command discriminant of an envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    /// Adopt an identity and join a channel
    UserConnect,
    /// Deliver a message to a direct or group target
    MessageSend,
    /// Join (creating if needed) a group in the current channel
    GroupJoin,
    /// Leave a group in the current channel
    GroupLeave,
}

/// User descriptor as it appears on the wire
///
/// Doubles as the adopted identity of a connected session. Target references
/// may carry only the `id`, so `name` tolerates absence on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<HashMap<String, String>>,
}

/// Channel descriptor as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInfo {
    pub id: ChannelId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<HashMap<String, String>>,
}

/// Group descriptor as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub id: GroupId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_info: Option<HashMap<String, String>>,
}

/// Message payload kind; only text is defined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
}

/// Message payload carried by `message-send` and success replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub text: String,
}

impl MessageBody {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Text,
            text: text.into(),
        }
    }
}

/// Delivery target kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Direct,
    Group,
}

/// Delivery target of a `message-send` command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    #[serde(rename = "type")]
    pub kind: TargetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupInfo>,
}

/// Response status code carried back to the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseCode {
    Success,
    InvalidPayload,
    UserTargetNotConnected,
    GroupTargetNotConnected,
}

/// Status + code attached to every reply envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub status: bool,
    pub message: ResponseCode,
}

impl ResponseInfo {
    pub fn success() -> Self {
        Self {
            status: true,
            message: ResponseCode::Success,
        }
    }

    pub fn failure(code: ResponseCode) -> Self {
        Self {
            status: false,
            message: code,
        }
    }
}

/// The request/response unit exchanged over the transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<MessageBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseInfo>,
}

impl Envelope {
    /// Bare envelope with only a command set
    pub fn new(command: Command) -> Self {
        Self {
            command,
            user: None,
            channel: None,
            group: None,
            message: None,
            target: None,
            response: None,
        }
    }

    pub fn decode(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_envelope_decode() {
        let json = r#"{
            "command": "user-connect",
            "user": {"id": "u1", "name": "Alice", "additionalInfo": {"role": "admin"}},
            "channel": {"id": "c1", "name": "general"}
        }"#;
        let env = Envelope::decode(json).unwrap();
        assert_eq!(env.command, Command::UserConnect);
        let user = env.user.unwrap();
        assert_eq!(user.id, UserId::new("u1"));
        assert_eq!(user.name, "Alice");
        assert_eq!(
            user.additional_info.unwrap().get("role").map(String::as_str),
            Some("admin")
        );
        assert_eq!(env.channel.unwrap().id, ChannelId::new("c1"));
        assert!(env.response.is_none());
    }

    #[test]
    fn test_target_with_bare_id_decodes() {
        let json = r#"{
            "command": "message-send",
            "message": {"type": "text", "text": "hi"},
            "target": {"type": "direct", "user": {"id": "u2"}}
        }"#;
        let env = Envelope::decode(json).unwrap();
        let target = env.target.unwrap();
        assert_eq!(target.kind, TargetKind::Direct);
        let user = target.user.unwrap();
        assert_eq!(user.id, UserId::new("u2"));
        assert_eq!(user.name, "");
    }

    #[test]
    fn test_response_code_wire_strings() {
        let resp = ResponseInfo::failure(ResponseCode::InvalidPayload);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"invalidPayload\""));
        assert!(json.contains("\"status\":false"));

        let resp = ResponseInfo::failure(ResponseCode::UserTargetNotConnected);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"userTargetNotConnected\""));
    }

    #[test]
    fn test_command_wire_strings() {
        for (cmd, wire) in [
            (Command::UserConnect, "\"user-connect\""),
            (Command::MessageSend, "\"message-send\""),
            (Command::GroupJoin, "\"group-join\""),
            (Command::GroupLeave, "\"group-leave\""),
        ] {
            assert_eq!(serde_json::to_string(&cmd).unwrap(), wire);
        }
    }

    #[test]
    fn test_absent_fields_skipped_on_encode() {
        let env = Envelope::new(Command::GroupLeave);
        let json = env.encode().unwrap();
        assert_eq!(json, "{\"command\":\"group-leave\"}");
    }

    #[test]
    fn test_reply_is_mutated_copy() {
        let json = r#"{"command":"group-join","group":{"id":"g1","name":"dev"}}"#;
        let mut env = Envelope::decode(json).unwrap();
        env.message = Some(MessageBody::text(MSG_GROUP_JOINED));
        env.response = Some(ResponseInfo::success());
        let out = env.encode().unwrap();
        assert!(out.contains("\"group joined successfully\""));
        assert!(out.contains("\"status\":true"));
        assert!(out.contains("\"id\":\"g1\""));
    }
}
