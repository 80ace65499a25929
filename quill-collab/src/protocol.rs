//! Wire protocol for the collaboration relay.
//!
//! Every message is a single JSON object with a `type` discriminator:
//!
//! ```text
//! {"type":"cursor-move","userId":"u1","position":{"line":3,"col":5}}
//! ```
//!
//! Client → relay and relay → client envelopes are separate enums so the
//! codec can reject a direction mismatch the same way it rejects an unknown
//! tag. Decoding fails closed: invalid JSON, an unknown `type`, or a
//! missing/mistyped field all yield [`ProtocolError::Decode`] and nothing
//! else happens — the caller logs and drops the message.

use serde::{Deserialize, Serialize};

/// Caret position in the document, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub line: u32,
    pub col: u32,
}

impl CursorPosition {
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// Selected character range as absolute offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start: u32,
    pub end: u32,
}

impl SelectionRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

/// One participant inside a `presence-update` snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<SelectionRange>,
}

/// Envelopes the client writes to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Join {
        user_id: String,
        user_name: String,
        user_avatar: String,
        document_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Leave { user_id: String },
    #[serde(rename_all = "camelCase")]
    CursorMove {
        user_id: String,
        position: CursorPosition,
    },
    #[serde(rename_all = "camelCase")]
    SelectionChange {
        user_id: String,
        selection: SelectionRange,
    },
    #[serde(rename_all = "camelCase")]
    ContentChange {
        user_id: String,
        changes: serde_json::Value,
    },
    Ping,
}

/// Envelopes the relay fans out to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    UserJoined {
        user_id: String,
        user_name: String,
        user_avatar: String,
    },
    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: String },
    #[serde(rename_all = "camelCase")]
    CursorMoved {
        user_id: String,
        position: CursorPosition,
    },
    #[serde(rename_all = "camelCase")]
    SelectionChanged {
        user_id: String,
        selection: SelectionRange,
    },
    #[serde(rename_all = "camelCase")]
    ContentChanged {
        user_id: String,
        changes: serde_json::Value,
    },
    PresenceUpdate { users: Vec<PresenceEntry> },
    Pong,
}

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("malformed envelope: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ClientMessage {
    /// Serialize to wire bytes. Does not fail for well-formed values.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }
}

impl ServerMessage {
    /// Serialize to wire bytes (used by the relay side and in tests).
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(ProtocolError::Encode)
    }

    /// Deserialize from wire bytes, failing closed on anything malformed.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(ProtocolError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_wire_shape() {
        let msg = ClientMessage::Join {
            user_id: "u1".into(),
            user_name: "Alice".into(),
            user_avatar: "/avatars/alice.png".into(),
            document_id: "doc-7".into(),
        };
        let value: serde_json::Value =
            serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "join",
                "userId": "u1",
                "userName": "Alice",
                "userAvatar": "/avatars/alice.png",
                "documentId": "doc-7",
            })
        );
    }

    #[test]
    fn test_cursor_move_wire_shape() {
        let msg = ClientMessage::CursorMove {
            user_id: "u1".into(),
            position: CursorPosition::new(3, 5),
        };
        let value: serde_json::Value =
            serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "cursor-move",
                "userId": "u1",
                "position": {"line": 3, "col": 5},
            })
        );
    }

    #[test]
    fn test_selection_change_wire_shape() {
        let msg = ClientMessage::SelectionChange {
            user_id: "u1".into(),
            selection: SelectionRange::new(10, 42),
        };
        let value: serde_json::Value =
            serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "selection-change",
                "userId": "u1",
                "selection": {"start": 10, "end": 42},
            })
        );
    }

    #[test]
    fn test_ping_wire_shape() {
        let bytes = ClientMessage::Ping.encode().unwrap();
        assert_eq!(bytes, br#"{"type":"ping"}"#);
    }

    #[test]
    fn test_content_change_forwards_opaque_payload() {
        let changes = json!({"ops": [{"insert": "hello"}, {"retain": 4}]});
        let msg = ClientMessage::ContentChange {
            user_id: "u1".into(),
            changes: changes.clone(),
        };
        let value: serde_json::Value =
            serde_json::from_slice(&msg.encode().unwrap()).unwrap();
        assert_eq!(value["type"], "content-change");
        assert_eq!(value["changes"], changes);
    }

    #[test]
    fn test_decode_user_joined() {
        let bytes = br#"{"type":"user-joined","userId":"u2","userName":"Bob","userAvatar":"/a.png"}"#;
        let msg = ServerMessage::decode(bytes).unwrap();
        assert_eq!(
            msg,
            ServerMessage::UserJoined {
                user_id: "u2".into(),
                user_name: "Bob".into(),
                user_avatar: "/a.png".into(),
            }
        );
    }

    #[test]
    fn test_decode_cursor_moved() {
        let bytes =
            br#"{"type":"cursor-moved","userId":"u2","position":{"line":3,"col":5}}"#;
        let msg = ServerMessage::decode(bytes).unwrap();
        assert_eq!(
            msg,
            ServerMessage::CursorMoved {
                user_id: "u2".into(),
                position: CursorPosition::new(3, 5),
            }
        );
    }

    #[test]
    fn test_decode_presence_update() {
        let bytes = br#"{
            "type": "presence-update",
            "users": [
                {"userId":"u2","userName":"Bob","userAvatar":"/a.png",
                 "cursor":{"line":1,"col":2}},
                {"userId":"u3","userName":"Eve","userAvatar":"/b.png"}
            ]
        }"#;
        let msg = ServerMessage::decode(bytes).unwrap();
        match msg {
            ServerMessage::PresenceUpdate { users } => {
                assert_eq!(users.len(), 2);
                assert_eq!(users[0].user_id, "u2");
                assert_eq!(users[0].cursor, Some(CursorPosition::new(1, 2)));
                assert_eq!(users[1].user_id, "u3");
                assert!(users[1].cursor.is_none());
                assert!(users[1].selection.is_none());
            }
            other => panic!("expected presence-update, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_pong() {
        let msg = ServerMessage::decode(br#"{"type":"pong"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Pong);
    }

    #[test]
    fn test_decode_rejects_garbage_bytes() {
        assert!(ServerMessage::decode(&[0xff, 0xfe, 0xfd]).is_err());
        assert!(ServerMessage::decode(b"not json at all").is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let bytes = br#"{"type":"document-locked","userId":"u1"}"#;
        assert!(ServerMessage::decode(bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        // user-joined without userName
        let bytes = br#"{"type":"user-joined","userId":"u2","userAvatar":"/a.png"}"#;
        assert!(ServerMessage::decode(bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_mistyped_field() {
        let bytes = br#"{"type":"cursor-moved","userId":"u2","position":"3:5"}"#;
        assert!(ServerMessage::decode(bytes).is_err());
    }

    #[test]
    fn test_decode_rejects_client_envelope_from_relay() {
        // "cursor-move" is a client tag; the inbound set only knows "cursor-moved".
        let bytes =
            br#"{"type":"cursor-move","userId":"u2","position":{"line":0,"col":0}}"#;
        assert!(ServerMessage::decode(bytes).is_err());
    }

    #[test]
    fn test_decode_tolerates_extra_fields() {
        let bytes = br#"{"type":"user-left","userId":"u2","reason":"idle"}"#;
        let msg = ServerMessage::decode(bytes).unwrap();
        assert_eq!(msg, ServerMessage::UserLeft { user_id: "u2".into() });
    }
}
