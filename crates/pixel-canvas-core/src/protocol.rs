//! WebSocket protocol messages
//!
//! Wire shape: `{"type": "...", "payload": {...}}`. Unit variants (no
//! payload) serialize without a `payload` field at all, which is what the
//! adjacently-tagged representation below gives us for free.

use serde::{Deserialize, Serialize};

use crate::model::{Color, PendingUpdate};

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Request to draw one pixel.
    DrawPixel {
        /// X coordinate
        x: i64,
        /// Y coordinate
        y: i64,
        /// `#RRGGBB` color string
        color: String,
    },
    /// Reply to a `KEEPALIVE_PING`, demonstrating liveness.
    KeepalivePong,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Batched pixel updates, at most once per 100 ms per session.
    PixelUpdate {
        /// Updates in enqueue order. Duplicate coordinates within one
        /// batch are sent as-is; order is the authoritative resolver.
        pixels: Vec<PixelUpdatePayload>,
    },
    /// Liveness probe sent every 30 s when the session has not
    /// demonstrated liveness.
    KeepalivePing,
    /// Malformed input or a rejected write.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// One entry in a `PIXEL_UPDATE` batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelUpdatePayload {
    /// X coordinate
    pub x: u16,
    /// Y coordinate
    pub y: u16,
    /// `#RRGGBB` color string
    pub color: Color,
    /// Author's user id
    pub user_id: String,
}

impl From<PendingUpdate> for PixelUpdatePayload {
    fn from(upd: PendingUpdate) -> Self {
        Self {
            x: upd.x,
            y: upd.y,
            color: upd.color,
            user_id: upd.user_id,
        }
    }
}

impl ServerMessage {
    /// Build a `PIXEL_UPDATE` message from a batch of pending updates,
    /// preserving order.
    #[must_use]
    pub fn pixel_update(updates: Vec<PendingUpdate>) -> Self {
        Self::PixelUpdate {
            pixels: updates.into_iter().map(PixelUpdatePayload::from).collect(),
        }
    }

    /// Build an `ERROR` message.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Build a `KEEPALIVE_PING` message.
    #[must_use]
    pub fn keepalive_ping() -> Self {
        Self::KeepalivePing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_pixel_deserializes() {
        let json = r#"{"type":"DRAW_PIXEL","payload":{"x":100,"y":200,"color":"#FF0000"}}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::DrawPixel { x, y, color } => {
                assert_eq!(x, 100);
                assert_eq!(y, 200);
                assert_eq!(color, "#FF0000");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_keepalive_pong_deserializes_without_payload() {
        let json = r#"{"type":"KEEPALIVE_PONG"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(msg, ClientMessage::KeepalivePong));
    }

    #[test]
    fn test_error_message_serializes() {
        let msg = ServerMessage::error("bad color");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"ERROR\""));
        assert!(json.contains("\"message\":\"bad color\""));
    }

    #[test]
    fn test_keepalive_ping_serializes_without_payload() {
        let json = serde_json::to_string(&ServerMessage::keepalive_ping()).unwrap();
        assert_eq!(json, r#"{"type":"KEEPALIVE_PING"}"#);
    }

    #[test]
    fn test_pixel_update_batch_shape() {
        let updates = vec![PendingUpdate {
            x: 100,
            y: 200,
            color: Color::from_rgb(255, 0, 0),
            user_id: "u1".into(),
        }];
        let msg = ServerMessage::pixel_update(updates);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"PIXEL_UPDATE\""));
        assert!(json.contains("\"x\":100"));
        assert!(json.contains("\"userId\":\"u1\""));
    }

    #[test]
    fn test_malformed_json_fails_to_decode() {
        let result: Result<ClientMessage, _> = serde_json::from_str(r#"{"type":"NOT_A_TYPE"}"#);
        assert!(result.is_err());
    }
}
