//! 消息协议类型定义
//!
//! 这些类型在 seating-server 和客户端之间共享，用于 TCP 传输。
//! 每条请求都是一个 `RequestCommand` 帧，服务端以 `Response` 帧应答，
//! 应答的 `correlation_id` 等于请求的 `request_id`。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use uuid::Uuid;

pub mod payload;
pub use payload::*;

/// 协议版本号
pub const PROTOCOL_VERSION: u16 = 1;

/// 消息事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// 握手消息
    Handshake = 0,
    /// 客户端请求
    RequestCommand = 3,
    /// 请求响应
    Response = 5,
}

impl TryFrom<u8> for EventType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EventType::Handshake),
            3 => Ok(EventType::RequestCommand),
            5 => Ok(EventType::Response),
            _ => Err(()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Handshake => write!(f, "handshake"),
            EventType::RequestCommand => write!(f, "request_command"),
            EventType::Response => write!(f, "response"),
        }
    }
}

/// 消息帧
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusMessage {
    pub request_id: Uuid,
    pub event_type: EventType,
    pub correlation_id: Option<Uuid>,
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(event_type: EventType, payload: Vec<u8>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            event_type,
            correlation_id: None,
            payload,
        }
    }

    /// 设置关联 ID (用于 RPC 响应)
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// 创建握手消息
    pub fn handshake(payload: &HandshakePayload) -> Self {
        Self::new(EventType::Handshake, encode(payload))
    }

    /// 创建请求指令消息
    pub fn request_command(payload: &RequestCommandPayload) -> Self {
        Self::new(EventType::RequestCommand, encode(payload))
    }

    /// 创建响应消息
    pub fn response(payload: &ResponsePayload) -> Self {
        Self::new(EventType::Response, encode(payload))
    }

    /// 解析载荷为指定类型
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

// Payload types are plain structs of strings, numbers and JSON values; they always serialize.
fn encode<T: Serialize>(payload: &T) -> Vec<u8> {
    serde_json::to_vec(payload).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_message() {
        let msg = BusMessage::request_command(&RequestCommandPayload::new(
            "reservation.create",
            serde_json::json!({ "party_size": 2 }),
        ));

        assert_eq!(msg.event_type, EventType::RequestCommand);
        assert!(msg.correlation_id.is_none());

        let parsed: RequestCommandPayload = msg.parse_payload().unwrap();
        assert_eq!(parsed.identifier, "reservation.create");
        assert_eq!(parsed.params["party_size"], 2);
    }

    #[test]
    fn test_response_correlation() {
        let request = BusMessage::request_command(&RequestCommandPayload::new(
            "session.whoami",
            serde_json::Value::Null,
        ));
        let response = BusMessage::response(&ResponsePayload::success(
            "session.whoami.ok",
            None,
        ))
        .with_correlation_id(request.request_id);

        assert_eq!(response.correlation_id, Some(request.request_id));
        assert_ne!(response.request_id, request.request_id);
    }

    #[test]
    fn test_handshake_message() {
        let payload = HandshakePayload {
            version: PROTOCOL_VERSION,
            client_name: Some("host-stand".to_string()),
            client_version: Some("0.1.0".to_string()),
            client_id: None,
        };

        let msg = BusMessage::handshake(&payload);
        assert_eq!(msg.event_type, EventType::Handshake);
        assert!(!msg.request_id.is_nil());

        let parsed: HandshakePayload = msg.parse_payload().unwrap();
        assert_eq!(parsed.version, PROTOCOL_VERSION);
    }

    #[test]
    fn test_event_type_from_byte() {
        assert_eq!(EventType::try_from(3), Ok(EventType::RequestCommand));
        assert!(EventType::try_from(42).is_err());
    }
}
