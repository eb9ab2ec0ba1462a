use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

// ==================== Payloads ====================

/// 握手载荷 (客户端 -> 服务端)
///
/// 包含客户端的协议版本信息，用于服务端进行版本校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakePayload {
    /// 协议版本
    pub version: u16,
    /// 客户端名称/标识
    pub client_name: Option<String>,
    /// 客户端版本
    pub client_version: Option<String>,
    /// 客户端唯一标识 (UUID)
    pub client_id: Option<String>,
}

/// 请求指令载荷 (客户端 -> 服务端)
///
/// # 示例
/// - `identifier`: "reservation.create"
/// - `params`: `{ "date": "2026-10-18", "time": "19:30", "party_size": 4 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCommandPayload {
    /// 操作标识，格式 "subject.action"
    pub identifier: String,
    /// 操作参数
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RequestCommandPayload {
    pub fn new(identifier: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            identifier: identifier.into(),
            params,
        }
    }
}

/// 通用响应载荷 (服务端 -> 客户端)
///
/// `identifier` 为 "subject.action.<outcome>"，outcome 为 `ok`、`fail`
/// 或业务后缀 (例如 `seated`、`queued`、`conflict`)。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// 应答标识
    pub identifier: String,
    /// 是否成功
    pub success: bool,
    /// 错误代码 (仅在失败时存在)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    /// 响应消息/错误描述
    pub message: String,
    /// 响应数据 (可选)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// 客户端可稍后重试 (服务繁忙)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retriable: bool,
}

// ==================== Convenience Constructors ====================

impl ResponsePayload {
    pub fn success(identifier: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            identifier: identifier.into(),
            success: true,
            code: None,
            message: "OK".to_string(),
            data,
            retriable: false,
        }
    }

    pub fn error(identifier: impl Into<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            success: false,
            code: Some(code),
            message: message.into(),
            data: None,
            retriable: false,
        }
    }

    pub fn with_retriable(mut self, retriable: bool) -> Self {
        self.retriable = retriable;
        self
    }

    /// 应答的 outcome 后缀
    pub fn outcome(&self) -> &str {
        self.identifier
            .rsplit_once('.')
            .map(|(_, outcome)| outcome)
            .unwrap_or(self.identifier.as_str())
    }
}
