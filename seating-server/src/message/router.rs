//! 请求路由 (RequestRouter)
//!
//! 启动时构建一次 `(subject, action) -> handler` 表，按标识
//! `"subject.action"` 在第一个 `.` 处拆分后查表。未注册的标识返回
//! `"<identifier>.unknown"` 应答，不会中断连接。
//!
//! 每个连接持有一个 [`Session`]：小型键值状态，前一个请求写入
//! (例如登录后的身份)，同一连接上后续请求读取。

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::error::ErrorCode;
use shared::message::{RequestCommandPayload, ResponsePayload};

use crate::core::ServerState;
use crate::services::Identity;
use crate::utils::{AppError, AppResult};

/// 会话中保存身份的键
pub const IDENTITY_KEY: &str = "identity";

/// 连接级会话状态
#[derive(Debug, Default)]
pub struct Session {
    peer: Option<String>,
    values: DashMap<String, Value>,
}

impl Session {
    pub fn new(peer: Option<String>) -> Self {
        Self {
            peer,
            values: DashMap::new(),
        }
    }

    pub fn peer(&self) -> Option<&str> {
        self.peer.as_deref()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| AppError::internal(format!("Session value for {} not serializable: {}", key, e)))?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.get(IDENTITY_KEY)
    }

    /// 需要已登录
    pub fn require_identity(&self) -> AppResult<Identity> {
        self.identity().ok_or(AppError::Unauthorized)
    }

    /// 需要员工身份
    pub fn require_staff(&self) -> AppResult<Identity> {
        let identity = self.require_identity()?;
        if !identity.is_staff() {
            crate::security_log!(warn, "staff_required", identity = %identity.id, peer = ?self.peer, "Staff action denied");
            return Err(AppError::forbidden("Staff only"));
        }
        Ok(identity)
    }
}

/// 处理器上下文
#[derive(Clone)]
pub struct HandlerContext {
    pub state: ServerState,
    pub session: Arc<Session>,
}

/// 处理结果：后缀 + 数据
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub suffix: &'static str,
    pub data: Value,
}

impl Outcome {
    pub fn ok<T: Serialize>(data: &T) -> AppResult<Self> {
        Self::with_suffix("ok", data)
    }

    pub fn with_suffix<T: Serialize>(suffix: &'static str, data: &T) -> AppResult<Self> {
        let data = serde_json::to_value(data)
            .map_err(|e| AppError::internal(format!("Failed to serialize response: {}", e)))?;
        Ok(Self { suffix, data })
    }
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = AppResult<Outcome>> + Send>>;

type BoxHandler = Arc<dyn Fn(HandlerContext, Value) -> HandlerFuture + Send + Sync>;

/// 在第一个 `.` 处拆分
pub fn split_identifier(identifier: &str) -> Option<(&str, &str)> {
    identifier
        .split_once('.')
        .filter(|(subject, action)| !subject.is_empty() && !action.is_empty())
}

/// 请求路由表
#[derive(Default, Clone)]
pub struct RequestRouter {
    handlers: HashMap<(String, String), BoxHandler>,
}

impl std::fmt::Debug for RequestRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<String> = self.handlers.keys().map(|(s, a)| format!("{}.{}", s, a)).collect();
        keys.sort();
        f.debug_struct("RequestRouter").field("handlers", &keys).finish()
    }
}

impl RequestRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器；标识必须是 `subject.action`
    pub fn register<H, Fut>(&mut self, identifier: &'static str, handler: H)
    where
        H: Fn(HandlerContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Outcome>> + Send + 'static,
    {
        let Some((subject, action)) = split_identifier(identifier) else {
            tracing::error!(identifier, "Refusing to register malformed identifier");
            return;
        };
        let boxed: BoxHandler = Arc::new(move |ctx, params| Box::pin(handler(ctx, params)));
        if self
            .handlers
            .insert((subject.to_string(), action.to_string()), boxed)
            .is_some()
        {
            tracing::warn!(identifier, "Handler replaced");
        }
    }

    pub fn contains(&self, identifier: &str) -> bool {
        split_identifier(identifier)
            .is_some_and(|(s, a)| self.handlers.contains_key(&(s.to_string(), a.to_string())))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// 分发请求，总是返回一个应答
    pub async fn dispatch(&self, ctx: HandlerContext, request: RequestCommandPayload) -> ResponsePayload {
        let identifier = request.identifier;
        let handler = split_identifier(&identifier)
            .and_then(|(s, a)| self.handlers.get(&(s.to_string(), a.to_string())))
            .cloned();

        let Some(handler) = handler else {
            tracing::warn!(identifier = %identifier, "Unknown command");
            return ResponsePayload::error(
                format!("{}.unknown", identifier),
                ErrorCode::UnknownCommand,
                format!("Unknown command: {}", identifier),
            );
        };

        match handler(ctx, request.params).await {
            Ok(outcome) => ResponsePayload::success(format!("{}.{}", identifier, outcome.suffix), Some(outcome.data)),
            Err(e) => {
                tracing::debug!(identifier = %identifier, error = %e, "Request failed");
                ResponsePayload::error(format!("{}.{}", identifier, e.outcome()), e.code(), e.client_message())
                    .with_retriable(e.is_retriable())
            }
        }
    }
}

/// 解析请求参数
pub fn parse_params<T: DeserializeOwned>(params: Value) -> AppResult<T> {
    serde_json::from_value(params).map_err(|e| AppError::validation(format!("Invalid parameters: {}", e)))
}
