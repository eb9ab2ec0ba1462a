//! 统一错误处理
//!
//! 所有业务操作返回 [`AppResult`]，请求路由层再把 [`AppError`] 映射为
//! 响应标识后缀 (`invalid` / `conflict` / `busy` ...) 与 [`ErrorCode`]。
//!
//! | 变体 | 后缀 | 错误码 |
//! |------|------|--------|
//! | Validation | invalid | E0002 |
//! | Conflict | conflict | E4002 |
//! | NotFound | not_found | E0003 |
//! | ResourceExhausted | busy | E9404 |
//! | Transition | rejected | E4004 |
//! | Unauthorized | unauthorized | E1001 |
//! | Forbidden | forbidden | E2001 |
//! | Generation / Internal / Storage | fail | E9xxx |

use shared::models::ReservationStatus;
use tracing::error;

use crate::db::StorageError;

pub use shared::error::{ErrorCategory, ErrorCode};

pub type AppResult<T> = Result<T, AppError>;

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== 请求错误 ==========
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // ========== 业务冲突 ==========
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Illegal transition {from} -> {to}")]
    Transition {
        from: ReservationStatus,
        to: ReservationStatus,
    },

    // ========== 认证 / 权限 ==========
    #[error("Authentication required")]
    Unauthorized,

    #[error("Permission denied: {0}")]
    Forbidden(String),

    // ========== 资源 / 系统 ==========
    /// 连接池借出超时，可重试
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// 确认码生成重试耗尽
    #[error("Code generation failed after {0} attempts")]
    Generation(u32),

    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),

    #[error("Client disconnected")]
    ClientDisconnected,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::ReservationNotFound(id) => {
                AppError::NotFound(format!("Reservation {} not found", id))
            }
            StorageError::DuplicateCode(code) => {
                AppError::Conflict(format!("Confirmation code {} already taken", code))
            }
            other => AppError::Storage(other),
        }
    }
}

// ========== Helper Constructors ==========

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 响应标识后缀
    pub fn outcome(&self) -> &'static str {
        match self {
            AppError::Validation(_) | AppError::Invalid(_) => "invalid",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Transition { .. } => "rejected",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::ResourceExhausted(_) => "busy",
            AppError::Generation(_)
            | AppError::Storage(_)
            | AppError::ClientDisconnected
            | AppError::Internal(_) => "fail",
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(_) => ErrorCode::ValidationFailed,
            AppError::Invalid(_) => ErrorCode::InvalidRequest,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Conflict(_) => ErrorCode::SlotUnavailable,
            AppError::Transition { .. } => ErrorCode::InvalidTransition,
            AppError::Unauthorized => ErrorCode::NotAuthenticated,
            AppError::Forbidden(_) => ErrorCode::PermissionDenied,
            AppError::ResourceExhausted(_) => ErrorCode::SystemBusy,
            AppError::Generation(_) => ErrorCode::CodeGenerationExhausted,
            AppError::Storage(_) => ErrorCode::DatabaseError,
            AppError::ClientDisconnected => ErrorCode::ClientDisconnected,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// 客户端可以稍后重试 (连接池繁忙)
    pub fn is_retriable(&self) -> bool {
        matches!(self, AppError::ResourceExhausted(_))
    }

    /// 对外消息，系统错误不暴露细节
    pub fn client_message(&self) -> String {
        match self {
            AppError::Storage(e) => {
                error!(target: "database", error = %e, "Database error occurred");
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}
