//! 工具模块 - 错误类型、日志、时间

pub mod error;
pub mod logger;
pub mod time;

pub use error::{AppError, AppResult, ErrorCategory, ErrorCode};
pub use time::{Clock, ManualClock, SystemClock};
