//! Logging Infrastructure
//!
//! - 控制台输出 (开发环境 pretty，生产环境 JSON)
//! - `app/` 按天滚动的应用日志
//! - `alarm/` 运维告警 (target = "alarm")，例如确认码生成耗尽
//! - `security/` 会话登录/拒绝 (target = "security")

use std::fs;
use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// 记录安全事件
#[macro_export]
macro_rules! security_log {
    ($level:ident, $event:expr, $($field:tt)*) => {
        tracing::$level!(target: "security", event = $event, $($field)*)
    };
}

/// 记录运维告警
#[macro_export]
macro_rules! alarm_log {
    ($($field:tt)*) => {
        tracing::error!(target: "alarm", $($field)*)
    };
}

fn routed_to_app(target: &str) -> bool {
    target != "alarm" && target != "security"
}

/// Initialize the logger with optional file output
///
/// `RUST_LOG` 优先于 `level`。重复初始化 (测试) 会被忽略。
pub fn init_logger_with_file(level: &str, json_format: bool, log_dir: Option<&Path>) -> std::io::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = if json_format {
        fmt::layer().json().with_target(true).with_thread_ids(true).boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    let file_layers = match log_dir {
        Some(dir) => {
            let app_dir = dir.join("app");
            let alarm_dir = dir.join("alarm");
            let security_dir = dir.join("security");
            fs::create_dir_all(&app_dir)?;
            fs::create_dir_all(&alarm_dir)?;
            fs::create_dir_all(&security_dir)?;

            let app_log = RollingFileAppender::new(Rotation::DAILY, app_dir, "app");
            let alarm_log = RollingFileAppender::new(Rotation::DAILY, alarm_dir, "alarm");
            let security_log = RollingFileAppender::new(Rotation::DAILY, security_dir, "security");

            let app_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::sync::Mutex::new(app_log))
                .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
                    routed_to_app(meta.target())
                }));
            let alarm_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::sync::Mutex::new(alarm_log))
                .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
                    meta.target() == "alarm"
                }));
            let security_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_writer(std::sync::Mutex::new(security_log))
                .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
                    meta.target() == "security"
                }));

            Some(app_layer.and_then(alarm_layer).and_then(security_layer))
        }
        None => None,
    };

    // try_init: 测试中可能多次调用
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layers)
        .try_init();

    Ok(())
}
