//! Seating Server - 餐厅预订与座位引擎
//!
//! # 架构概述
//!
//! - **座位引擎** (`seating`): 时段计算、桌台分配、预订状态机、现场候位、爽约 / 提醒巡检
//! - **数据库** (`db`): 嵌入式 redb 存储 + 有界句柄池
//! - **消息层** (`message`): TCP 二进制帧 + 请求路由
//! - **请求处理** (`api`): 按主题分组的处理器
//!
//! # 模块结构
//!
//! ```text
//! seating-server/src/
//! ├── core/          # 配置、组件图、启动关闭、后台任务
//! ├── utils/         # 错误、日志、时钟
//! ├── db/            # redb 存储、句柄池
//! ├── seating/       # 座位引擎
//! ├── services/      # 营业时间、身份、通知
//! ├── message/       # 传输、路由、TCP 服务
//! └── api/           # 请求处理器
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod message;
pub mod seating;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, RunningServer, Server, ServerState};
pub use shared::message::{BusMessage, EventType};
pub use utils::logger::init_logger_with_file;
pub use utils::{AppError, AppResult, ErrorCategory, ErrorCode};

/// 准备运行环境：加载 `.env`、读取配置、建立工作目录、初始化日志
pub fn setup_environment() -> Result<Config, Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    config.ensure_work_dir_structure()?;
    init_logger_with_file(&config.log_level, config.is_production(), Some(&config.logs_dir()))?;
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
   _____            __  _
  / ___/___  ____ _/ /_(_)___  ____ _
  \__ \/ _ \/ __ `/ __/ / __ \/ __ `/
 ___/ /  __/ /_/ / /_/ / / / / /_/ /
/____/\___/\__,_/\__/_/_/ /_/\__, /
                            /____/
    "#
    );
}
