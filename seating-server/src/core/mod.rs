//! 核心模块 - 服务器配置、状态和生命周期
//!
//! # 模块结构
//!
//! - [`Config`] - 服务器配置
//! - [`ServerState`] - 组件图
//! - [`Server`] - 启动 / 关闭
//! - [`tasks`] - 后台任务管理

pub mod config;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use server::{RunningServer, Server};
pub use state::{Collaborators, ServerState};
pub use tasks::{BackgroundTasks, PeriodicTask, SweepReport, TaskKind};
