//! Server Implementation
//!
//! 启动请求监听与定时巡检，等待关闭信号后按顺序停止

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, ServerState};
use crate::message::MessageServer;
use crate::seating::{NoShowMonitor, ReminderMonitor};
use crate::utils::{AppError, AppResult};

/// Seating Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

/// 已启动的服务器
pub struct RunningServer {
    pub state: ServerState,
    local_addr: SocketAddr,
    tasks: BackgroundTasks,
}

impl RunningServer {
    /// 实际监听地址 (端口 0 时由系统分配)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.tasks.shutdown_token()
    }

    /// Graceful shutdown：停止后台任务，关闭句柄池
    pub async fn shutdown(self, timeout: Duration) {
        tracing::info!("Shutting down...");
        if tokio::time::timeout(timeout, self.tasks.shutdown()).await.is_err() {
            tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Background tasks did not stop in time");
        }
        self.state.db.pool.shutdown();
        tracing::info!("Seating server stopped");
    }
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self { config, state: None }
    }

    /// 使用已构造的状态 (测试中注入手动时钟等)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    /// 启动所有后台任务并返回句柄
    pub async fn start(&self) -> AppResult<RunningServer> {
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        let listener = MessageServer::bind(&self.config.listen_addr()).await?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::internal(format!("Failed to read listener address: {}", e)))?;
        Ok(Self::start_with_listener(&self.config, state, listener, local_addr))
    }

    fn start_with_listener(
        config: &Config,
        state: ServerState,
        listener: TcpListener,
        local_addr: SocketAddr,
    ) -> RunningServer {
        let mut tasks = BackgroundTasks::new();

        let message_server = MessageServer::new(state.clone(), tasks.shutdown_token());
        tasks.spawn("tcp_listener", TaskKind::Listener, message_server.serve(listener));

        tasks.spawn_periodic(NoShowMonitor::new(
            state.registry.clone(),
            config.no_show_grace_min,
            Duration::from_secs(config.no_show_sweep_secs),
        ));
        tasks.spawn_periodic(ReminderMonitor::new(
            state.registry.clone(),
            config.reminder_lead_min,
            Duration::from_secs(config.reminder_sweep_secs),
        ));
        tasks.log_summary();

        RunningServer {
            state,
            local_addr,
            tasks,
        }
    }

    /// 运行直到 `shutdown_signal` 完成
    pub async fn run<S>(&self, shutdown_signal: S) -> AppResult<()>
    where
        S: Future<Output = ()>,
    {
        let running = self.start().await?;
        running.state.print_banner();
        tracing::info!("Seating server listening on {}", running.local_addr());

        let token = running.shutdown_token();
        tokio::select! {
            _ = shutdown_signal => {}
            _ = token.cancelled() => {}
        }

        running.shutdown(self.config.shutdown_timeout()).await;
        Ok(())
    }
}
