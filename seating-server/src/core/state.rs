use std::sync::Arc;

use crate::api;
use crate::core::Config;
use crate::db::DbService;
use crate::message::RequestRouter;
use crate::seating::{RandomCodes, ReservationRegistry, WaitlistEstimator};
use crate::services::{IdentityProvider, LogNotifier, Notifier, StaticIdentityProvider};
use crate::utils::{AppError, AppResult, Clock, SystemClock};

/// 可替换的外部协作方
///
/// 生产环境使用系统时钟、日志通知与静态令牌表；测试替换为手动时钟等。
#[derive(Clone)]
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub notifier: Arc<dyn Notifier>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl Collaborators {
    pub fn from_config(config: &Config) -> Self {
        let identity = StaticIdentityProvider::parse(&config.session_tokens);
        if identity.is_empty() {
            tracing::warn!("No session tokens configured, every login will be rejected");
        }
        Self {
            clock: Arc::new(SystemClock::new(config.timezone)),
            notifier: Arc::new(LogNotifier),
            identity: Arc::new(identity),
        }
    }
}

/// 服务器状态 - 持有所有组件的共享引用
///
/// 组件图在启动时显式构造一次，之后只读共享，Clone 为浅拷贝。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | DbService | redb 存储 + 句柄池 |
/// | registry | Arc<ReservationRegistry> | 预订登记 |
/// | waitlist | Arc<WaitlistEstimator> | 现场候位 |
/// | identity | Arc<dyn IdentityProvider> | 令牌解析 |
/// | router | Arc<RequestRouter> | 请求路由表 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    pub db: DbService,
    pub registry: Arc<ReservationRegistry>,
    pub waitlist: Arc<WaitlistEstimator>,
    pub identity: Arc<dyn IdentityProvider>,
    pub router: Arc<RequestRouter>,
}

impl std::fmt::Debug for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerState")
            .field("config", &self.config)
            .field("db", &self.db)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/seating.redb) + 桌台同步
    /// 3. 座位引擎与路由表
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        config
            .ensure_work_dir_structure()
            .map_err(|e| AppError::internal(format!("Failed to create work directory structure: {}", e)))?;

        let db = DbService::new(
            &config.database_path(),
            &config.table_capacities,
            config.pool_size,
            config.pool_timeout(),
        )
        .await?;

        Ok(Self::assemble(config.clone(), db, Collaborators::from_config(config)))
    }

    /// 由已打开的数据库组装组件图
    pub fn assemble(config: Config, db: DbService, collaborators: Collaborators) -> Self {
        let registry = Arc::new(ReservationRegistry::new(
            db.pool.clone(),
            Arc::new(config.business_hours()),
            Arc::new(RandomCodes),
            collaborators.notifier,
            collaborators.clock,
            config.slot_rules(),
        ));
        let waitlist = Arc::new(WaitlistEstimator::new(registry.clone(), config.waitlist_rules()));
        let router = Arc::new(api::build_router());
        tracing::debug!(handlers = router.len(), "Request router built");

        Self {
            config,
            db,
            registry,
            waitlist,
            identity: collaborators.identity,
            router,
        }
    }

    /// 打印启动横幅 (日志)
    pub fn print_banner(&self) {
        let status = self.db.pool.status();
        tracing::info!("╔══════════════════════════════════════════════════════════════════════╗");
        tracing::info!("║                        SEATING SERVER - READY                        ║");
        tracing::info!("╚══════════════════════════════════════════════════════════════════════╝");
        tracing::info!("  Environment  : {}", self.config.environment);
        tracing::info!("  Time zone    : {}", self.config.timezone);
        tracing::info!("  Tables       : {:?}", self.config.table_capacities);
        tracing::info!(
            "  Hours        : {}-{}",
            self.config.opening_hours.open.format("%H:%M"),
            self.config.opening_hours.close.format("%H:%M")
        );
        tracing::info!("  Storage pool : {} handles", status.size);
        tracing::info!("  Requests     : tcp://localhost:{}", self.config.message_tcp_port);
        tracing::info!("════════════════════════════════════════════════════════════════════════");
    }
}
