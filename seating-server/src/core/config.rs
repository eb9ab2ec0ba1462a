use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::seating::{SlotRules, WaitlistRules};
use crate::services::{BusinessHours, OpeningHours, hours};
use crate::utils::time::parse_timezone;

/// 服务器配置 - 预订与座位服务的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/seating | 工作目录 (database/, logs/) |
/// | MESSAGE_TCP_PORT | 8081 | 请求监听端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | TIMEZONE | Europe/Madrid | 营业时区 |
/// | POOL_SIZE / POOL_TIMEOUT_MS | 4 / 5000 | 存储句柄池 |
/// | RESERVATION_DURATION_MIN | 120 | 单次用餐时长 |
/// | SLOT_GRANULARITY_MIN | 30 | 时段粒度 |
/// | BOOKING_LEAD_MIN | 60 | 当天预订最少提前量 |
/// | NO_SHOW_GRACE_MIN / NO_SHOW_SWEEP_SECS | 15 / 300 | 爽约巡检 |
/// | REMINDER_LEAD_MIN / REMINDER_SWEEP_SECS | 60 / 300 | 提醒巡检 |
/// | WAIT_FLOOR_MIN / DEFAULT_WAIT_MIN | 5 / 30 | 候位估算 |
/// | TABLE_CAPACITIES | 2,2,4,4,6 | 桌台容量 |
/// | OPENING_HOURS | 12:00-23:00 | 每日营业时间 |
/// | CLOSED_WEEKDAYS | (空) | 例如 `Mon,Tue` |
/// | HOLIDAYS | (空) | `2026-12-25` 休息；`2026-12-24=12:00-16:00` 调整营业时间 |
/// | SESSION_TOKENS | (空) | `token:identity:role` 列表 |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 关闭超时 |
///
/// 格式错误的值回退到默认值并记录 warn。
///
/// ```ignore
/// WORK_DIR=/data/seating MESSAGE_TCP_PORT=9000 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// 请求监听端口
    pub message_tcp_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    /// 营业时区
    pub timezone: Tz,

    pub pool_size: usize,
    pub pool_timeout_ms: u64,

    pub reservation_duration_min: u32,
    pub slot_granularity_min: u32,
    pub booking_lead_min: u32,

    pub no_show_grace_min: u32,
    pub no_show_sweep_secs: u64,
    pub reminder_lead_min: u32,
    pub reminder_sweep_secs: u64,

    pub wait_floor_min: u32,
    pub default_wait_min: u32,

    /// 桌台容量，按顺序编号 1..n
    pub table_capacities: Vec<u32>,
    pub opening_hours: OpeningHours,
    pub closed_weekdays: String,
    pub holidays: String,
    pub session_tokens: String,

    /// 关闭超时时间 (毫秒)
    pub shutdown_timeout_ms: u64,
}

/// 读取并解析环境变量，缺失用默认值，格式错误记录 warn 后用默认值
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Malformed config value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub(crate) fn parse_capacities(value: &str) -> Option<Vec<u32>> {
    let capacities: Vec<u32> = value
        .split(',')
        .map(|part| part.trim().parse().ok().filter(|c: &u32| *c > 0))
        .collect::<Option<_>>()?;
    (!capacities.is_empty()).then_some(capacities)
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        let defaults = Self::defaults();

        let table_capacities = match std::env::var("TABLE_CAPACITIES") {
            Ok(raw) => parse_capacities(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Malformed TABLE_CAPACITIES, using default");
                defaults.table_capacities.clone()
            }),
            Err(_) => defaults.table_capacities.clone(),
        };

        let opening_hours = match std::env::var("OPENING_HOURS") {
            Ok(raw) => OpeningHours::parse(&raw).unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Malformed OPENING_HOURS, using default");
                defaults.opening_hours
            }),
            Err(_) => defaults.opening_hours,
        };

        Self {
            work_dir: env_string("WORK_DIR", &defaults.work_dir),
            message_tcp_port: env_or("MESSAGE_TCP_PORT", defaults.message_tcp_port),
            environment: env_string("ENVIRONMENT", &defaults.environment),
            log_level: env_string("LOG_LEVEL", &defaults.log_level),
            timezone: std::env::var("TIMEZONE")
                .map(|name| parse_timezone(&name))
                .unwrap_or(defaults.timezone),
            pool_size: env_or("POOL_SIZE", defaults.pool_size).max(1),
            pool_timeout_ms: env_or("POOL_TIMEOUT_MS", defaults.pool_timeout_ms),
            reservation_duration_min: env_or("RESERVATION_DURATION_MIN", defaults.reservation_duration_min).max(1),
            slot_granularity_min: env_or("SLOT_GRANULARITY_MIN", defaults.slot_granularity_min).max(1),
            booking_lead_min: env_or("BOOKING_LEAD_MIN", defaults.booking_lead_min),
            no_show_grace_min: env_or("NO_SHOW_GRACE_MIN", defaults.no_show_grace_min),
            no_show_sweep_secs: env_or("NO_SHOW_SWEEP_SECS", defaults.no_show_sweep_secs).max(1),
            reminder_lead_min: env_or("REMINDER_LEAD_MIN", defaults.reminder_lead_min),
            reminder_sweep_secs: env_or("REMINDER_SWEEP_SECS", defaults.reminder_sweep_secs).max(1),
            wait_floor_min: env_or("WAIT_FLOOR_MIN", defaults.wait_floor_min),
            default_wait_min: env_or("DEFAULT_WAIT_MIN", defaults.default_wait_min),
            table_capacities,
            opening_hours,
            closed_weekdays: env_string("CLOSED_WEEKDAYS", ""),
            holidays: env_string("HOLIDAYS", ""),
            session_tokens: env_string("SESSION_TOKENS", ""),
            shutdown_timeout_ms: env_or("SHUTDOWN_TIMEOUT_MS", defaults.shutdown_timeout_ms),
        }
    }

    /// 内置默认值 (不读环境变量)
    pub fn defaults() -> Self {
        Self {
            work_dir: "/var/lib/seating".into(),
            message_tcp_port: 8081,
            environment: "development".into(),
            log_level: "info".into(),
            timezone: chrono_tz::Europe::Madrid,
            pool_size: 4,
            pool_timeout_ms: 5000,
            reservation_duration_min: 120,
            slot_granularity_min: 30,
            booking_lead_min: 60,
            no_show_grace_min: 15,
            no_show_sweep_secs: 300,
            reminder_lead_min: 60,
            reminder_sweep_secs: 300,
            wait_floor_min: 5,
            default_wait_min: 30,
            table_capacities: vec![2, 2, 4, 4, 6],
            opening_hours: OpeningHours {
                open: chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default(),
                close: chrono::NaiveTime::from_hms_opt(23, 0, 0).unwrap_or_default(),
            },
            closed_weekdays: String::new(),
            holidays: String::new(),
            session_tokens: String::new(),
            shutdown_timeout_ms: 10000,
        }
    }

    /// 测试用配置：指定工作目录与端口，其余取默认值
    pub fn for_tests(work_dir: impl Into<String>, message_tcp_port: u16) -> Self {
        let mut config = Self::defaults();
        config.work_dir = work_dir.into();
        config.message_tcp_port = message_tcp_port;
        config
    }

    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    pub fn database_path(&self) -> PathBuf {
        self.database_dir().join("seating.redb")
    }

    pub fn logs_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.database_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("0.0.0.0:{}", self.message_tcp_port)
    }

    pub fn slot_rules(&self) -> SlotRules {
        SlotRules {
            duration_min: self.reservation_duration_min,
            granularity_min: self.slot_granularity_min,
            booking_lead_min: self.booking_lead_min,
        }
    }

    pub fn waitlist_rules(&self) -> WaitlistRules {
        WaitlistRules {
            wait_floor_min: self.wait_floor_min,
            default_wait_min: self.default_wait_min,
            hold_grace_min: self.no_show_grace_min,
        }
    }

    pub fn pool_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// 营业时间：默认时段 + 休息日 + 节假日。格式错误的条目记录 warn 后忽略
    pub fn business_hours(&self) -> BusinessHours {
        let mut business = BusinessHours::new(self.opening_hours);

        match hours::parse_weekdays(&self.closed_weekdays) {
            Ok(weekdays) => business = business.closed_on(weekdays),
            Err(e) => tracing::warn!(value = %self.closed_weekdays, error = %e, "Ignoring CLOSED_WEEKDAYS"),
        }
        match hours::parse_holidays(&self.holidays) {
            Ok(holidays) => {
                for (date, hours) in holidays {
                    business = business.with_holiday(date, hours);
                }
            }
            Err(e) => tracing::warn!(value = %self.holidays, error = %e, "Ignoring HOLIDAYS"),
        }
        business
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::HoursProvider;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_capacities() {
        assert_eq!(parse_capacities("2, 4,6"), Some(vec![2, 4, 6]));
        assert_eq!(parse_capacities("2,x"), None);
        assert_eq!(parse_capacities("2,0"), None);
        assert_eq!(parse_capacities(""), None);
    }

    #[test]
    fn test_defaults_and_paths() {
        let config = Config::for_tests("/tmp/seating-test", 0);
        assert_eq!(config.table_capacities, vec![2, 2, 4, 4, 6]);
        assert_eq!(config.slot_rules().duration_min, 120);
        assert_eq!(config.waitlist_rules().default_wait_min, 30);
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/seating-test/database/seating.redb")
        );
        assert_eq!(config.listen_addr(), "0.0.0.0:0");
        assert!(config.is_development());
    }

    #[test]
    fn test_business_hours_from_config() {
        let mut config = Config::for_tests("/tmp", 0);
        config.closed_weekdays = "Mon".into();
        config.holidays = "2026-12-25,2026-12-24=12:00-16:00".into();
        let hours = config.business_hours();

        assert!(hours.hours_for(NaiveDate::from_ymd_opt(2026, 5, 18).unwrap()).is_none());
        assert!(hours.hours_for(NaiveDate::from_ymd_opt(2026, 12, 25).unwrap()).is_none());
        let eve = hours.hours_for(NaiveDate::from_ymd_opt(2026, 12, 24).unwrap()).unwrap();
        assert_eq!(eve.close, chrono::NaiveTime::from_hms_opt(16, 0, 0).unwrap());
    }

    #[test]
    fn test_malformed_business_hours_entries_ignored() {
        let mut config = Config::for_tests("/tmp", 0);
        config.closed_weekdays = "Someday".into();
        let hours = config.business_hours();
        assert!(hours.hours_for(NaiveDate::from_ymd_opt(2026, 5, 18).unwrap()).is_some());
    }
}
