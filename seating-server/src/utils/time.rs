//! 时间工具：业务时区时钟与参数解析
//!
//! 所有预订时间都是餐厅所在时区的本地时间 (`NaiveDateTime`)，
//! 时区换算只在 [`SystemClock`] 里发生一次。

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;

use super::{AppError, AppResult};

/// 业务时钟
pub trait Clock: Send + Sync {
    /// 当前业务时区本地时间
    fn now(&self) -> NaiveDateTime;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// 系统时钟 (业务时区)
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// 手动时钟，测试用
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock();
        *guard += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

/// 解析日期字符串 (YYYY-MM-DD)
pub fn parse_date(date: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppError::validation(format!("Invalid date format: {}", date)))
}

/// 解析时间字符串 (HH:MM 或 HH:MM:SS)
pub fn parse_time(time: &str) -> AppResult<NaiveTime> {
    NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map_err(|_| AppError::validation(format!("Invalid time format: {}", time)))
}

/// 解析时区名，无效时回退 UTC
pub fn parse_timezone(name: &str) -> Tz {
    name.parse().unwrap_or_else(|_| {
        tracing::warn!(timezone = %name, "Unknown timezone, falling back to UTC");
        Tz::UTC
    })
}

/// 分钟数 (自零点起) → NaiveTime，超出一天返回 None
pub fn minutes_to_time(minutes: u32) -> Option<NaiveTime> {
    if minutes >= 24 * 60 {
        return None;
    }
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

/// NaiveTime → 自零点起的分钟数 (秒向下取整)
pub fn time_to_minutes(time: NaiveTime) -> u32 {
    use chrono::Timelike;
    time.hour() * 60 + time.minute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(parse_time("19:30").unwrap(), NaiveTime::from_hms_opt(19, 30, 0).unwrap());
        assert_eq!(parse_time("19:30:15").unwrap(), NaiveTime::from_hms_opt(19, 30, 15).unwrap());
        assert!(matches!(parse_time("7pm"), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date("2026-02-30").is_err());
        assert!(parse_date("2026-03-01").is_ok());
    }

    #[test]
    fn test_minutes_round_trip_bounds() {
        assert_eq!(minutes_to_time(0), NaiveTime::from_hms_opt(0, 0, 0));
        assert_eq!(minutes_to_time(24 * 60), None);
        assert_eq!(time_to_minutes(NaiveTime::from_hms_opt(23, 59, 59).unwrap()), 1439);
    }

    #[test]
    fn test_manual_clock_advance() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        let clock = ManualClock::new(start);
        clock.advance(chrono::Duration::minutes(16));
        assert_eq!(clock.now(), start + chrono::Duration::minutes(16));
        assert_eq!(clock.today(), start.date());
    }

    #[test]
    fn test_unknown_timezone_falls_back() {
        assert_eq!(parse_timezone("Mars/Olympus"), Tz::UTC);
        assert_eq!(parse_timezone("Europe/Madrid"), chrono_tz::Europe::Madrid);
    }
}
