//! 营业时间
//!
//! 作为外部输入读取：默认每日营业时段、固定休息的星期、节假日
//! (整天休息或改用特殊时段)。

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::Serialize;

use crate::utils::time::{parse_date, parse_time};
use crate::utils::{AppError, AppResult};

/// 某日营业时段 `[open, close)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpeningHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl OpeningHours {
    /// 解析 `HH:MM-HH:MM`
    pub fn parse(value: &str) -> AppResult<Self> {
        let (open, close) = value
            .split_once('-')
            .ok_or_else(|| AppError::validation(format!("Invalid opening hours: {}", value)))?;
        let hours = Self {
            open: parse_time(open.trim())?,
            close: parse_time(close.trim())?,
        };
        if hours.close <= hours.open {
            return Err(AppError::validation(format!(
                "Closing time must be after opening time: {}",
                value
            )));
        }
        Ok(hours)
    }
}

/// 营业时间来源
pub trait HoursProvider: Send + Sync {
    /// `None` 表示当天不营业
    fn hours_for(&self, date: NaiveDate) -> Option<OpeningHours>;
}

/// 基于配置的营业时间
#[derive(Debug, Clone)]
pub struct BusinessHours {
    default: OpeningHours,
    closed_weekdays: Vec<Weekday>,
    /// 日期 -> 特殊时段 (None = 休息)
    holidays: HashMap<NaiveDate, Option<OpeningHours>>,
}

impl BusinessHours {
    pub fn new(default: OpeningHours) -> Self {
        Self {
            default,
            closed_weekdays: Vec::new(),
            holidays: HashMap::new(),
        }
    }

    pub fn closed_on(mut self, weekdays: impl IntoIterator<Item = Weekday>) -> Self {
        self.closed_weekdays.extend(weekdays);
        self
    }

    pub fn with_holiday(mut self, date: NaiveDate, hours: Option<OpeningHours>) -> Self {
        self.holidays.insert(date, hours);
        self
    }
}

impl HoursProvider for BusinessHours {
    fn hours_for(&self, date: NaiveDate) -> Option<OpeningHours> {
        if let Some(special) = self.holidays.get(&date) {
            return *special;
        }
        if self.closed_weekdays.contains(&date.weekday()) {
            return None;
        }
        Some(self.default)
    }
}

/// 解析 `Mon,Tue`
pub fn parse_weekdays(value: &str) -> AppResult<Vec<Weekday>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Weekday>()
                .map_err(|_| AppError::validation(format!("Invalid weekday: {}", s)))
        })
        .collect()
}

/// 解析 `2026-12-25,2026-12-24=12:00-16:00`
pub fn parse_holidays(value: &str) -> AppResult<Vec<(NaiveDate, Option<OpeningHours>)>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((date, hours)) => Ok((parse_date(date.trim())?, Some(OpeningHours::parse(hours)?))),
            None => Ok((parse_date(entry)?, None)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_parse_hours() {
        let hours = OpeningHours::parse("12:00-23:00").unwrap();
        assert_eq!(hours.open, t(12, 0));
        assert_eq!(hours.close, t(23, 0));
        assert!(OpeningHours::parse("23:00-12:00").is_err());
        assert!(OpeningHours::parse("noon").is_err());
    }

    #[test]
    fn test_holiday_overrides_weekday() {
        let christmas_eve = NaiveDate::from_ymd_opt(2026, 12, 24).unwrap(); // Thursday
        let christmas = NaiveDate::from_ymd_opt(2026, 12, 25).unwrap();
        let monday = NaiveDate::from_ymd_opt(2026, 12, 21).unwrap();

        let hours = BusinessHours::new(OpeningHours::parse("12:00-23:00").unwrap())
            .closed_on(parse_weekdays("Mon").unwrap())
            .with_holiday(christmas, None)
            .with_holiday(christmas_eve, Some(OpeningHours::parse("12:00-16:00").unwrap()));

        assert_eq!(hours.hours_for(monday), None);
        assert_eq!(hours.hours_for(christmas), None);
        assert_eq!(hours.hours_for(christmas_eve).unwrap().close, t(16, 0));
        assert_eq!(hours.hours_for(monday.succ_opt().unwrap()).unwrap().close, t(23, 0));
    }

    #[test]
    fn test_parse_holiday_list() {
        let parsed = parse_holidays("2026-12-25, 2026-12-24=12:00-16:00").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].1, None);
        assert!(parsed[1].1.is_some());
        assert!(parse_holidays("").unwrap().is_empty());
        assert!(parse_holidays("25/12").is_err());
    }

    #[test]
    fn test_parse_weekdays() {
        assert_eq!(parse_weekdays("Mon, tue").unwrap(), vec![Weekday::Mon, Weekday::Tue]);
        assert!(parse_weekdays("Funday").is_err());
    }
}
