//! Reservation / Waitlist Model
//!
//! 预订与候位共用同一个实体，通过 [`ReservationKind`] 区分。
//! 记录永不删除，终态 (COMPLETED / CANCELLED / NO_SHOW) 作为历史保留。

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationKind {
    /// 提前预订
    Reservation,
    /// 现场候位
    Waitlist,
}

impl ReservationKind {
    /// 确认码前缀
    pub const fn code_prefix(&self) -> char {
        match self {
            ReservationKind::Reservation => 'R',
            ReservationKind::Waitlist => 'W',
        }
    }
}

impl fmt::Display for ReservationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationKind::Reservation => write!(f, "RESERVATION"),
            ReservationKind::Waitlist => write!(f, "WAITLIST"),
        }
    }
}

/// 记录状态
///
/// ```text
/// PENDING ──▶ NOTIFIED (waitlist only) ──▶ SEATED ──▶ COMPLETED
///    │            │                          
///    ├────────────┴──▶ CANCELLED
///    └────────────┴──▶ NO_SHOW
/// PENDING ──▶ SEATED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Notified,
    Seated,
    Completed,
    Cancelled,
    NoShow,
}

impl ReservationStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Notified => "NOTIFIED",
            ReservationStatus::Seated => "SEATED",
            ReservationStatus::Completed => "COMPLETED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::NoShow => "NO_SHOW",
        }
    }

    /// 终态不可再迁移
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed | ReservationStatus::Cancelled | ReservationStatus::NoShow
        )
    }

    /// 状态机：判断 `self -> next` 是否合法
    pub fn can_transition_to(&self, next: ReservationStatus, kind: ReservationKind) -> bool {
        use ReservationStatus::*;
        match (self, next) {
            (Pending, Notified) => kind == ReservationKind::Waitlist,
            (Pending, Seated | Cancelled | NoShow) => true,
            (Notified, Seated | Cancelled | NoShow) => true,
            (Seated, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reservation / waitlist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// 顺序号 (存储层分配)
    pub id: u64,
    /// 对外确认码，全局唯一
    pub code: String,
    pub kind: ReservationKind,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: u32,
    /// 下单身份
    pub owner_id: String,
    /// 联系方式 (通知用)
    pub contact: Option<String>,
    pub status: ReservationStatus,
    pub placed_at: NaiveDateTime,
    /// 候位叫号时间 (仅 waitlist)
    pub notified_at: Option<NaiveDateTime>,
    pub seated_at: Option<NaiveDateTime>,
    /// 当前占用/保留的桌台
    pub table_id: Option<u32>,
    /// 入队时给出的预计等待分钟数 (仅 waitlist)
    pub estimated_wait_minutes: Option<u32>,
    pub reminded_at: Option<NaiveDateTime>,
}

impl Reservation {
    /// 预定开始时间
    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// `[start, start + duration)`
    pub fn window(&self, duration: Duration) -> (NaiveDateTime, NaiveDateTime) {
        let start = self.start();
        (start, start + duration)
    }

    /// 是否占用桌台容量 (用于可用性计算)
    ///
    /// 已入座的记录总是占用；未到店的预订占用其时段；已叫号的候位保留了桌台。
    pub fn holds_capacity(&self) -> bool {
        match (self.kind, self.status) {
            (_, ReservationStatus::Seated) => true,
            (ReservationKind::Reservation, ReservationStatus::Pending) => true,
            (ReservationKind::Waitlist, ReservationStatus::Notified) => true,
            _ => false,
        }
    }
}

/// 新建记录 (id 由存储层分配)
#[derive(Debug, Clone, PartialEq)]
pub struct NewReservation {
    pub code: String,
    pub kind: ReservationKind,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: u32,
    pub owner_id: String,
    pub contact: Option<String>,
    pub status: ReservationStatus,
    pub placed_at: NaiveDateTime,
    pub estimated_wait_minutes: Option<u32>,
}

impl NewReservation {
    pub fn into_reservation(self, id: u64) -> Reservation {
        Reservation {
            id,
            code: self.code,
            kind: self.kind,
            date: self.date,
            time: self.time,
            party_size: self.party_size,
            owner_id: self.owner_id,
            contact: self.contact,
            status: self.status,
            placed_at: self.placed_at,
            notified_at: None,
            seated_at: None,
            table_id: None,
            estimated_wait_minutes: self.estimated_wait_minutes,
            reminded_at: None,
        }
    }
}

/// 候选时段 (派生值，不持久化)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ReservationStatus::*;

    #[test]
    fn test_state_machine() {
        let r = ReservationKind::Reservation;
        let w = ReservationKind::Waitlist;

        assert!(Pending.can_transition_to(Seated, r));
        assert!(Pending.can_transition_to(Cancelled, r));
        assert!(Pending.can_transition_to(NoShow, r));
        assert!(Seated.can_transition_to(Completed, r));

        assert!(Pending.can_transition_to(Notified, w));
        assert!(!Pending.can_transition_to(Notified, r));
        assert!(Notified.can_transition_to(NoShow, w));

        // terminal states never move
        for terminal in [Completed, Cancelled, NoShow] {
            assert!(terminal.is_terminal());
            for next in [Pending, Notified, Seated, Completed, Cancelled, NoShow] {
                assert!(!terminal.can_transition_to(next, r));
                assert!(!terminal.can_transition_to(next, w));
            }
        }

        assert!(!Seated.can_transition_to(Cancelled, r));
        assert!(!Seated.can_transition_to(NoShow, r));
    }

    #[test]
    fn test_status_serde_names() {
        assert_eq!(serde_json::to_string(&NoShow).unwrap(), "\"NO_SHOW\"");
        assert_eq!(
            serde_json::to_string(&ReservationKind::Waitlist).unwrap(),
            "\"WAITLIST\""
        );
    }
}
