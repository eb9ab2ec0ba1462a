//! 可预订时段计算 (SlotAvailabilityCalculator)
//!
//! 纯函数，无副作用。候选开始时间按粒度 G 从开门时间起排列，
//! 要求 `t + D ≤ close`；当天的候选还需不早于 `now + lead`。
//! 每个候选收集与 `[t, t + D)` 重叠的已有记录人数，加上本次人数，
//! 交给 [`can_pack`] 判断。

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use shared::models::{Reservation, TimeSlot};

use super::allocator::{can_pack, largest_capacity};
use crate::services::hours::OpeningHours;
use crate::utils::time::{minutes_to_time, time_to_minutes};

/// 时段规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRules {
    /// 每次用餐时长 D (分钟)
    pub duration_min: u32,
    /// 时段粒度 G (分钟)
    pub granularity_min: u32,
    /// 当天预订的最短提前量 (分钟)
    pub booking_lead_min: u32,
}

impl SlotRules {
    pub fn duration(&self) -> Duration {
        Duration::minutes(self.duration_min as i64)
    }
}

/// 半开区间重叠
pub fn overlaps(a: (NaiveDateTime, NaiveDateTime), b: (NaiveDateTime, NaiveDateTime)) -> bool {
    a.0 < b.1 && b.0 < a.1
}

/// 候选开始时间 (不看容量)
pub fn candidate_starts(rules: &SlotRules, date: NaiveDate, hours: &OpeningHours, now: NaiveDateTime) -> Vec<NaiveTime> {
    if rules.granularity_min == 0 {
        return Vec::new();
    }
    let open = time_to_minutes(hours.open);
    let close = time_to_minutes(hours.close);
    let earliest = now + Duration::minutes(rules.booking_lead_min as i64);

    let mut starts = Vec::new();
    let mut t = open;
    while t + rules.duration_min <= close {
        if let Some(start) = minutes_to_time(t)
            && date.and_time(start) >= earliest
        {
            starts.push(start);
        }
        t += rules.granularity_min;
    }
    starts
}

/// `start` 开始的一桌 `party_size` 人能否与已有记录同时安排
pub fn fits(
    rules: &SlotRules,
    existing: &[Reservation],
    capacities: &[u32],
    date: NaiveDate,
    start: NaiveTime,
    party_size: u32,
) -> bool {
    let begin = date.and_time(start);
    let window = (begin, begin + rules.duration());

    let mut loads: Vec<u32> = existing
        .iter()
        .filter(|r| r.holds_capacity() && overlaps(r.window(rules.duration()), window))
        .map(|r| r.party_size)
        .collect();
    loads.push(party_size);

    can_pack(&loads, capacities)
}

/// 某日可预订时段，按时间升序
pub fn available_slots(
    rules: &SlotRules,
    date: NaiveDate,
    hours: &OpeningHours,
    now: NaiveDateTime,
    existing: &[Reservation],
    capacities: &[u32],
    party_size: u32,
) -> Vec<TimeSlot> {
    if party_size == 0 || party_size > largest_capacity(capacities) {
        return Vec::new();
    }

    candidate_starts(rules, date, hours, now)
        .into_iter()
        .filter(|start| fits(rules, existing, capacities, date, *start, party_size))
        .map(|start| TimeSlot {
            start,
            end: start + rules.duration(),
        })
        .collect()
}
