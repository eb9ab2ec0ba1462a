//! 现场候位 (WaitlistEstimator)
//!
//! 现场客人先检查能否立即入座：当前在座的各桌、`[now, now + D)` 内
//! 即将开始的预订、已叫号保留的候位，加上这组客人，一起做装桌判定。
//! 可以则真实分配桌台并直接入座；不行则估算等待时间并可排队。

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;
use shared::models::{DiningTable, NewReservation, Reservation, ReservationKind, ReservationStatus};

use super::allocator::{can_pack, largest_capacity};
use super::registry::ReservationRegistry;
use super::slots::overlaps;
use crate::db::{Guarded, ReservationStorage};
use crate::services::{Identity, NotificationKind};
use crate::utils::{AppError, AppResult};

/// 等待时间规则
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitlistRules {
    /// 估算下限，避免报出接近 0 的等待
    pub wait_floor_min: u32,
    /// 无法预测时的默认等待
    pub default_wait_min: u32,
    /// 叫号保留的宽限期，过期即释放
    pub hold_grace_min: u32,
}

/// 现场客人检查结果
#[derive(Debug, Clone, PartialEq)]
pub enum WalkInOutcome {
    /// 已入座
    Seated(Reservation),
    /// 需要等待
    NotImmediate { estimated_wait_minutes: u32 },
}

/// 候位进度
#[derive(Debug, Clone, Serialize)]
pub struct WaitlistPosition {
    pub entry: Reservation,
    /// 排在第几位 (仅 PENDING)
    pub position: Option<usize>,
    pub estimated_wait_minutes: Option<u32>,
}

/// 某一时刻占用容量的负载快照
struct Occupancy {
    tables: Vec<DiningTable>,
    /// 在座 (任意日期)
    seated: Vec<Reservation>,
    /// 即将开始的预订 + 已叫号保留
    upcoming: Vec<Reservation>,
}

impl Occupancy {
    fn read(storage: &ReservationStorage, now: NaiveDateTime, duration: Duration) -> AppResult<Self> {
        let tables = storage.list_tables()?;
        let seated = storage.list_by_status(ReservationStatus::Seated)?;
        let window = (now, now + duration);

        let mut upcoming: Vec<Reservation> = storage
            .list_by_status(ReservationStatus::Pending)?
            .into_iter()
            .filter(|r| r.kind == ReservationKind::Reservation && overlaps(r.window(duration), window))
            .collect();
        upcoming.extend(
            storage
                .list_by_status(ReservationStatus::Notified)?
                .into_iter()
                .filter(|r| r.kind == ReservationKind::Waitlist),
        );

        Ok(Self {
            tables,
            seated,
            upcoming,
        })
    }

    fn capacities(&self) -> Vec<u32> {
        self.tables.iter().map(|t| t.capacity).collect()
    }

    /// 加入一组 `party_size` 人后能否装下
    fn admits(&self, party_size: u32) -> bool {
        let mut loads: Vec<u32> = self
            .seated
            .iter()
            .chain(self.upcoming.iter())
            .map(|r| r.party_size)
            .collect();
        loads.push(party_size);
        can_pack(&loads, &self.capacities())
    }

    /// 各占用方预计释放桌台的时间
    ///
    /// 在座：入座 + D；预订：开始 + D；叫号保留：叫号 + 宽限期
    fn release_at(r: &Reservation, duration: Duration, hold_grace: Duration) -> NaiveDateTime {
        match r.status {
            ReservationStatus::Seated => r.seated_at.unwrap_or_else(|| r.start()) + duration,
            ReservationStatus::Notified => r.notified_at.unwrap_or_else(|| r.start()) + hold_grace,
            _ => r.start() + duration,
        }
    }

    /// 最早能装下这组客人的时刻
    ///
    /// 按释放时间依次移除占用方，第一次装得下时即为答案。
    fn earliest_free(&self, party_size: u32, duration: Duration, hold_grace: Duration) -> Option<NaiveDateTime> {
        let capacities = self.capacities();
        let mut occupants: Vec<(NaiveDateTime, u32)> = self
            .seated
            .iter()
            .chain(self.upcoming.iter())
            .map(|r| (Self::release_at(r, duration, hold_grace), r.party_size))
            .collect();
        occupants.sort_by_key(|(release, _)| *release);

        occupants.iter().map(|(release, _)| *release).find(|&free_at| {
            let mut loads: Vec<u32> = occupants
                .iter()
                .filter(|(release, _)| *release > free_at)
                .map(|(_, size)| *size)
                .collect();
            loads.push(party_size);
            can_pack(&loads, &capacities)
        })
    }
}

/// 现场候位
pub struct WaitlistEstimator {
    registry: Arc<ReservationRegistry>,
    rules: WaitlistRules,
}

impl std::fmt::Debug for WaitlistEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitlistEstimator")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl WaitlistEstimator {
    pub fn new(registry: Arc<ReservationRegistry>, rules: WaitlistRules) -> Self {
        Self { registry, rules }
    }

    fn estimate(&self, occupancy: &Occupancy, party_size: u32, now: NaiveDateTime) -> u32 {
        let duration = self.registry.rules().duration();
        let hold_grace = Duration::minutes(i64::from(self.rules.hold_grace_min));
        match occupancy.earliest_free(party_size, duration, hold_grace) {
            Some(free_at) => {
                let minutes = (free_at - now).num_minutes().max(0) as u32;
                minutes.max(self.rules.wait_floor_min)
            }
            None => self.rules.default_wait_min,
        }
    }

    /// 检查能否立即入座，可以则直接分配桌台
    pub async fn check_availability_and_seat(
        &self,
        party_size: u32,
        requester: &Identity,
        contact: Option<String>,
    ) -> AppResult<WalkInOutcome> {
        if party_size == 0 {
            return Err(AppError::validation("Party size must be positive"));
        }
        let registry = &self.registry;
        let now = registry.clock().now();
        let duration = registry.rules().duration();

        let _guard = registry.creation_guard().await;
        let handle = registry.pool().borrow().await?;
        let occupancy = Occupancy::read(&handle, now, duration)?;

        if occupancy.admits(party_size) {
            let code = registry.issue_code(&handle, ReservationKind::Waitlist)?;
            drop(handle);
            let outcome = registry
                .allocator()
                .seat_new(NewReservation {
                    code,
                    kind: ReservationKind::Waitlist,
                    date: now.date(),
                    time: now.time(),
                    party_size,
                    owner_id: requester.id.clone(),
                    contact,
                    status: ReservationStatus::Pending,
                    placed_at: now,
                    estimated_wait_minutes: Some(0),
                })
                .await?;
            match outcome {
                Guarded::Applied(seated) => {
                    tracing::info!(
                        code = %seated.code,
                        party_size,
                        table_id = ?seated.table_id,
                        "Walk-in seated immediately"
                    );
                    return Ok(WalkInOutcome::Seated(seated));
                }
                // 总容量够但空闲桌台不合适 (在座客人占了大桌)
                Guarded::NoTable | Guarded::Skipped(_) => {
                    tracing::debug!(party_size, "Packing feasible but no matching free table");
                }
            }
        }

        let estimated_wait_minutes = self.estimate(&occupancy, party_size, now);
        tracing::info!(party_size, estimated_wait_minutes, "Walk-in must wait");
        Ok(WalkInOutcome::NotImmediate { estimated_wait_minutes })
    }

    /// 加入候位队列 (PENDING)
    pub async fn join(
        &self,
        party_size: u32,
        requester: &Identity,
        contact: Option<String>,
        estimated_wait_minutes: u32,
    ) -> AppResult<Reservation> {
        if party_size == 0 {
            return Err(AppError::validation("Party size must be positive"));
        }
        let registry = &self.registry;
        let now = registry.clock().now();

        let entry = {
            let _guard = registry.creation_guard().await;
            let handle = registry.pool().borrow().await?;

            let capacities: Vec<u32> = handle.list_tables()?.iter().map(|t| t.capacity).collect();
            if party_size > largest_capacity(&capacities) {
                return Err(AppError::validation(format!(
                    "Party of {} exceeds the largest table ({})",
                    party_size,
                    largest_capacity(&capacities)
                )));
            }

            let code = registry.issue_code(&handle, ReservationKind::Waitlist)?;
            handle.insert_reservation(NewReservation {
                code,
                kind: ReservationKind::Waitlist,
                date: now.date(),
                time: now.time(),
                party_size,
                owner_id: requester.id.clone(),
                contact,
                status: ReservationStatus::Pending,
                placed_at: now,
                estimated_wait_minutes: Some(estimated_wait_minutes),
            })?
        };

        tracing::info!(code = %entry.code, party_size, estimated_wait_minutes, "Joined waitlist");
        Ok(entry)
    }

    /// 今日排队中的候位，按加入顺序
    async fn queue(&self, now: NaiveDateTime) -> AppResult<Vec<Reservation>> {
        let handle = self.registry.pool().borrow().await?;
        let mut queue: Vec<Reservation> = handle
            .list_by_status(ReservationStatus::Pending)?
            .into_iter()
            .filter(|r| r.kind == ReservationKind::Waitlist && r.date == now.date())
            .collect();
        queue.sort_by_key(|r| (r.placed_at, r.id));
        Ok(queue)
    }

    /// 候位进度
    pub async fn position(&self, code: &str) -> AppResult<WaitlistPosition> {
        let entry = self.registry.find_by_code(code).await?;
        if entry.kind != ReservationKind::Waitlist {
            return Err(AppError::not_found(format!("Waitlist entry {} not found", code)));
        }
        if entry.status != ReservationStatus::Pending {
            return Ok(WaitlistPosition {
                entry,
                position: None,
                estimated_wait_minutes: None,
            });
        }

        let now = self.registry.clock().now();
        let queue = self.queue(now).await?;
        let position = queue.iter().position(|r| r.id == entry.id).map(|i| i + 1);

        let handle = self.registry.pool().borrow().await?;
        let occupancy = Occupancy::read(&handle, now, self.registry.rules().duration())?;
        let estimated_wait_minutes = Some(self.estimate(&occupancy, entry.party_size, now));

        Ok(WaitlistPosition {
            entry,
            position,
            estimated_wait_minutes,
        })
    }

    /// 叫号：按顺序找第一组有桌可坐的候位，保留桌台并通知
    ///
    /// 判定与保留在创建临界区内，新预订不会在两者之间插入。
    pub async fn notify_next(&self) -> AppResult<Option<Reservation>> {
        let now = self.registry.clock().now();
        let duration = self.registry.rules().duration();

        let _guard = self.registry.creation_guard().await;
        for entry in self.queue(now).await? {
            let admits = {
                let handle = self.registry.pool().borrow().await?;
                Occupancy::read(&handle, now, duration)?.admits(entry.party_size)
            };
            if !admits {
                continue;
            }

            match self.registry.transition(&entry, ReservationStatus::Notified).await {
                Ok(notified) => {
                    if let Some(contact) = &notified.contact {
                        let table = notified.table_id.map(|id| id.to_string()).unwrap_or_default();
                        self.registry.notifier().notify(
                            contact,
                            &format!("Your table is ready ({}), please come to table {}", notified.code, table),
                            NotificationKind::TableReady,
                        );
                    }
                    return Ok(Some(notified));
                }
                // 没有合适空桌或已被并发处理，看下一组
                Err(AppError::Conflict(_)) | Err(AppError::Transition { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// 取消候位 (本人或员工)
    pub async fn cancel(&self, code: &str, actor: &Identity) -> AppResult<Reservation> {
        let entry = self.registry.find_by_code(code).await?;
        if entry.kind != ReservationKind::Waitlist {
            return Err(AppError::not_found(format!("Waitlist entry {} not found", code)));
        }
        self.registry.cancel(code, actor).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seating::registry::BookingRequest;
    use crate::seating::testing::{Fixture, at, day, t};
    use crate::services::Role;

    fn walker(id: &str) -> Identity {
        Identity::new(id, Role::Guest)
    }

    #[tokio::test]
    async fn test_six_cannot_split_across_fours() {
        let fx = Fixture::new(&[2, 4, 4]).await;
        fx.clock.set(at(13, 0));
        let outcome = fx
            .waitlist
            .check_availability_and_seat(6, &walker("w1"), None)
            .await
            .unwrap();
        assert_eq!(outcome, WalkInOutcome::NotImmediate { estimated_wait_minutes: 30 });
        assert!(fx.registry.list_for_date(day()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_walk_in_seated_immediately() {
        let fx = Fixture::new(&[2, 4]).await;
        fx.clock.set(at(13, 0));
        let outcome = fx
            .waitlist
            .check_availability_and_seat(3, &walker("w1"), Some("555".to_string()))
            .await
            .unwrap();
        let WalkInOutcome::Seated(seated) = outcome else {
            panic!("expected seated, got {outcome:?}");
        };
        assert!(seated.code.starts_with('W'));
        assert_eq!(seated.status, ReservationStatus::Seated);
        assert_eq!(seated.table_id, Some(2));
        assert_eq!(seated.seated_at, Some(at(13, 0)));
    }

    #[tokio::test]
    async fn test_wait_is_time_until_adequate_table_frees() {
        let fx = Fixture::new(&[2, 4]).await;
        fx.clock.set(at(13, 0));
        fx.waitlist.check_availability_and_seat(4, &walker("w1"), None).await.unwrap();

        // 13:30 来了 3 人：4 人桌 15:00 空出
        fx.clock.set(at(13, 30));
        let outcome = fx.waitlist.check_availability_and_seat(3, &walker("w2"), None).await.unwrap();
        assert_eq!(outcome, WalkInOutcome::NotImmediate { estimated_wait_minutes: 90 });

        // 14:58 时只剩 2 分钟，按下限报 5 分钟
        fx.clock.set(at(14, 58));
        let outcome = fx.waitlist.check_availability_and_seat(3, &walker("w2"), None).await.unwrap();
        assert_eq!(outcome, WalkInOutcome::NotImmediate { estimated_wait_minutes: 5 });
    }

    #[tokio::test]
    async fn test_upcoming_reservation_blocks_walk_in() {
        let fx = Fixture::new(&[4]).await;
        fx.registry
            .create_reservation(
                &walker("guest"),
                BookingRequest {
                    date: day(),
                    time: t(14, 0),
                    party_size: 4,
                    contact: None,
                },
            )
            .await
            .unwrap();

        // 13:00 的现场客人会吃到 15:00，与 14:00 的预订冲突；唯一的桌 16:00 才空出
        fx.clock.set(at(13, 0));
        let outcome = fx.waitlist.check_availability_and_seat(2, &walker("w1"), None).await.unwrap();
        assert_eq!(outcome, WalkInOutcome::NotImmediate { estimated_wait_minutes: 180 });

        // 预订结束后没有冲突
        fx.clock.set(at(16, 0));
        let outcome = fx.waitlist.check_availability_and_seat(2, &walker("w1"), None).await.unwrap();
        assert!(matches!(outcome, WalkInOutcome::Seated(_)));
    }

    #[tokio::test]
    async fn test_held_table_released_after_grace() {
        let fx = Fixture::new(&[2]).await;
        fx.clock.set(at(13, 0));
        fx.waitlist.join(2, &walker("w1"), None, 10).await.unwrap();
        let held = fx.waitlist.notify_next().await.unwrap().unwrap();
        assert_eq!(held.table_id, Some(1));

        // 保留到 13:15，之后下一组可以入座
        fx.clock.set(at(13, 5));
        let outcome = fx.waitlist.check_availability_and_seat(2, &walker("w2"), None).await.unwrap();
        assert_eq!(outcome, WalkInOutcome::NotImmediate { estimated_wait_minutes: 10 });
    }

    #[tokio::test]
    async fn test_wait_picks_earliest_release_that_makes_room() {
        let fx = Fixture::new(&[2, 4]).await;
        fx.clock.set(at(13, 0));
        fx.waitlist.check_availability_and_seat(2, &walker("w0"), None).await.unwrap();
        fx.clock.set(at(13, 30));
        fx.waitlist.check_availability_and_seat(4, &walker("w1"), None).await.unwrap();

        // 2 人桌 15:00 空出也坐不下 3 人，要等 4 人桌 15:30
        fx.clock.set(at(14, 0));
        let outcome = fx.waitlist.check_availability_and_seat(3, &walker("w2"), None).await.unwrap();
        assert_eq!(outcome, WalkInOutcome::NotImmediate { estimated_wait_minutes: 90 });
    }

    #[tokio::test]
    async fn test_join_and_position() {
        let fx = Fixture::new(&[2]).await;
        fx.clock.set(at(13, 0));
        fx.waitlist.check_availability_and_seat(2, &walker("w0"), None).await.unwrap();

        let first = fx.waitlist.join(2, &walker("w1"), None, 120).await.unwrap();
        fx.clock.set(at(13, 5));
        let second = fx.waitlist.join(1, &walker("w2"), None, 115).await.unwrap();
        assert_eq!(first.status, ReservationStatus::Pending);
        assert_eq!(first.estimated_wait_minutes, Some(120));

        let status = fx.waitlist.position(&second.code).await.unwrap();
        assert_eq!(status.position, Some(2));
        assert_eq!(status.estimated_wait_minutes, Some(115));
        assert_eq!(fx.waitlist.position(&first.code).await.unwrap().position, Some(1));
    }

    #[tokio::test]
    async fn test_join_rejects_oversize_party() {
        let fx = Fixture::new(&[2, 4]).await;
        let result = fx.waitlist.join(5, &walker("w1"), None, 30).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        let result = fx.waitlist.check_availability_and_seat(0, &walker("w1"), None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_notify_next_holds_table_in_order() {
        let fx = Fixture::new(&[2, 4]).await;
        fx.clock.set(at(13, 0));
        let big = fx.waitlist.check_availability_and_seat(4, &walker("w0"), None).await.unwrap();
        let WalkInOutcome::Seated(big) = big else { panic!("expected seated") };

        let four = fx.waitlist.join(4, &walker("w1"), Some("111".to_string()), 120).await.unwrap();
        let two = fx.waitlist.join(2, &walker("w2"), Some("222".to_string()), 5).await.unwrap();

        // 4 人桌被占，先叫能坐 2 人桌的那组
        let notified = fx.waitlist.notify_next().await.unwrap().unwrap();
        assert_eq!(notified.code, two.code);
        assert_eq!(notified.status, ReservationStatus::Notified);
        assert_eq!(notified.table_id, Some(1));
        assert_eq!(notified.notified_at, Some(at(13, 0)));
        assert_eq!(fx.notifier.count(NotificationKind::TableReady), 1);

        assert!(fx.waitlist.notify_next().await.unwrap().is_none());

        fx.registry.complete(&big.code).await.unwrap();
        let notified = fx.waitlist.notify_next().await.unwrap().unwrap();
        assert_eq!(notified.code, four.code);

        // 叫号后到店入座沿用保留的桌台
        let seated = fx.registry.check_in(&two.code).await.unwrap();
        assert_eq!(seated.table_id, Some(1));
    }

    #[tokio::test]
    async fn test_notify_next_waits_for_creation_lock() {
        let fx = Fixture::new(&[4]).await;
        fx.clock.set(at(13, 0));
        let entry = fx.waitlist.join(4, &walker("w1"), None, 10).await.unwrap();

        let guard = fx.registry.creation_guard().await;
        let blocked = tokio::time::timeout(std::time::Duration::from_millis(50), fx.waitlist.notify_next()).await;
        assert!(blocked.is_err());
        drop(guard);

        let notified = fx.waitlist.notify_next().await.unwrap().unwrap();
        assert_eq!(notified.code, entry.code);
    }

    #[tokio::test]
    async fn test_cancel_only_waitlist_entries() {
        let fx = Fixture::new(&[2, 4]).await;
        let reservation = fx
            .registry
            .create_reservation(
                &walker("guest"),
                BookingRequest {
                    date: day(),
                    time: t(19, 0),
                    party_size: 2,
                    contact: None,
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            fx.waitlist.cancel(&reservation.code, &walker("guest")).await,
            Err(AppError::NotFound(_))
        ));

        let entry = fx.waitlist.join(2, &walker("w1"), None, 10).await.unwrap();
        let cancelled = fx.waitlist.cancel(&entry.code, &walker("w1")).await.unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
    }
}
