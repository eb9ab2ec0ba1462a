//! 预订登记 (ReservationRegistry)
//!
//! - 创建：全局临界区内重新计算可用性，再生成确认码并插入
//! - 状态迁移：先按状态机校验，再做带预期状态的条件写
//! - 入座 / 叫号：经 [`TableAllocator`] 在同一写事务内完成选桌与状态迁移

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use shared::models::{NewReservation, Reservation, ReservationKind, ReservationStatus, TimeSlot};
use tokio::sync::{Mutex, MutexGuard};

use super::allocator::{TableAllocator, largest_capacity};
use super::codes::{CodeGenerator, issue_code};
use super::slots::{SlotRules, available_slots, candidate_starts, fits};
use crate::db::{Guarded, ReservationStorage, StoragePool};
use crate::services::{HoursProvider, Identity, NotificationKind, Notifier};
use crate::utils::{AppError, AppResult, Clock};

const ALL_STATUSES: [ReservationStatus; 6] = [
    ReservationStatus::Pending,
    ReservationStatus::Notified,
    ReservationStatus::Seated,
    ReservationStatus::Completed,
    ReservationStatus::Cancelled,
    ReservationStatus::NoShow,
];

/// 能迁移到 `next` 的前置状态
fn predecessors(next: ReservationStatus, kind: ReservationKind) -> Vec<ReservationStatus> {
    ALL_STATUSES
        .into_iter()
        .filter(|s| s.can_transition_to(next, kind))
        .collect()
}

/// 预订请求
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: u32,
    pub contact: Option<String>,
}

/// 预订登记
pub struct ReservationRegistry {
    pool: StoragePool,
    allocator: TableAllocator,
    hours: Arc<dyn HoursProvider>,
    codes: Arc<dyn CodeGenerator>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    rules: SlotRules,
    /// 创建临界区 (预订与候位共用)
    creation: Mutex<()>,
}

impl std::fmt::Debug for ReservationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationRegistry")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

impl ReservationRegistry {
    pub fn new(
        pool: StoragePool,
        hours: Arc<dyn HoursProvider>,
        codes: Arc<dyn CodeGenerator>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        rules: SlotRules,
    ) -> Self {
        Self {
            allocator: TableAllocator::new(pool.clone()),
            pool,
            hours,
            codes,
            notifier,
            clock,
            rules,
            creation: Mutex::new(()),
        }
    }

    // ========== Accessors (waitlist / monitors) ==========

    pub fn pool(&self) -> &StoragePool {
        &self.pool
    }

    pub fn allocator(&self) -> &TableAllocator {
        &self.allocator
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn rules(&self) -> &SlotRules {
        &self.rules
    }

    /// 进入创建临界区
    pub async fn creation_guard(&self) -> MutexGuard<'_, ()> {
        self.creation.lock().await
    }

    /// 生成确认码，调用方须持有创建临界区
    pub(crate) fn issue_code(&self, storage: &ReservationStorage, kind: ReservationKind) -> AppResult<String> {
        issue_code(self.codes.as_ref(), storage, kind)
    }

    // ========== Queries ==========

    /// 某日可预订时段；不营业返回空
    pub async fn available_slots(&self, date: NaiveDate, party_size: u32) -> AppResult<Vec<TimeSlot>> {
        if party_size == 0 {
            return Err(AppError::validation("Party size must be positive"));
        }
        let Some(hours) = self.hours.hours_for(date) else {
            return Ok(Vec::new());
        };

        let handle = self.pool.borrow().await?;
        let existing = handle.list_by_date(date)?;
        let capacities: Vec<u32> = handle.list_tables()?.iter().map(|t| t.capacity).collect();
        drop(handle);

        Ok(available_slots(
            &self.rules,
            date,
            &hours,
            self.clock.now(),
            &existing,
            &capacities,
            party_size,
        ))
    }

    pub async fn find_by_code(&self, code: &str) -> AppResult<Reservation> {
        let handle = self.pool.borrow().await?;
        handle
            .find_by_code(code)?
            .ok_or_else(|| AppError::not_found(format!("Reservation {} not found", code)))
    }

    pub async fn list_for_date(&self, date: NaiveDate) -> AppResult<Vec<Reservation>> {
        let handle = self.pool.borrow().await?;
        Ok(handle.list_by_date(date)?)
    }

    // ========== Creation ==========

    /// 创建预订
    ///
    /// 参数校验在临界区外；容量复核、确认码、插入在临界区内。
    pub async fn create_reservation(&self, owner: &Identity, request: BookingRequest) -> AppResult<Reservation> {
        if request.party_size == 0 {
            return Err(AppError::validation("Party size must be positive"));
        }
        let hours = self
            .hours
            .hours_for(request.date)
            .ok_or_else(|| AppError::validation(format!("Restaurant is closed on {}", request.date)))?;
        let now = self.clock.now();
        if !candidate_starts(&self.rules, request.date, &hours, now).contains(&request.time) {
            return Err(AppError::validation(format!(
                "{} {} is not a bookable start time",
                request.date, request.time
            )));
        }

        let record = {
            let _guard = self.creation_guard().await;
            let handle = self.pool.borrow().await?;

            let capacities: Vec<u32> = handle.list_tables()?.iter().map(|t| t.capacity).collect();
            if request.party_size > largest_capacity(&capacities) {
                return Err(AppError::validation(format!(
                    "Party of {} exceeds the largest table ({})",
                    request.party_size,
                    largest_capacity(&capacities)
                )));
            }

            let existing = handle.list_by_date(request.date)?;
            if !fits(&self.rules, &existing, &capacities, request.date, request.time, request.party_size) {
                tracing::info!(
                    date = %request.date,
                    time = %request.time,
                    party_size = request.party_size,
                    "Slot no longer available"
                );
                return Err(AppError::conflict(format!(
                    "No table for {} at {} {}",
                    request.party_size, request.date, request.time
                )));
            }

            let code = self.issue_code(&handle, ReservationKind::Reservation)?;
            handle.insert_reservation(NewReservation {
                code,
                kind: ReservationKind::Reservation,
                date: request.date,
                time: request.time,
                party_size: request.party_size,
                owner_id: owner.id.clone(),
                contact: request.contact,
                status: ReservationStatus::Pending,
                placed_at: now,
                estimated_wait_minutes: None,
            })?
        };

        tracing::info!(
            code = %record.code,
            date = %record.date,
            time = %record.time,
            party_size = record.party_size,
            owner = %record.owner_id,
            "Reservation created"
        );
        if let Some(contact) = &record.contact {
            self.notifier.notify(
                contact,
                &format!(
                    "Reservation {} confirmed for {} at {}, party of {}",
                    record.code,
                    record.date,
                    record.time.format("%H:%M"),
                    record.party_size
                ),
                NotificationKind::Confirmation,
            );
        }
        Ok(record)
    }

    // ========== Transitions ==========

    /// 通用状态迁移
    ///
    /// 进入 SEATED / NOTIFIED 需要桌台，走分配路径；其余为条件写。
    /// 并发下当前状态已变化时返回 [`AppError::Transition`]。
    pub async fn transition(&self, record: &Reservation, next: ReservationStatus) -> AppResult<Reservation> {
        if !record.status.can_transition_to(next, record.kind) {
            return Err(AppError::Transition {
                from: record.status,
                to: next,
            });
        }
        let expected = predecessors(next, record.kind);
        let now = self.clock.now();

        let outcome = match next {
            ReservationStatus::Seated | ReservationStatus::Notified => {
                self.allocator.allocate(record, &expected, next, now).await?
            }
            _ => {
                let handle = self.pool.borrow().await?;
                handle.transition(record.id, &expected, next, now)?
            }
        };

        match outcome {
            Guarded::Applied(updated) => {
                tracing::info!(
                    code = %updated.code,
                    from = %record.status,
                    to = %updated.status,
                    table_id = ?updated.table_id,
                    "Reservation transitioned"
                );
                Ok(updated)
            }
            Guarded::Skipped(current) => Err(AppError::Transition { from: current, to: next }),
            Guarded::NoTable => Err(AppError::conflict(format!(
                "No free table for a party of {}",
                record.party_size
            ))),
        }
    }

    /// 取消 (本人或员工)
    pub async fn cancel(&self, code: &str, actor: &Identity) -> AppResult<Reservation> {
        let record = self.find_by_code(code).await?;
        if !actor.may_act_for(&record.owner_id) {
            return Err(AppError::forbidden(format!("{} may not cancel {}", actor.id, code)));
        }
        let cancelled = self.transition(&record, ReservationStatus::Cancelled).await?;
        if let Some(contact) = &cancelled.contact {
            self.notifier.notify(
                contact,
                &format!("{} {} has been cancelled", cancelled.kind, cancelled.code),
                NotificationKind::Cancellation,
            );
        }
        Ok(cancelled)
    }

    /// 到店入座：PENDING / NOTIFIED → SEATED
    pub async fn check_in(&self, code: &str) -> AppResult<Reservation> {
        let record = self.find_by_code(code).await?;
        self.transition(&record, ReservationStatus::Seated).await
    }

    /// 用餐结束：SEATED → COMPLETED，释放桌台
    pub async fn complete(&self, code: &str) -> AppResult<Reservation> {
        let record = self.find_by_code(code).await?;
        self.transition(&record, ReservationStatus::Completed).await
    }
}
