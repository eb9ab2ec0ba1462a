//! 定时巡检
//!
//! - [`NoShowMonitor`]：超过宽限期未到店的 PENDING 预订、叫号后未到的
//!   NOTIFIED 候位 → NO_SHOW (后者释放保留的桌台)
//! - [`ReminderMonitor`]：即将开始的预订发一次提醒
//!
//! 所有写入都是带预期状态的条件写，与请求处理并发安全；
//! 重复巡检不会重复写入。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use shared::models::{Reservation, ReservationKind, ReservationStatus};

use super::registry::ReservationRegistry;
use crate::core::tasks::{PeriodicTask, SweepReport};
use crate::db::Guarded;
use crate::services::NotificationKind;
use crate::utils::{AppError, AppResult};

/// 爽约巡检
pub struct NoShowMonitor {
    registry: Arc<ReservationRegistry>,
    grace: chrono::Duration,
    period: Duration,
}

impl NoShowMonitor {
    pub fn new(registry: Arc<ReservationRegistry>, grace_min: u32, period: Duration) -> Self {
        Self {
            registry,
            grace: chrono::Duration::minutes(grace_min as i64),
            period,
        }
    }

    /// 已超过宽限期的候选记录
    async fn overdue(&self, now: NaiveDateTime) -> AppResult<Vec<Reservation>> {
        let handle = self.registry.pool().borrow().await?;

        let mut overdue: Vec<Reservation> = handle
            .list_by_status(ReservationStatus::Pending)?
            .into_iter()
            .filter(|r| r.kind == ReservationKind::Reservation && r.start() + self.grace <= now)
            .collect();
        overdue.extend(
            handle
                .list_by_status(ReservationStatus::Notified)?
                .into_iter()
                .filter(|r| {
                    r.kind == ReservationKind::Waitlist
                        && r.notified_at.is_some_and(|notified_at| notified_at + self.grace <= now)
                }),
        );
        Ok(overdue)
    }
}

#[async_trait]
impl PeriodicTask for NoShowMonitor {
    fn name(&self) -> &'static str {
        "no_show_monitor"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run_once(&self) -> AppResult<SweepReport> {
        let now = self.registry.clock().now();
        let overdue = self.overdue(now).await?;
        let mut report = SweepReport {
            examined: overdue.len(),
            ..Default::default()
        };

        for record in overdue {
            match self.registry.transition(&record, ReservationStatus::NoShow).await {
                Ok(updated) => {
                    report.changed += 1;
                    tracing::info!(
                        code = %updated.code,
                        kind = %updated.kind,
                        released_table = ?updated.table_id,
                        "Marked as no-show"
                    );
                }
                // 期间已被入座 / 取消
                Err(AppError::Transition { from, .. }) => {
                    tracing::debug!(code = %record.code, current = %from, "No-show skipped, status changed");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(code = %record.code, error = %e, "Failed to mark no-show");
                }
            }
        }
        Ok(report)
    }
}

/// 预订提醒
pub struct ReminderMonitor {
    registry: Arc<ReservationRegistry>,
    lead: chrono::Duration,
    period: Duration,
}

impl ReminderMonitor {
    pub fn new(registry: Arc<ReservationRegistry>, lead_min: u32, period: Duration) -> Self {
        Self {
            registry,
            lead: chrono::Duration::minutes(lead_min as i64),
            period,
        }
    }
}

#[async_trait]
impl PeriodicTask for ReminderMonitor {
    fn name(&self) -> &'static str {
        "reminder_monitor"
    }

    fn period(&self) -> Duration {
        self.period
    }

    async fn run_once(&self) -> AppResult<SweepReport> {
        let now = self.registry.clock().now();
        let handle = self.registry.pool().borrow().await?;

        let due: Vec<Reservation> = handle
            .list_by_status(ReservationStatus::Pending)?
            .into_iter()
            .filter(|r| {
                r.kind == ReservationKind::Reservation
                    && r.reminded_at.is_none()
                    && r.contact.is_some()
                    && r.start() > now
                    && r.start() <= now + self.lead
            })
            .collect();
        let mut report = SweepReport {
            examined: due.len(),
            ..Default::default()
        };

        for record in due {
            // 先落标记再发送，保证至多一次
            match handle.mark_reminded(record.id, now) {
                Ok(Guarded::Applied(stamped)) => {
                    if let Some(contact) = &stamped.contact {
                        self.registry.notifier().notify(
                            contact,
                            &format!(
                                "Reminder: reservation {} today at {}, party of {}",
                                stamped.code,
                                stamped.time.format("%H:%M"),
                                stamped.party_size
                            ),
                            NotificationKind::Reminder,
                        );
                    }
                    report.changed += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(code = %record.code, error = %e, "Failed to stamp reminder");
                }
            }
        }
        Ok(report)
    }
}
