//! 座位引擎
//!
//! - [`allocator`] - 装桌判定与真实分配
//! - [`slots`] - 可预订时段
//! - [`codes`] - 确认码
//! - [`registry`] - 预订登记与状态机
//! - [`waitlist`] - 现场候位
//! - [`monitor`] - 爽约 / 提醒巡检

pub mod allocator;
pub mod codes;
pub mod monitor;
pub mod registry;
pub mod slots;
pub mod waitlist;

pub use allocator::{TableAllocator, best_fit, can_pack};
pub use codes::{CodeGenerator, RandomCodes};
pub use monitor::{NoShowMonitor, ReminderMonitor};
pub use registry::{BookingRequest, ReservationRegistry};
pub use slots::SlotRules;
pub use waitlist::{WaitlistEstimator, WaitlistRules, WalkInOutcome};
