//! 服务层 - 外部协作方接口
//!
//! - [`HoursProvider`] - 营业时间 (含节假日)
//! - [`IdentityProvider`] - 令牌解析为身份
//! - [`Notifier`] - 通知投递

pub mod hours;
pub mod identity;
pub mod notifier;

pub use hours::{BusinessHours, HoursProvider, OpeningHours};
pub use identity::{Identity, IdentityProvider, Role, StaticIdentityProvider};
pub use notifier::{LogNotifier, NotificationKind, Notifier};
