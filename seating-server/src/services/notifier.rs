//! 通知 (fire-and-forget)
//!
//! 核心只提交 (联系方式, 内容, 分类)，不等待投递结果。

use serde::Serialize;

/// 通知分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Confirmation,
    Reminder,
    TableReady,
    Cancellation,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, contact: &str, message: &str, kind: NotificationKind);
}

/// 只写日志的通知器
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, contact: &str, message: &str, kind: NotificationKind) {
        tracing::info!(target: "notify", contact = %contact, kind = ?kind, "{}", message);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// 记录所有通知，测试断言用
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<(String, String, NotificationKind)>>,
    }

    impl RecordingNotifier {
        pub fn sent(&self) -> Vec<(String, String, NotificationKind)> {
            self.sent.lock().clone()
        }

        pub fn count(&self, kind: NotificationKind) -> usize {
            self.sent.lock().iter().filter(|(_, _, k)| *k == kind).count()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, contact: &str, message: &str, kind: NotificationKind) {
            self.sent
                .lock()
                .push((contact.to_string(), message.to_string(), kind));
        }
    }
}
