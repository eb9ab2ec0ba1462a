//! Dining Table Model

use serde::{Deserialize, Serialize};

/// Dining table entity (桌台)
///
/// 容量来自配置，占用状态是运行时状态。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiningTable {
    pub id: u32,
    pub capacity: u32,
    /// 当前占用此桌的记录 id
    pub occupied_by: Option<u64>,
}

impl DiningTable {
    pub fn is_occupied(&self) -> bool {
        self.occupied_by.is_some()
    }
}
