//! 身份服务
//!
//! 凭证存储不在本服务范围内，核心只需要"当前身份"：
//! 下单时记录归属，特权操作 (入座、结束、叫号、桌台列表) 检查角色。

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::AppResult;

/// 角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Staff,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "staff" => Ok(Role::Staff),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Guest => write!(f, "guest"),
            Role::Staff => write!(f, "staff"),
        }
    }
}

/// 连接上的身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub role: Role,
}

impl Identity {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    /// 本人或员工
    pub fn may_act_for(&self, owner_id: &str) -> bool {
        self.is_staff() || self.id == owner_id
    }
}

/// 令牌 -> 身份
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> AppResult<Option<Identity>>;
}

/// 静态令牌表 (`token:identity:role`)
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityProvider {
    tokens: HashMap<String, Identity>,
}

impl StaticIdentityProvider {
    pub fn new(entries: impl IntoIterator<Item = (String, Identity)>) -> Self {
        Self {
            tokens: entries.into_iter().collect(),
        }
    }

    /// 解析 `tok1:alice:guest,tok2:bob:staff`，格式错误的条目跳过
    pub fn parse(value: &str) -> Self {
        let entries = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|entry| {
                let mut parts = entry.splitn(3, ':');
                let (Some(token), Some(id), Some(role)) = (parts.next(), parts.next(), parts.next()) else {
                    tracing::warn!(entry = %entry, "Malformed session token entry, skipping");
                    return None;
                };
                match role.parse::<Role>() {
                    Ok(role) => Some((token.to_string(), Identity::new(id, role))),
                    Err(e) => {
                        tracing::warn!(entry = %entry, error = %e, "Malformed session token entry, skipping");
                        None
                    }
                }
            });
        Self::new(entries)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve(&self, token: &str) -> AppResult<Option<Identity>> {
        Ok(self.tokens.get(token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_and_resolve() {
        let provider = StaticIdentityProvider::parse("t1:alice:guest, t2:bob:STAFF,broken,t3:carol:chef");
        assert_eq!(provider.len(), 2);

        let alice = provider.resolve("t1").await.unwrap().unwrap();
        assert_eq!(alice, Identity::new("alice", Role::Guest));
        assert!(provider.resolve("t2").await.unwrap().unwrap().is_staff());
        assert!(provider.resolve("t3").await.unwrap().is_none());
    }

    #[test]
    fn test_may_act_for() {
        let guest = Identity::new("alice", Role::Guest);
        let staff = Identity::new("bob", Role::Staff);
        assert!(guest.may_act_for("alice"));
        assert!(!guest.may_act_for("carol"));
        assert!(staff.may_act_for("carol"));
    }
}
