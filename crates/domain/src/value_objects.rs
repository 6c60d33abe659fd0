use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 统一的时间戳类型。
pub type Timestamp = DateTime<Utc>;

/// 用户唯一标识。
///
/// `Ord` 按 UUID 字节序比较，与规范小写字符串形式的字典序一致，
/// 规范化配对依赖这一全序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for UserId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<UserId> for Uuid {
    fn from(value: UserId) -> Self {
        value.0
    }
}

/// 配对唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub Uuid);

impl MatchId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MatchId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<MatchId> for Uuid {
    fn from(value: MatchId) -> Self {
        value.0
    }
}

/// 擦肩而过记录标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CrossedPathId(pub Uuid);

impl fmt::Display for CrossedPathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CrossedPathId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<CrossedPathId> for Uuid {
    fn from(value: CrossedPathId) -> Self {
        value.0
    }
}

/// 消息唯一标识。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for MessageId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<MessageId> for Uuid {
    fn from(value: MessageId) -> Self {
        value.0
    }
}

/// 规范化的无序用户对：`first < second`（相同 ID 时两者相等）。
///
/// 配对与擦肩而过记录都以此形式存储，配合 (first, second) 唯一约束，
/// 无论哪一方先触发都不会出现反向重复记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanonicalPair {
    first: UserId,
    second: UserId,
}

impl CanonicalPair {
    pub fn new(a: UserId, b: UserId) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn first(&self) -> UserId {
        self.first
    }

    pub fn second(&self) -> UserId {
        self.second
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.first == user || self.second == user
    }

    /// 返回另一方；`user` 不属于该对时返回 `None`
    pub fn counterpart(&self, user: UserId) -> Option<UserId> {
        if self.first == user {
            Some(self.second)
        } else if self.second == user {
            Some(self.first)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(n: u128) -> UserId {
        UserId::from(Uuid::from_u128(n))
    }

    #[test]
    fn canonical_pair_orders_regardless_of_argument_order() {
        let a = user(1);
        let b = user(2);

        assert_eq!(CanonicalPair::new(a, b), CanonicalPair::new(b, a));
        assert_eq!(CanonicalPair::new(b, a).first(), a);
        assert_eq!(CanonicalPair::new(b, a).second(), b);
    }

    #[test]
    fn uuid_order_matches_string_order() {
        let low = Uuid::parse_str("0a000000-0000-0000-0000-000000000000").unwrap();
        let high = Uuid::parse_str("b1000000-0000-0000-0000-000000000000").unwrap();

        assert!(UserId::from(low) < UserId::from(high));
        assert!(low.to_string() < high.to_string());
    }

    #[test]
    fn counterpart_of_outsider_is_none() {
        let pair = CanonicalPair::new(user(1), user(2));
        assert_eq!(pair.counterpart(user(1)), Some(user(2)));
        assert_eq!(pair.counterpart(user(2)), Some(user(1)));
        assert_eq!(pair.counterpart(user(3)), None);
    }
}
