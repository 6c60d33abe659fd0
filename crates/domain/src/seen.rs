use serde::{Deserialize, Serialize};

use crate::value_objects::{Timestamp, UserId};

/// 发现队列已展示给 `viewer` 的用户，按 (viewer, seen_user) 幂等
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seen {
    pub viewer: UserId,
    pub seen_user: UserId,
    pub timestamp: Timestamp,
}

impl Seen {
    pub fn new(viewer: UserId, seen_user: UserId, timestamp: Timestamp) -> Self {
        Self {
            viewer,
            seen_user,
            timestamp,
        }
    }
}
