use chrono::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::value_objects::{CanonicalPair, CrossedPathId, Timestamp, UserId};

/// 同一对用户在该时长内的重复接近不再新建记录
pub const CROSSED_PATH_DEDUP_WINDOW_MINUTES: i64 = 60;

/// 两个在线用户在固定半径内相遇的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossedPath {
    pub id: CrossedPathId,
    pub user1: UserId,
    pub user2: UserId,
    pub timestamp: Timestamp,
    pub location: GeoPoint,
    pub times_crossed: u32,
}

impl CrossedPath {
    pub fn record(pair: CanonicalPair, location: GeoPoint, now: Timestamp) -> Self {
        Self {
            id: CrossedPathId::from(Uuid::new_v4()),
            user1: pair.first(),
            user2: pair.second(),
            timestamp: now,
            location,
            times_crossed: 1,
        }
    }

    pub fn pair(&self) -> CanonicalPair {
        CanonicalPair::new(self.user1, self.user2)
    }

    pub fn other_party(&self, user: UserId) -> Option<UserId> {
        self.pair().counterpart(user)
    }

    /// 去重窗口的起点：早于该时刻的记录不再抑制新事件
    pub fn window_start(now: Timestamp) -> Timestamp {
        now - Duration::minutes(CROSSED_PATH_DEDUP_WINDOW_MINUTES)
    }
}
