use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::{CanonicalPair, MatchId, Timestamp, UserId};

/// 双向感兴趣形成的配对，`user1 < user2`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub user1: UserId,
    pub user2: UserId,
    pub created_at: Timestamp,
}

impl Match {
    pub fn between(a: UserId, b: UserId, now: Timestamp) -> Self {
        let pair = CanonicalPair::new(a, b);
        Self {
            id: MatchId::from(Uuid::new_v4()),
            user1: pair.first(),
            user2: pair.second(),
            created_at: now,
        }
    }

    pub fn pair(&self) -> CanonicalPair {
        CanonicalPair::new(self.user1, self.user2)
    }

    pub fn involves(&self, user: UserId) -> bool {
        self.pair().contains(user)
    }

    pub fn counterpart_of(&self, user: UserId) -> Option<UserId> {
        self.pair().counterpart(user)
    }
}
