use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{Timestamp, UserId};

/// 滑动记录的有效期
pub const SWIPE_VALIDITY_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeAction {
    Like,
    Dislike,
    #[serde(rename = "superlike")]
    SuperLike,
}

impl SwipeAction {
    /// like 与 superlike 表示感兴趣
    pub fn is_positive(self) -> bool {
        matches!(self, SwipeAction::Like | SwipeAction::SuperLike)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwipeAction::Like => "like",
            SwipeAction::Dislike => "dislike",
            SwipeAction::SuperLike => "superlike",
        }
    }
}

impl fmt::Display for SwipeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwipeAction {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "like" => Ok(SwipeAction::Like),
            "dislike" => Ok(SwipeAction::Dislike),
            "superlike" => Ok(SwipeAction::SuperLike),
            other => Err(DomainError::invalid_argument(
                "action",
                format!("unsupported swipe action '{other}'"),
            )),
        }
    }
}

/// 单向兴趣信号，只追加不去重
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Swipe {
    pub from_user: UserId,
    pub to_user: UserId,
    pub action: SwipeAction,
    pub source: String,
    pub created_at: Timestamp,
    pub valid_until: Timestamp,
}

impl Swipe {
    pub fn record(
        from_user: UserId,
        to_user: UserId,
        action: SwipeAction,
        source: impl Into<String>,
        now: Timestamp,
    ) -> Result<Self, DomainError> {
        if from_user == to_user {
            return Err(DomainError::SelfSwipe);
        }

        Ok(Self {
            from_user,
            to_user,
            action,
            source: source.into(),
            created_at: now,
            valid_until: now + Duration::hours(SWIPE_VALIDITY_HOURS),
        })
    }
}
