//! 邻近匹配系统核心领域模型
//!
//! 包含用户、滑动、配对、擦肩而过、消息等实体，以及地理计算和规范化配对规则。

pub mod crossed_path;
pub mod errors;
pub mod geo;
pub mod matching;
pub mod message;
pub mod seen;
pub mod swipe;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use crossed_path::{CrossedPath, CROSSED_PATH_DEDUP_WINDOW_MINUTES};
pub use errors::{DomainError, RepositoryError};
pub use geo::{
    GeoPoint, CROSSING_RADIUS_METERS, DEFAULT_MAX_DISTANCE_KM, LIVE_WINDOW_MINUTES,
};
pub use matching::Match;
pub use message::{Message, MessageContent};
pub use seen::Seen;
pub use swipe::{Swipe, SwipeAction, SWIPE_VALIDITY_HOURS};
pub use user::User;
pub use value_objects::{
    CanonicalPair, CrossedPathId, MatchId, MessageId, Timestamp, UserId,
};
