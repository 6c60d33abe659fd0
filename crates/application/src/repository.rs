//! 存储协作方接口
//!
//! 核心只依赖这里的查询形状：插入、带过滤/排序/分页的查找、计数、
//! 按 ID 或条件更新（含 upsert），以及"某点附近"的地理过滤。
//! 唯一约束由实现方声明（SQL 迁移或内存实现）。

use async_trait::async_trait;
use domain::{
    CrossedPath, CrossedPathId, GeoPoint, Match, MatchId, Message, RepositoryError, Seen, Swipe,
    Timestamp, User, UserId,
};

/// 附近用户查询条件，结果按距离由近到远排序
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub center: GeoPoint,
    pub max_distance_meters: f64,
    /// 需要排除的用户（包含查询者本人）
    pub exclude: Vec<UserId>,
    pub gender: Option<String>,
    /// 非空时要求与候选人兴趣至少有一个交集
    pub interests: Vec<String>,
    /// 仅返回最后上报时间不早于该时刻的用户
    pub active_since: Option<Timestamp>,
    pub limit: Option<u32>,
    pub skip: u32,
}

impl NearbyQuery {
    pub fn around(center: GeoPoint, max_distance_meters: f64) -> Self {
        Self {
            center,
            max_distance_meters,
            exclude: Vec::new(),
            gender: None,
            interests: Vec::new(),
            active_since: None,
            limit: None,
            skip: 0,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_ids(&self, ids: Vec<UserId>) -> Result<Vec<User>, RepositoryError>;
    /// 写入位置与最后上报时间；用户不存在时返回 `false`
    async fn update_location(
        &self,
        id: UserId,
        location: GeoPoint,
        at: Timestamp,
    ) -> Result<bool, RepositoryError>;
    async fn find_nearby(&self, query: &NearbyQuery) -> Result<Vec<User>, RepositoryError>;
    /// 与 `find_nearby` 相同条件，忽略 limit/skip
    async fn count_nearby(&self, query: &NearbyQuery) -> Result<u64, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwipeRepository: Send + Sync {
    /// 追加一条滑动记录，不做唯一性检查
    async fn insert(&self, swipe: Swipe) -> Result<(), RepositoryError>;
    /// 查找 `from -> to` 方向任意一条 like/superlike
    async fn find_positive(
        &self,
        from: UserId,
        to: UserId,
    ) -> Result<Option<Swipe>, RepositoryError>;
    async fn list_from(&self, from: UserId) -> Result<Vec<Swipe>, RepositoryError>;
    async fn list_positive_to(&self, to: UserId) -> Result<Vec<Swipe>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// 规范化配对已存在时返回 `RepositoryError::Conflict`
    async fn create(&self, record: Match) -> Result<Match, RepositoryError>;
    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>, RepositoryError>;
    async fn list_for_user(&self, user: UserId) -> Result<Vec<Match>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SeenRepository: Send + Sync {
    /// 按 (viewer, seen_user) upsert，已存在时保留原时间戳
    async fn mark_seen(&self, seen: Seen) -> Result<(), RepositoryError>;
    async fn list_seen(&self, viewer: UserId) -> Result<Vec<UserId>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CrossedPathRepository: Send + Sync {
    /// 查找该规范化用户对在 `since` 之后的最新记录
    async fn find_latest_since(
        &self,
        user1: UserId,
        user2: UserId,
        since: Timestamp,
    ) -> Result<Option<CrossedPath>, RepositoryError>;
    async fn insert(&self, record: CrossedPath) -> Result<(), RepositoryError>;
    async fn increment_times_crossed(&self, id: CrossedPathId) -> Result<(), RepositoryError>;
    /// 涉及 `user` 且时间不早于 `since` 的记录，按时间倒序
    async fn list_for_user(
        &self,
        user: UserId,
        since: Timestamp,
        limit: u32,
    ) -> Result<Vec<CrossedPath>, RepositoryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    async fn insert(&self, message: Message) -> Result<Message, RepositoryError>;
    /// 按创建时间升序
    async fn list_for_match(&self, match_id: MatchId) -> Result<Vec<Message>, RepositoryError>;
}
