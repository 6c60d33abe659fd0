//! 内存实现的存储（用于测试和本地开发）
//!
//! 与 PostgreSQL 实现遵守同样的约束：配对按规范化用户对唯一，
//! 已看记录按 (viewer, seen_user) 唯一，滑动记录只追加。

use std::collections::HashMap;

use async_trait::async_trait;
use domain::{
    CanonicalPair, CrossedPath, CrossedPathId, Match, MatchId, Message, RepositoryError, Seen,
    Swipe, Timestamp, User, UserId,
};
use tokio::sync::RwLock;

use crate::repository::{
    CrossedPathRepository, MatchRepository, MessageRepository, NearbyQuery, SeenRepository,
    SwipeRepository, UserRepository,
};

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    swipes: RwLock<Vec<Swipe>>,
    matches: RwLock<Vec<Match>>,
    seen: RwLock<HashMap<(UserId, UserId), Seen>>,
    crossed_paths: RwLock<Vec<CrossedPath>>,
    messages: RwLock<Vec<Message>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入一个用户档案（档案由资料子系统维护，这里只供测试和开发种子数据使用）
    pub async fn insert_user(&self, user: User) {
        self.users.write().await.insert(user.id, user);
    }

    pub async fn swipe_count(&self) -> usize {
        self.swipes.read().await.len()
    }

    pub async fn swipes(&self) -> Vec<Swipe> {
        self.swipes.read().await.clone()
    }

    pub async fn matches(&self) -> Vec<Match> {
        self.matches.read().await.clone()
    }

    pub async fn crossed_paths(&self) -> Vec<CrossedPath> {
        self.crossed_paths.read().await.clone()
    }

    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }

    fn matching_users<'a>(
        users: impl Iterator<Item = &'a User>,
        query: &NearbyQuery,
    ) -> Vec<(f64, &'a User)> {
        let mut found: Vec<(f64, &User)> = users
            .filter(|user| !query.exclude.contains(&user.id))
            .filter(|user| query.gender.as_ref().is_none_or(|g| &user.gender == g))
            .filter(|user| user.shares_interest(&query.interests))
            .filter(|user| query.active_since.is_none_or(|since| user.updated_at >= since))
            .filter_map(|user| {
                let location = user.location?;
                let distance = query.center.distance_meters(&location);
                (distance <= query.max_distance_meters).then_some((distance, user))
            })
            .collect();

        found.sort_by(|a, b| a.0.total_cmp(&b.0));
        found
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: Vec<UserId>) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
    }

    async fn update_location(
        &self,
        id: UserId,
        location: domain::GeoPoint,
        at: Timestamp,
    ) -> Result<bool, RepositoryError> {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                user.move_to(location, at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_nearby(&self, query: &NearbyQuery) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(Self::matching_users(users.values(), query)
            .into_iter()
            .skip(query.skip as usize)
            .take(limit)
            .map(|(_, user)| user.clone())
            .collect())
    }

    async fn count_nearby(&self, query: &NearbyQuery) -> Result<u64, RepositoryError> {
        let users = self.users.read().await;
        Ok(Self::matching_users(users.values(), query).len() as u64)
    }
}

#[async_trait]
impl SwipeRepository for MemoryStore {
    async fn insert(&self, swipe: Swipe) -> Result<(), RepositoryError> {
        self.swipes.write().await.push(swipe);
        Ok(())
    }

    async fn find_positive(
        &self,
        from: UserId,
        to: UserId,
    ) -> Result<Option<Swipe>, RepositoryError> {
        Ok(self
            .swipes
            .read()
            .await
            .iter()
            .find(|s| s.from_user == from && s.to_user == to && s.action.is_positive())
            .cloned())
    }

    async fn list_from(&self, from: UserId) -> Result<Vec<Swipe>, RepositoryError> {
        Ok(self
            .swipes
            .read()
            .await
            .iter()
            .filter(|s| s.from_user == from)
            .cloned()
            .collect())
    }

    async fn list_positive_to(&self, to: UserId) -> Result<Vec<Swipe>, RepositoryError> {
        Ok(self
            .swipes
            .read()
            .await
            .iter()
            .filter(|s| s.to_user == to && s.action.is_positive())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MatchRepository for MemoryStore {
    async fn create(&self, record: Match) -> Result<Match, RepositoryError> {
        let mut matches = self.matches.write().await;
        let pair = record.pair();
        if matches.iter().any(|m| m.pair() == pair) {
            return Err(RepositoryError::Conflict);
        }
        matches.push(record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>, RepositoryError> {
        Ok(self.matches.read().await.iter().find(|m| m.id == id).cloned())
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Match>, RepositoryError> {
        let mut found: Vec<Match> = self
            .matches
            .read()
            .await
            .iter()
            .filter(|m| m.involves(user))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[async_trait]
impl SeenRepository for MemoryStore {
    async fn mark_seen(&self, seen: Seen) -> Result<(), RepositoryError> {
        self.seen
            .write()
            .await
            .entry((seen.viewer, seen.seen_user))
            .or_insert(seen);
        Ok(())
    }

    async fn list_seen(&self, viewer: UserId) -> Result<Vec<UserId>, RepositoryError> {
        Ok(self
            .seen
            .read()
            .await
            .keys()
            .filter(|(v, _)| *v == viewer)
            .map(|(_, seen_user)| *seen_user)
            .collect())
    }
}

#[async_trait]
impl CrossedPathRepository for MemoryStore {
    async fn find_latest_since(
        &self,
        user1: UserId,
        user2: UserId,
        since: Timestamp,
    ) -> Result<Option<CrossedPath>, RepositoryError> {
        let pair = CanonicalPair::new(user1, user2);
        Ok(self
            .crossed_paths
            .read()
            .await
            .iter()
            .filter(|c| c.pair() == pair && c.timestamp >= since)
            .max_by_key(|c| c.timestamp)
            .cloned())
    }

    async fn insert(&self, record: CrossedPath) -> Result<(), RepositoryError> {
        self.crossed_paths.write().await.push(record);
        Ok(())
    }

    async fn increment_times_crossed(&self, id: CrossedPathId) -> Result<(), RepositoryError> {
        let mut records = self.crossed_paths.write().await;
        let record = records
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        record.times_crossed += 1;
        Ok(())
    }

    async fn list_for_user(
        &self,
        user: UserId,
        since: Timestamp,
        limit: u32,
    ) -> Result<Vec<CrossedPath>, RepositoryError> {
        let mut found: Vec<CrossedPath> = self
            .crossed_paths
            .read()
            .await
            .iter()
            .filter(|c| c.pair().contains(user) && c.timestamp >= since)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        found.truncate(limit as usize);
        Ok(found)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn insert(&self, message: Message) -> Result<Message, RepositoryError> {
        self.messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn list_for_match(&self, match_id: MatchId) -> Result<Vec<Message>, RepositoryError> {
        let mut found: Vec<Message> = self
            .messages
            .read()
            .await
            .iter()
            .filter(|m| m.match_id == match_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }
}
