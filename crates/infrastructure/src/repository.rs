use std::sync::Arc;

use application::repository::{
    CrossedPathRepository, MatchRepository, MessageRepository, NearbyQuery, SeenRepository,
    SwipeRepository, UserRepository,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use domain::{
    CanonicalPair, CrossedPath, CrossedPathId, GeoPoint, Match, MatchId, Message,
    MessageContent, MessageId, RepositoryError, Seen, Swipe, SwipeAction, Timestamp, User,
    UserId,
};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use uuid::Uuid;

/// 唯一约束冲突（SQLSTATE 23505）映射为 `Conflict`，其余一律视为存储故障
fn map_sqlx_err(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return RepositoryError::Conflict;
        }
    }
    RepositoryError::storage_with_source("database operation failed", err)
}

fn invalid_data(message: impl Into<String>) -> RepositoryError {
    RepositoryError::storage(message)
}

fn location_from_columns(
    longitude: Option<f64>,
    latitude: Option<f64>,
) -> Result<Option<GeoPoint>, RepositoryError> {
    match (longitude, latitude) {
        (Some(lng), Some(lat)) => GeoPoint::new(lng, lat)
            .map(Some)
            .map_err(|err| invalid_data(err.to_string())),
        _ => Ok(None),
    }
}

const USER_COLUMNS: &str = "id, name, email, password_hash, bio, gender, interests, birth, \
     longitude, latitude, email_verified, verify_token, created_at, updated_at";

/// 球面距离（米），`$1` 纬度、`$2` 经度
const HAVERSINE_METERS: &str = "2 * 6371008.8 * asin(least(1.0, sqrt(\
     power(sin(radians(latitude - $1) / 2), 2) + \
     cos(radians($1)) * cos(radians(latitude)) * power(sin(radians(longitude - $2) / 2), 2)\
     )))";

/// 附近候选人子查询，参数 `$1..$7` 与 `bind_nearby` 的绑定顺序一致
fn nearby_candidates_sql() -> String {
    format!(
        "SELECT {USER_COLUMNS}, {HAVERSINE_METERS} AS distance_m \
         FROM users \
         WHERE longitude IS NOT NULL AND latitude IS NOT NULL \
           AND NOT (id = ANY($3)) \
           AND ($4::text IS NULL OR gender = $4) \
           AND (cardinality($5::text[]) = 0 OR interests && $5::text[]) \
           AND ($6::timestamptz IS NULL OR updated_at >= $6)"
    )
}

#[derive(Debug, FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    password_hash: Option<String>,
    bio: Option<String>,
    gender: String,
    interests: Vec<String>,
    birth: Option<NaiveDate>,
    longitude: Option<f64>,
    latitude: Option<f64>,
    email_verified: bool,
    verify_token: Option<String>,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<UserRecord> for User {
    type Error = RepositoryError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from(value.id),
            name: value.name,
            email: value.email,
            password_hash: value.password_hash,
            bio: value.bio,
            gender: value.gender,
            interests: value.interests,
            birth: value.birth,
            location: location_from_columns(value.longitude, value.latitude)?,
            email_verified: value.email_verified,
            verify_token: value.verify_token,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SwipeRecord {
    from_user_id: Uuid,
    to_user_id: Uuid,
    action: String,
    source: String,
    created_at: Timestamp,
    valid_until: Timestamp,
}

impl TryFrom<SwipeRecord> for Swipe {
    type Error = RepositoryError;

    fn try_from(value: SwipeRecord) -> Result<Self, Self::Error> {
        let action: SwipeAction = value
            .action
            .parse()
            .map_err(|err: domain::DomainError| invalid_data(err.to_string()))?;
        Ok(Swipe {
            from_user: UserId::from(value.from_user_id),
            to_user: UserId::from(value.to_user_id),
            action,
            source: value.source,
            created_at: value.created_at,
            valid_until: value.valid_until,
        })
    }
}

#[derive(Debug, FromRow)]
struct MatchRecord {
    id: Uuid,
    user1_id: Uuid,
    user2_id: Uuid,
    created_at: Timestamp,
}

impl From<MatchRecord> for Match {
    fn from(value: MatchRecord) -> Self {
        Match {
            id: MatchId::from(value.id),
            user1: UserId::from(value.user1_id),
            user2: UserId::from(value.user2_id),
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct CrossedPathRecord {
    id: Uuid,
    user1_id: Uuid,
    user2_id: Uuid,
    crossed_at: Timestamp,
    longitude: f64,
    latitude: f64,
    times_crossed: i32,
}

impl TryFrom<CrossedPathRecord> for CrossedPath {
    type Error = RepositoryError;

    fn try_from(value: CrossedPathRecord) -> Result<Self, Self::Error> {
        let location = GeoPoint::new(value.longitude, value.latitude)
            .map_err(|err| invalid_data(err.to_string()))?;
        let times_crossed = u32::try_from(value.times_crossed)
            .map_err(|_| invalid_data(format!("negative times_crossed: {}", value.times_crossed)))?;
        Ok(CrossedPath {
            id: CrossedPathId::from(value.id),
            user1: UserId::from(value.user1_id),
            user2: UserId::from(value.user2_id),
            timestamp: value.crossed_at,
            location,
            times_crossed,
        })
    }
}

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    match_id: Uuid,
    from_user_id: Uuid,
    content: String,
    created_at: Timestamp,
}

impl TryFrom<MessageRecord> for Message {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Message::new(
            MessageId::from(value.id),
            MatchId::from(value.match_id),
            UserId::from(value.from_user_id),
            content,
            value.created_at,
        ))
    }
}

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn bind_nearby<'q, O>(
        query: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
        nearby: &'q NearbyQuery,
    ) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
        let exclude: Vec<Uuid> = nearby.exclude.iter().copied().map(Uuid::from).collect();
        query
            .bind(nearby.center.latitude)
            .bind(nearby.center.longitude)
            .bind(exclude)
            .bind(nearby.gender.as_deref())
            .bind(nearby.interests.clone())
            .bind(nearby.active_since)
            .bind(nearby.max_distance_meters)
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(User::try_from).transpose()
    }

    async fn find_by_ids(&self, ids: Vec<UserId>) -> Result<Vec<User>, RepositoryError> {
        let ids: Vec<Uuid> = ids.into_iter().map(Uuid::from).collect();
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }

    async fn update_location(
        &self,
        id: UserId,
        location: GeoPoint,
        at: Timestamp,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET longitude = $2, latitude = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .bind(location.longitude)
        .bind(location.latitude)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_nearby(&self, query: &NearbyQuery) -> Result<Vec<User>, RepositoryError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM ({}) AS candidates \
             WHERE distance_m <= $7 \
             ORDER BY distance_m ASC, id ASC \
             LIMIT $8 OFFSET $9",
            nearby_candidates_sql()
        );
        let records = Self::bind_nearby(sqlx::query_as::<_, UserRecord>(&sql), query)
            .bind(query.limit.map(i64::from))
            .bind(i64::from(query.skip))
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        records.into_iter().map(User::try_from).collect()
    }

    async fn count_nearby(&self, query: &NearbyQuery) -> Result<u64, RepositoryError> {
        let sql = format!(
            "SELECT COUNT(*) FROM ({}) AS candidates WHERE distance_m <= $7",
            nearby_candidates_sql()
        );
        let (count,): (i64,) = Self::bind_nearby(sqlx::query_as(&sql), query)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_err)?;

        Ok(count.max(0) as u64)
    }
}

#[derive(Clone)]
pub struct PgSwipeRepository {
    pool: PgPool,
}

impl PgSwipeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SwipeRepository for PgSwipeRepository {
    async fn insert(&self, swipe: Swipe) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO swipes (from_user_id, to_user_id, action, source, created_at, valid_until)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::from(swipe.from_user))
        .bind(Uuid::from(swipe.to_user))
        .bind(swipe.action.as_str())
        .bind(&swipe.source)
        .bind(swipe.created_at)
        .bind(swipe.valid_until)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }

    async fn find_positive(
        &self,
        from: UserId,
        to: UserId,
    ) -> Result<Option<Swipe>, RepositoryError> {
        let record = sqlx::query_as::<_, SwipeRecord>(
            r#"
            SELECT from_user_id, to_user_id, action, source, created_at, valid_until
            FROM swipes
            WHERE from_user_id = $1 AND to_user_id = $2 AND action IN ('like', 'superlike')
            LIMIT 1
            "#,
        )
        .bind(Uuid::from(from))
        .bind(Uuid::from(to))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Swipe::try_from).transpose()
    }

    async fn list_from(&self, from: UserId) -> Result<Vec<Swipe>, RepositoryError> {
        let records = sqlx::query_as::<_, SwipeRecord>(
            r#"
            SELECT from_user_id, to_user_id, action, source, created_at, valid_until
            FROM swipes
            WHERE from_user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(Uuid::from(from))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Swipe::try_from).collect()
    }

    async fn list_positive_to(&self, to: UserId) -> Result<Vec<Swipe>, RepositoryError> {
        let records = sqlx::query_as::<_, SwipeRecord>(
            r#"
            SELECT from_user_id, to_user_id, action, source, created_at, valid_until
            FROM swipes
            WHERE to_user_id = $1 AND action IN ('like', 'superlike')
            ORDER BY created_at ASC
            "#,
        )
        .bind(Uuid::from(to))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Swipe::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgMatchRepository {
    pool: PgPool,
}

impl PgMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchRepository for PgMatchRepository {
    async fn create(&self, record: Match) -> Result<Match, RepositoryError> {
        let pair = record.pair();
        let stored = sqlx::query_as::<_, MatchRecord>(
            r#"
            INSERT INTO matches (id, user1_id, user2_id, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user1_id, user2_id, created_at
            "#,
        )
        .bind(Uuid::from(record.id))
        .bind(Uuid::from(pair.first()))
        .bind(Uuid::from(pair.second()))
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(Match::from(stored))
    }

    async fn find_by_id(&self, id: MatchId) -> Result<Option<Match>, RepositoryError> {
        let record = sqlx::query_as::<_, MatchRecord>(
            "SELECT id, user1_id, user2_id, created_at FROM matches WHERE id = $1",
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(Match::from))
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Match>, RepositoryError> {
        let records = sqlx::query_as::<_, MatchRecord>(
            r#"
            SELECT id, user1_id, user2_id, created_at
            FROM matches
            WHERE user1_id = $1 OR user2_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(Uuid::from(user))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(records.into_iter().map(Match::from).collect())
    }
}

#[derive(Clone)]
pub struct PgSeenRepository {
    pool: PgPool,
}

impl PgSeenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SeenRepository for PgSeenRepository {
    async fn mark_seen(&self, seen: Seen) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO seen (viewer_id, seen_user_id, seen_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (viewer_id, seen_user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::from(seen.viewer))
        .bind(Uuid::from(seen.seen_user))
        .bind(seen.timestamp)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }

    async fn list_seen(&self, viewer: UserId) -> Result<Vec<UserId>, RepositoryError> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("SELECT seen_user_id FROM seen WHERE viewer_id = $1")
                .bind(Uuid::from(viewer))
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        Ok(rows.into_iter().map(|(id,)| UserId::from(id)).collect())
    }
}

#[derive(Clone)]
pub struct PgCrossedPathRepository {
    pool: PgPool,
}

impl PgCrossedPathRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CrossedPathRepository for PgCrossedPathRepository {
    async fn find_latest_since(
        &self,
        user1: UserId,
        user2: UserId,
        since: Timestamp,
    ) -> Result<Option<CrossedPath>, RepositoryError> {
        let pair = CanonicalPair::new(user1, user2);
        let record = sqlx::query_as::<_, CrossedPathRecord>(
            r#"
            SELECT id, user1_id, user2_id, crossed_at, longitude, latitude, times_crossed
            FROM crossed_paths
            WHERE user1_id = $1 AND user2_id = $2 AND crossed_at >= $3
            ORDER BY crossed_at DESC
            LIMIT 1
            "#,
        )
        .bind(Uuid::from(pair.first()))
        .bind(Uuid::from(pair.second()))
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(CrossedPath::try_from).transpose()
    }

    async fn insert(&self, record: CrossedPath) -> Result<(), RepositoryError> {
        let pair = record.pair();
        sqlx::query(
            r#"
            INSERT INTO crossed_paths
                (id, user1_id, user2_id, crossed_at, longitude, latitude, times_crossed)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::from(record.id))
        .bind(Uuid::from(pair.first()))
        .bind(Uuid::from(pair.second()))
        .bind(record.timestamp)
        .bind(record.location.longitude)
        .bind(record.location.latitude)
        .bind(i32::try_from(record.times_crossed).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(())
    }

    async fn increment_times_crossed(&self, id: CrossedPathId) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE crossed_paths SET times_crossed = times_crossed + 1 WHERE id = $1")
                .bind(Uuid::from(id))
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_err)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_for_user(
        &self,
        user: UserId,
        since: Timestamp,
        limit: u32,
    ) -> Result<Vec<CrossedPath>, RepositoryError> {
        let records = sqlx::query_as::<_, CrossedPathRecord>(
            r#"
            SELECT id, user1_id, user2_id, crossed_at, longitude, latitude, times_crossed
            FROM crossed_paths
            WHERE (user1_id = $1 OR user2_id = $1) AND crossed_at >= $2
            ORDER BY crossed_at DESC
            LIMIT $3
            "#,
        )
        .bind(Uuid::from(user))
        .bind(since)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(CrossedPath::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn insert(&self, message: Message) -> Result<Message, RepositoryError> {
        let record = sqlx::query_as::<_, MessageRecord>(
            r#"
            INSERT INTO messages (id, match_id, from_user_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, match_id, from_user_id, content, created_at
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.match_id))
        .bind(Uuid::from(message.from_user))
        .bind(message.content.as_str())
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Message::try_from(record)
    }

    async fn list_for_match(&self, match_id: MatchId) -> Result<Vec<Message>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, match_id, from_user_id, content, created_at
            FROM messages
            WHERE match_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(Uuid::from(match_id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(Message::try_from).collect()
    }
}

#[derive(Clone)]
pub struct PgStorage {
    pub pool: PgPool,
    pub user_repository: Arc<PgUserRepository>,
    pub swipe_repository: Arc<PgSwipeRepository>,
    pub match_repository: Arc<PgMatchRepository>,
    pub seen_repository: Arc<PgSeenRepository>,
    pub crossed_path_repository: Arc<PgCrossedPathRepository>,
    pub message_repository: Arc<PgMessageRepository>,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repository: Arc::new(PgUserRepository::new(pool.clone())),
            swipe_repository: Arc::new(PgSwipeRepository::new(pool.clone())),
            match_repository: Arc::new(PgMatchRepository::new(pool.clone())),
            seen_repository: Arc::new(PgSeenRepository::new(pool.clone())),
            crossed_path_repository: Arc::new(PgCrossedPathRepository::new(pool.clone())),
            message_repository: Arc::new(PgMessageRepository::new(pool.clone())),
            pool,
        }
    }
}

pub async fn create_pg_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}
