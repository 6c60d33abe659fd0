use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Duration;
use domain::{
    CanonicalPair, CrossedPath, DomainError, GeoPoint, UserId, CROSSING_RADIUS_METERS,
    DEFAULT_MAX_DISTANCE_KM, LIVE_WINDOW_MINUTES,
};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dto::{CandidatePage, CrossedPathDto, PingSummary, PublicProfile},
    error::ApplicationError,
    lookback,
    repository::{
        CrossedPathRepository, NearbyQuery, SeenRepository, SwipeRepository, UserRepository,
    },
    timeout::RequestTimeout,
};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_CROSSED_PATHS_LIMIT: u32 = 50;

/// 0 或缺省取默认值，超过上限时截断到 `MAX_PAGE_SIZE`
fn page_size(requested: Option<u32>, default: u32) -> u32 {
    requested
        .filter(|l| *l > 0)
        .unwrap_or(default)
        .min(MAX_PAGE_SIZE)
}

/// 发现与队列共用的查询参数
#[derive(Debug, Clone)]
pub struct DiscoverRequest {
    pub viewer: Uuid,
    pub location: GeoPoint,
    pub max_distance_km: Option<f64>,
    pub gender: Option<String>,
    pub interests: Vec<String>,
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

impl DiscoverRequest {
    pub fn new(viewer: Uuid, location: GeoPoint) -> Self {
        Self {
            viewer,
            location,
            max_distance_km: None,
            gender: None,
            interests: Vec::new(),
            limit: None,
            skip: None,
        }
    }
}

pub struct ProximityServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub swipe_repository: Arc<dyn SwipeRepository>,
    pub seen_repository: Arc<dyn SeenRepository>,
    pub crossed_path_repository: Arc<dyn CrossedPathRepository>,
    pub clock: Arc<dyn Clock>,
    pub timeout: RequestTimeout,
}

pub struct ProximityService {
    deps: ProximityServiceDependencies,
}

impl ProximityService {
    pub fn new(deps: ProximityServiceDependencies) -> Self {
        Self { deps }
    }

    /// 附近的候选人：排除已滑过和已看过的用户，按距离由近到远分页
    pub async fn discover(&self, request: DiscoverRequest) -> Result<CandidatePage, ApplicationError> {
        self.deps.timeout.run(self.discover_inner(request)).await
    }

    async fn discover_inner(
        &self,
        request: DiscoverRequest,
    ) -> Result<CandidatePage, ApplicationError> {
        let (query, limit, skip) = self.candidate_query(&request).await?;
        let (page, _) = self.fetch_page(&query, limit, skip).await?;
        Ok(page)
    }

    /// 与发现相同的筛选，并把本页返回的候选人标记为已看
    pub async fn next_in_queue(
        &self,
        request: DiscoverRequest,
    ) -> Result<CandidatePage, ApplicationError> {
        self.deps.timeout.run(self.next_in_queue_inner(request)).await
    }

    async fn next_in_queue_inner(
        &self,
        request: DiscoverRequest,
    ) -> Result<CandidatePage, ApplicationError> {
        let viewer = UserId::from(request.viewer);
        let (query, limit, skip) = self.candidate_query(&request).await?;
        let (page, shown) = self.fetch_page(&query, limit, skip).await?;

        let now = self.deps.clock.now();
        for candidate in shown {
            self.deps
                .seen_repository
                .mark_seen(domain::Seen::new(viewer, candidate, now))
                .await?;
        }

        tracing::debug!(
            viewer = %viewer,
            returned = page.users.len(),
            has_more = page.has_more,
            "队列已推进"
        );
        Ok(page)
    }

    async fn candidate_query(
        &self,
        request: &DiscoverRequest,
    ) -> Result<(NearbyQuery, u32, u32), ApplicationError> {
        // 0 与缺省同义
        let max_distance_km = match request.max_distance_km {
            None => DEFAULT_MAX_DISTANCE_KM,
            Some(km) if km == 0.0 => DEFAULT_MAX_DISTANCE_KM,
            Some(km) => km,
        };
        if !max_distance_km.is_finite() || max_distance_km < 0.0 {
            return Err(DomainError::invalid_argument(
                "maxDistanceKm",
                "must be a non-negative number",
            )
            .into());
        }
        let limit = page_size(request.limit, DEFAULT_PAGE_SIZE);
        let skip = request.skip.unwrap_or(0);

        let viewer = UserId::from(request.viewer);
        let mut query = NearbyQuery::around(request.location, max_distance_km * 1000.0);
        query.exclude = self.exclusion_set(viewer).await?;
        query.gender = request
            .gender
            .as_ref()
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());
        query.interests = request
            .interests
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();

        Ok((query, limit, skip))
    }

    /// 查询者本人、滑过的每个人（任意动作）以及已看集合
    async fn exclusion_set(&self, viewer: UserId) -> Result<Vec<UserId>, ApplicationError> {
        let mut excluded: HashSet<UserId> = HashSet::from([viewer]);
        excluded.extend(
            self.deps
                .swipe_repository
                .list_from(viewer)
                .await?
                .into_iter()
                .map(|swipe| swipe.to_user),
        );
        excluded.extend(self.deps.seen_repository.list_seen(viewer).await?);
        Ok(excluded.into_iter().collect())
    }

    /// 计数在取页之前完成，与分页查询使用同一组条件
    async fn fetch_page(
        &self,
        query: &NearbyQuery,
        limit: u32,
        skip: u32,
    ) -> Result<(CandidatePage, Vec<UserId>), ApplicationError> {
        let total = self.deps.user_repository.count_nearby(query).await?;

        let mut paged = query.clone();
        paged.limit = Some(limit);
        paged.skip = skip;
        let users = self.deps.user_repository.find_nearby(&paged).await?;

        let next = skip.saturating_add(limit);
        let page = CandidatePage {
            users: users.iter().map(PublicProfile::from).collect(),
            next,
            has_more: u64::from(next) < total,
        };
        Ok((page, users.into_iter().map(|u| u.id).collect()))
    }

    /// 上报位置并检测擦肩而过
    pub async fn ping_location(
        &self,
        user: Uuid,
        coordinates: &[f64],
    ) -> Result<PingSummary, ApplicationError> {
        let location = GeoPoint::from_coordinates(coordinates)?;
        self.deps
            .timeout
            .run(self.ping_location_inner(UserId::from(user), location))
            .await
    }

    async fn ping_location_inner(
        &self,
        user: UserId,
        location: GeoPoint,
    ) -> Result<PingSummary, ApplicationError> {
        let now = self.deps.clock.now();
        if !self
            .deps
            .user_repository
            .update_location(user, location, now)
            .await?
        {
            return Err(DomainError::UserNotFound.into());
        }

        let mut query = NearbyQuery::around(location, CROSSING_RADIUS_METERS);
        query.exclude = vec![user];
        query.active_since = Some(now - Duration::minutes(LIVE_WINDOW_MINUTES));
        let neighbors = self.deps.user_repository.find_nearby(&query).await?;

        let mut recorded = 0;
        for neighbor in &neighbors {
            let pair = CanonicalPair::new(user, neighbor.id);
            let existing = self
                .deps
                .crossed_path_repository
                .find_latest_since(pair.first(), pair.second(), CrossedPath::window_start(now))
                .await?;

            match existing {
                Some(record) => {
                    self.deps
                        .crossed_path_repository
                        .increment_times_crossed(record.id)
                        .await?;
                }
                None => {
                    self.deps
                        .crossed_path_repository
                        .insert(CrossedPath::record(pair, location, now))
                        .await?;
                    recorded += 1;
                    tracing::info!(
                        user1 = %pair.first(),
                        user2 = %pair.second(),
                        "记录擦肩而过"
                    );
                }
            }
        }

        Ok(PingSummary {
            neighbors: neighbors.len(),
            recorded,
        })
    }

    /// 回看窗口内与 `user` 有关的擦肩记录，新的在前
    pub async fn crossed_paths(
        &self,
        user: Uuid,
        since: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Vec<CrossedPathDto>, ApplicationError> {
        let lookback = lookback::resolve_lookback(since);
        let limit = page_size(limit, DEFAULT_CROSSED_PATHS_LIMIT);
        self.deps
            .timeout
            .run(self.crossed_paths_inner(UserId::from(user), lookback, limit))
            .await
    }

    async fn crossed_paths_inner(
        &self,
        user: UserId,
        lookback: Duration,
        limit: u32,
    ) -> Result<Vec<CrossedPathDto>, ApplicationError> {
        let since = self.deps.clock.now() - lookback;
        let records = self
            .deps
            .crossed_path_repository
            .list_for_user(user, since, limit)
            .await?;

        let others: Vec<UserId> = records
            .iter()
            .filter_map(|record| record.other_party(user))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        // 对方资料查不到时只是不附带，不影响列表本身
        let profiles: HashMap<UserId, PublicProfile> = if others.is_empty() {
            HashMap::new()
        } else {
            match self.deps.user_repository.find_by_ids(others).await {
                Ok(users) => users.iter().map(|u| (u.id, PublicProfile::from(u))).collect(),
                Err(error) => {
                    tracing::warn!(user_id = %user, error = %error, "加载擦肩对象资料失败");
                    HashMap::new()
                }
            }
        };

        Ok(records
            .iter()
            .map(|record| {
                let other = record
                    .other_party(user)
                    .and_then(|id| profiles.get(&id).cloned());
                CrossedPathDto::new(record, other)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::MemoryStore;
    use crate::repository::MockUserRepository;
    use crate::services::test_support::Harness;
    use crate::services::RecordSwipeRequest;
    use domain::{RepositoryError, SwipeAction};

    const CENTER: (f64, f64) = (10.0, 20.0);

    fn near(dlng: f64, dlat: f64) -> Option<(f64, f64)> {
        Some((CENTER.0 + dlng, CENTER.1 + dlat))
    }

    fn request(viewer: Uuid) -> DiscoverRequest {
        DiscoverRequest::new(viewer, GeoPoint::new(CENTER.0, CENTER.1).unwrap())
    }

    fn ids(page: &CandidatePage) -> Vec<Uuid> {
        page.users.iter().map(|u| u.id).collect()
    }

    #[tokio::test]
    async fn discover_sorts_nearest_first_and_respects_distance() {
        let harness = Harness::new();
        let viewer = harness.add_user(0x1, "male", near(0.0, 0.0)).await;
        let far = harness.add_user(0x2, "female", near(0.02, 0.0)).await;
        let close = harness.add_user(0x3, "female", near(0.001, 0.0)).await;
        harness.add_user(0x4, "female", near(1.0, 0.0)).await;
        harness.add_user(0x5, "female", None).await;
        let service = harness.proximity_service();

        let page = service.discover(request(viewer)).await.unwrap();

        assert_eq!(ids(&page), vec![close, far]);
        assert_eq!(page.next, DEFAULT_PAGE_SIZE);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn discover_applies_gender_and_interest_filters() {
        let harness = Harness::new();
        let viewer = harness.add_user(0x1, "male", near(0.0, 0.0)).await;
        let hiker = harness
            .add_user_with_interests(0x2, "female", &["hiking", "jazz"], near(0.001, 0.0))
            .await;
        harness
            .add_user_with_interests(0x3, "female", &["chess"], near(0.001, 0.0))
            .await;
        harness
            .add_user_with_interests(0x4, "male", &["hiking"], near(0.001, 0.0))
            .await;
        let service = harness.proximity_service();

        let mut req = request(viewer);
        req.gender = Some("female".to_string());
        req.interests = vec!["hiking".to_string(), "surfing".to_string()];
        let page = service.discover(req).await.unwrap();

        assert_eq!(ids(&page), vec![hiker]);
    }

    #[tokio::test]
    async fn discover_excludes_swiped_users_of_any_action() {
        let harness = Harness::new();
        let viewer = harness.add_user(0x1, "male", near(0.0, 0.0)).await;
        let disliked = harness.add_user(0x2, "female", near(0.001, 0.0)).await;
        let fresh = harness.add_user(0x3, "female", near(0.002, 0.0)).await;

        harness
            .swipe_service()
            .record_swipe(RecordSwipeRequest {
                from_user: viewer,
                to_user: disliked,
                action: SwipeAction::Dislike,
                source: String::new(),
            })
            .await
            .unwrap();

        let page = harness.proximity_service().discover(request(viewer)).await.unwrap();
        assert_eq!(ids(&page), vec![fresh]);
    }

    #[tokio::test]
    async fn queue_marks_returned_candidates_as_seen() {
        let harness = Harness::new();
        let viewer = harness.add_user(0x1, "male", near(0.0, 0.0)).await;
        let first = harness.add_user(0x2, "female", near(0.001, 0.0)).await;
        let second = harness.add_user(0x3, "female", near(0.002, 0.0)).await;
        let third = harness.add_user(0x4, "female", near(0.003, 0.0)).await;
        let service = harness.proximity_service();

        let mut req = request(viewer);
        req.limit = Some(2);
        let page = service.next_in_queue(req.clone()).await.unwrap();
        assert_eq!(ids(&page), vec![first, second]);
        assert_eq!(page.next, 2);
        assert!(page.has_more);

        // 已看过的人不再出现，即便不传 skip
        let page = service.next_in_queue(req).await.unwrap();
        assert_eq!(ids(&page), vec![third]);
        assert!(!page.has_more);

        let mut seen = SeenRepository::list_seen(harness.store.as_ref(), UserId::from(viewer))
            .await
            .unwrap();
        seen.sort();
        assert_eq!(
            seen,
            vec![UserId::from(first), UserId::from(second), UserId::from(third)]
        );
    }

    #[tokio::test]
    async fn queued_candidate_is_excluded_from_discover() {
        let harness = Harness::new();
        let viewer = harness.add_user(0xa, "male", near(0.0, 0.0)).await;
        let u = harness.add_user(0xb, "female", near(0.001, 0.0)).await;
        let other = harness.add_user(0xc, "female", near(0.002, 0.0)).await;
        let service = harness.proximity_service();

        let mut req = request(viewer);
        req.limit = Some(1);
        let page = service.next_in_queue(req).await.unwrap();
        assert_eq!(ids(&page), vec![u]);

        let discovered = service.discover(request(viewer)).await.unwrap();
        assert!(!ids(&discovered).contains(&u));
        assert_eq!(ids(&discovered), vec![other]);

        let again = service.next_in_queue(request(viewer)).await.unwrap();
        assert!(!ids(&again).contains(&u));
    }

    #[tokio::test]
    async fn zero_paging_and_distance_fall_back_to_defaults() {
        let harness = Harness::new();
        let viewer = harness.add_user(0x1, "male", near(0.0, 0.0)).await;
        let close = harness.add_user(0x2, "female", near(0.001, 0.0)).await;
        harness.add_user(0x3, "female", near(1.0, 0.0)).await;
        let service = harness.proximity_service();

        let mut req = request(viewer);
        req.limit = Some(0);
        req.max_distance_km = Some(0.0);
        let page = service.discover(req.clone()).await.unwrap();
        assert_eq!(ids(&page), vec![close]);
        assert_eq!(page.next, DEFAULT_PAGE_SIZE);

        let page = service.next_in_queue(req).await.unwrap();
        assert_eq!(ids(&page), vec![close]);
        assert_eq!(page.next, DEFAULT_PAGE_SIZE);
    }

    #[tokio::test]
    async fn oversized_limit_is_capped() {
        let harness = Harness::new();
        let viewer = harness.add_user(0x1, "male", near(0.0, 0.0)).await;
        let service = harness.proximity_service();

        let mut req = request(viewer);
        req.limit = Some(MAX_PAGE_SIZE + 1);
        let page = service.discover(req).await.unwrap();
        assert_eq!(page.next, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn negative_or_non_finite_distance_is_rejected() {
        let harness = Harness::new();
        let viewer = harness.add_user(0x1, "male", near(0.0, 0.0)).await;
        let service = harness.proximity_service();

        for km in [-1.0, f64::NAN, f64::INFINITY] {
            let mut req = request(viewer);
            req.max_distance_km = Some(km);
            assert!(matches!(
                service.next_in_queue(req).await,
                Err(ApplicationError::Domain(DomainError::InvalidArgument { .. }))
            ));
        }
    }

    #[tokio::test]
    async fn ping_requires_exactly_two_coordinates() {
        let harness = Harness::new();
        let user = harness.add_user(0x1, "male", None).await;
        let service = harness.proximity_service();

        for coordinates in [vec![], vec![10.0], vec![10.0, 20.0, 30.0], vec![200.0, 20.0]] {
            assert!(matches!(
                service.ping_location(user, &coordinates).await,
                Err(ApplicationError::Domain(DomainError::InvalidArgument { .. }))
            ));
        }
        let stored = UserRepository::find_by_id(harness.store.as_ref(), UserId::from(user))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.location, None);
    }

    #[tokio::test]
    async fn ping_for_unknown_user_is_not_found() {
        let harness = Harness::new();
        let result = harness
            .proximity_service()
            .ping_location(Uuid::from_u128(0x99), &[10.0, 20.0])
            .await;
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::UserNotFound))
        ));
    }

    #[tokio::test]
    async fn crossed_paths_are_deduplicated_within_the_hour() {
        let harness = Harness::new();
        let a = harness.add_user(0xa, "female", None).await;
        let b = harness.add_user(0xb, "male", None).await;
        let service = harness.proximity_service();
        let a_spot = [10.0, 20.0];
        let b_spot = [10.0005, 20.0005];

        // t=0: A 上报，B 还没有位置
        let summary = service.ping_location(a, &a_spot).await.unwrap();
        assert_eq!(summary, PingSummary { neighbors: 0, recorded: 0 });

        // t=1s: B 在约 76 米外上报
        harness.clock.advance(Duration::seconds(1));
        let summary = service.ping_location(b, &b_spot).await.unwrap();
        assert_eq!(summary, PingSummary { neighbors: 1, recorded: 1 });
        assert_eq!(harness.store.crossed_paths().await.len(), 1);

        // t=30min: A 刷新位置保持在线，B 再次上报，仍在窗口内
        harness.clock.advance(Duration::minutes(30) - Duration::seconds(1));
        service.ping_location(a, &a_spot).await.unwrap();
        let summary = service.ping_location(b, &b_spot).await.unwrap();
        assert_eq!(summary, PingSummary { neighbors: 1, recorded: 0 });

        let records = harness.store.crossed_paths().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].times_crossed, 2);

        // t=61min: 距第一条记录已超过一小时
        harness.clock.advance(Duration::minutes(31));
        service.ping_location(a, &a_spot).await.unwrap();
        let summary = service.ping_location(b, &b_spot).await.unwrap();
        assert_eq!(summary, PingSummary { neighbors: 1, recorded: 1 });

        let records = harness.store.crossed_paths().await;
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record.pair(), CanonicalPair::new(UserId::from(a), UserId::from(b)));
        }
    }

    #[tokio::test]
    async fn stale_neighbors_are_not_crossed() {
        let harness = Harness::new();
        let a = harness.add_user(0xa, "female", None).await;
        let b = harness.add_user(0xb, "male", None).await;
        let service = harness.proximity_service();

        service.ping_location(a, &[10.0, 20.0]).await.unwrap();
        harness.clock.advance(Duration::minutes(11));
        let summary = service.ping_location(b, &[10.0005, 20.0005]).await.unwrap();

        assert_eq!(summary, PingSummary { neighbors: 0, recorded: 0 });
        assert!(harness.store.crossed_paths().await.is_empty());
    }

    #[tokio::test]
    async fn crossed_paths_are_listed_newest_first_with_counterpart() {
        let harness = Harness::new();
        let me = harness.add_user(0x1, "female", None).await;
        let first = harness.add_user(0x2, "male", None).await;
        let second = harness.add_user(0x3, "male", None).await;
        let service = harness.proximity_service();

        service.ping_location(first, &[10.0, 20.0]).await.unwrap();
        service.ping_location(me, &[10.0, 20.0003]).await.unwrap();
        harness.clock.advance(Duration::minutes(5));
        service.ping_location(second, &[10.0, 20.0006]).await.unwrap();

        let listed = service.crossed_paths(me, None, None).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].other_user.as_ref().map(|p| p.id), Some(second));
        assert_eq!(listed[1].other_user.as_ref().map(|p| p.id), Some(first));

        let limited = service.crossed_paths(me, Some("24h"), Some(1)).await.unwrap();
        assert_eq!(limited.len(), 1);

        harness.clock.advance(Duration::hours(2));
        let recent = service.crossed_paths(me, Some("1h"), None).await.unwrap();
        assert!(recent.is_empty());
        let fallback = service.crossed_paths(me, Some("whenever"), None).await.unwrap();
        assert_eq!(fallback.len(), 2);
    }

    #[tokio::test]
    async fn counterpart_lookup_failure_leaves_annotation_empty() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let me = UserId::from(Uuid::from_u128(0x1));
        let other = UserId::from(Uuid::from_u128(0x2));
        let record = CrossedPath::record(
            CanonicalPair::new(me, other),
            GeoPoint::new(10.0, 20.0).unwrap(),
            clock.now(),
        );
        CrossedPathRepository::insert(store.as_ref(), record).await.unwrap();

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_ids()
            .returning(|_| Err(RepositoryError::storage("profile store down")));

        let service = ProximityService::new(ProximityServiceDependencies {
            user_repository: Arc::new(users),
            swipe_repository: store.clone(),
            seen_repository: store.clone(),
            crossed_path_repository: store.clone(),
            clock,
            timeout: RequestTimeout::default(),
        });

        let listed = service.crossed_paths(me.into(), None, None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].other_user.is_none());
    }
}
