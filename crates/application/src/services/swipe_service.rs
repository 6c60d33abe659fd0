use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use domain::{Match, Swipe, SwipeAction, UserId};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dto::{MatchDto, PublicProfile, SwipeOutcome},
    error::ApplicationError,
    notifier::NotificationBridge,
    repository::{MatchRepository, SwipeRepository, UserRepository},
    timeout::RequestTimeout,
};

#[derive(Debug, Clone)]
pub struct RecordSwipeRequest {
    pub from_user: Uuid,
    pub to_user: Uuid,
    pub action: SwipeAction,
    pub source: String,
}

pub struct SwipeServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub swipe_repository: Arc<dyn SwipeRepository>,
    pub match_repository: Arc<dyn MatchRepository>,
    pub notifier: NotificationBridge,
    pub clock: Arc<dyn Clock>,
    pub timeout: RequestTimeout,
}

pub struct SwipeService {
    deps: SwipeServiceDependencies,
}

impl SwipeService {
    pub fn new(deps: SwipeServiceDependencies) -> Self {
        Self { deps }
    }

    /// 记录一次滑动，双方互相喜欢时创建配对。
    ///
    /// 滑动记录先写入且不会回滚：后续步骤失败时滑动仍然保留。
    pub async fn record_swipe(
        &self,
        request: RecordSwipeRequest,
    ) -> Result<SwipeOutcome, ApplicationError> {
        self.deps.timeout.run(self.record_swipe_inner(request)).await
    }

    async fn record_swipe_inner(
        &self,
        request: RecordSwipeRequest,
    ) -> Result<SwipeOutcome, ApplicationError> {
        let from_user = UserId::from(request.from_user);
        let to_user = UserId::from(request.to_user);
        let now = self.deps.clock.now();

        let swipe = Swipe::record(from_user, to_user, request.action, request.source, now)?;
        self.deps.swipe_repository.insert(swipe).await?;

        if !request.action.is_positive() {
            return Ok(SwipeOutcome { matched: false });
        }

        let reverse = self
            .deps
            .swipe_repository
            .find_positive(to_user, from_user)
            .await?;
        if reverse.is_none() {
            return Ok(SwipeOutcome { matched: false });
        }

        match self
            .deps
            .match_repository
            .create(Match::between(from_user, to_user, now))
            .await
        {
            Ok(record) => {
                tracing::info!(
                    match_id = %record.id,
                    user1 = %record.user1,
                    user2 = %record.user2,
                    "配对成功"
                );
                self.deps.notifier.match_created(&record, from_user, now).await;
                Ok(SwipeOutcome { matched: true })
            }
            // 唯一约束冲突说明另一个请求已经创建了配对
            Err(error) if error.is_conflict() => {
                tracing::debug!(from_user = %from_user, to_user = %to_user, "配对已存在");
                Ok(SwipeOutcome { matched: true })
            }
            Err(error) => {
                tracing::error!(
                    from_user = %from_user,
                    to_user = %to_user,
                    error = %error,
                    "滑动已保存，但创建配对失败"
                );
                Err(error.into())
            }
        }
    }

    /// 喜欢了 `user` 但 `user` 还没有回应过的人
    pub async fn mutual_interest_backlog(
        &self,
        user: Uuid,
    ) -> Result<Vec<PublicProfile>, ApplicationError> {
        self.deps
            .timeout
            .run(self.backlog_inner(UserId::from(user)))
            .await
    }

    async fn backlog_inner(&self, user: UserId) -> Result<Vec<PublicProfile>, ApplicationError> {
        let liked_me = self.deps.swipe_repository.list_positive_to(user).await?;
        let responded: HashSet<UserId> = self
            .deps
            .swipe_repository
            .list_from(user)
            .await?
            .into_iter()
            .map(|swipe| swipe.to_user)
            .collect();

        let mut pending = Vec::new();
        let mut visited = HashSet::new();
        for swipe in liked_me {
            if !responded.contains(&swipe.from_user) && visited.insert(swipe.from_user) {
                pending.push(swipe.from_user);
            }
        }
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let users = self.deps.user_repository.find_by_ids(pending).await?;
        Ok(users.iter().map(PublicProfile::from).collect())
    }

    /// 用户参与的全部配对，新的在前，附带对方的公开资料
    pub async fn list_matches(&self, user: Uuid) -> Result<Vec<MatchDto>, ApplicationError> {
        self.deps
            .timeout
            .run(self.list_matches_inner(UserId::from(user)))
            .await
    }

    async fn list_matches_inner(&self, user: UserId) -> Result<Vec<MatchDto>, ApplicationError> {
        let matches = self.deps.match_repository.list_for_user(user).await?;
        let counterparts: Vec<UserId> = matches
            .iter()
            .filter_map(|record| record.counterpart_of(user))
            .collect();

        let profiles: HashMap<UserId, PublicProfile> = if counterparts.is_empty() {
            HashMap::new()
        } else {
            self.deps
                .user_repository
                .find_by_ids(counterparts)
                .await?
                .iter()
                .map(|u| (u.id, PublicProfile::from(u)))
                .collect()
        };

        Ok(matches
            .iter()
            .map(|record| {
                let other = record
                    .counterpart_of(user)
                    .and_then(|id| profiles.get(&id).cloned());
                MatchDto::new(record, other)
            })
            .collect())
    }
}
