//! 服务测试共用的装配：内存存储 + 手动时钟 + 在线注册表

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use domain::{GeoPoint, User, UserId};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::clock::ManualClock;
use crate::memory::MemoryStore;
use crate::notifier::NotificationBridge;
use crate::presence::{PresencePayload, PresenceRegistry};
use crate::services::{
    MessageService, MessageServiceDependencies, ProximityService, ProximityServiceDependencies,
    SwipeService, SwipeServiceDependencies,
};
use crate::timeout::RequestTimeout;

pub(crate) struct Harness {
    pub store: Arc<MemoryStore>,
    pub registry: Arc<PresenceRegistry>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
            .single()
            .expect("valid start time");
        Self {
            store: Arc::new(MemoryStore::new()),
            registry: Arc::new(PresenceRegistry::new()),
            clock: Arc::new(ManualClock::new(start)),
        }
    }

    pub fn swipe_service(&self) -> SwipeService {
        SwipeService::new(SwipeServiceDependencies {
            user_repository: self.store.clone(),
            swipe_repository: self.store.clone(),
            match_repository: self.store.clone(),
            notifier: NotificationBridge::new(self.registry.clone()),
            clock: self.clock.clone(),
            timeout: RequestTimeout::default(),
        })
    }

    pub fn proximity_service(&self) -> ProximityService {
        ProximityService::new(ProximityServiceDependencies {
            user_repository: self.store.clone(),
            swipe_repository: self.store.clone(),
            seen_repository: self.store.clone(),
            crossed_path_repository: self.store.clone(),
            clock: self.clock.clone(),
            timeout: RequestTimeout::default(),
        })
    }

    pub fn message_service(&self) -> MessageService {
        MessageService::new(MessageServiceDependencies {
            match_repository: self.store.clone(),
            message_repository: self.store.clone(),
            notifier: NotificationBridge::new(self.registry.clone()),
            clock: self.clock.clone(),
            timeout: RequestTimeout::default(),
        })
    }

    /// 写入一个用户，`seed` 决定 UUID 以便控制规范化顺序
    pub async fn add_user(&self, seed: u128, gender: &str, location: Option<(f64, f64)>) -> Uuid {
        self.add_user_with_interests(seed, gender, &[], location).await
    }

    pub async fn add_user_with_interests(
        &self,
        seed: u128,
        gender: &str,
        interests: &[&str],
        location: Option<(f64, f64)>,
    ) -> Uuid {
        let id = Uuid::from_u128(seed);
        let mut user = User::new(
            UserId::from(id),
            format!("user-{seed:x}"),
            gender,
            crate::clock::Clock::now(self.clock.as_ref()),
        )
        .with_interests(interests.iter().copied());
        user.email = format!("{seed:x}@example.com");
        user.password_hash = Some("$argon2id$secret".to_string());
        if let Some((lng, lat)) = location {
            user = user.located_at(GeoPoint::new(lng, lat).expect("valid test coordinates"));
        }
        self.store.insert_user(user).await;
        id
    }

    pub async fn connect(&self, user: Uuid) -> mpsc::Receiver<PresencePayload> {
        let (tx, rx) = mpsc::channel(16);
        self.registry.register(UserId::from(user), tx).await;
        rx
    }
}
