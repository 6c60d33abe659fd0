//! 应用层实现。
//!
//! 这里提供邻近发现、滑动配对与实时推送的用例服务，处理输入校验、
//! 请求级超时，以及对外部适配器（存储、在线连接）的抽象。

pub mod clock;
pub mod dto;
pub mod error;
pub mod lookback;
pub mod memory;
pub mod notifier;
pub mod presence;
pub mod repository;
pub mod services;
pub mod timeout;

pub use clock::{Clock, ManualClock, SystemClock};
pub use dto::{
    CandidatePage, CrossedPathDto, MatchDto, MessageDto, PingSummary, PublicProfile,
    SwipeOutcome,
};
pub use error::ApplicationError;
pub use memory::MemoryStore;
pub use notifier::NotificationBridge;
pub use presence::{ConnectionId, DeliveryError, PresencePayload, PresenceRegistry, PresenceSender};
pub use repository::{
    CrossedPathRepository, MatchRepository, MessageRepository, NearbyQuery, SeenRepository,
    SwipeRepository, UserRepository,
};
pub use services::{
    DiscoverRequest, MessageService, MessageServiceDependencies, ProximityService,
    ProximityServiceDependencies, RecordSwipeRequest, SendMessageRequest, SwipeService,
    SwipeServiceDependencies,
};
pub use timeout::RequestTimeout;
