use std::sync::Arc;

use application::{MessageService, PresenceRegistry, ProximityService, SwipeService};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub swipe_service: Arc<SwipeService>,
    pub proximity_service: Arc<ProximityService>,
    pub message_service: Arc<MessageService>,
    pub registry: Arc<PresenceRegistry>,
    pub jwt_service: Arc<JwtService>,
    /// 每个 WebSocket 连接的出站缓冲容量
    pub presence_channel_capacity: usize,
}

impl AppState {
    pub fn new(
        swipe_service: Arc<SwipeService>,
        proximity_service: Arc<ProximityService>,
        message_service: Arc<MessageService>,
        registry: Arc<PresenceRegistry>,
        jwt_service: Arc<JwtService>,
        presence_channel_capacity: usize,
    ) -> Self {
        Self {
            swipe_service,
            proximity_service,
            message_service,
            registry,
            jwt_service,
            presence_channel_capacity,
        }
    }
}
