mod message_service;
mod proximity_service;
mod swipe_service;

#[cfg(test)]
mod test_support;

pub use message_service::{MessageService, MessageServiceDependencies, SendMessageRequest};
pub use proximity_service::{
    DiscoverRequest, ProximityService, ProximityServiceDependencies, DEFAULT_CROSSED_PATHS_LIMIT,
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};
pub use swipe_service::{RecordSwipeRequest, SwipeService, SwipeServiceDependencies};
