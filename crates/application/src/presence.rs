//! 在线连接注册表
//!
//! 进程内维护 用户 -> 当前出站通道 的映射，每个用户最多一个条目。
//! 新连接会静默替换旧条目（后连接者胜出），旧通道不会收到任何通知。
//! 推送是尽力而为的：没有持久化、没有重试，失败只记录日志。

use std::collections::HashMap;

use domain::{MatchId, MessageId, Timestamp, UserId};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// 推送给在线用户的实时负载
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum PresencePayload {
    /// 配对成功提醒
    Match {
        match_id: MatchId,
        /// 配对的另一方
        user_id: UserId,
        text: String,
        sent_at: Timestamp,
    },
    Message {
        match_id: MatchId,
        message_id: MessageId,
        from_user: UserId,
        text: String,
        sent_at: Timestamp,
    },
    Typing {
        match_id: MatchId,
        from_user: UserId,
        sent_at: Timestamp,
    },
}

/// 单次连接的标识，用于"仅当仍是当前连接时才注销"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

pub type PresenceSender = mpsc::Sender<PresencePayload>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("connection closed")]
    Closed,
    #[error("outbound buffer full")]
    Full,
}

struct PresenceEntry {
    connection_id: ConnectionId,
    sender: PresenceSender,
}

#[derive(Default)]
pub struct PresenceRegistry {
    entries: RwLock<HashMap<UserId, PresenceEntry>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 安装或替换用户的出站通道
    pub async fn register(&self, user_id: UserId, sender: PresenceSender) -> ConnectionId {
        let connection_id = ConnectionId::new();
        let previous = self.entries.write().await.insert(
            user_id,
            PresenceEntry {
                connection_id,
                sender,
            },
        );

        if previous.is_some() {
            tracing::info!(user_id = %user_id, "新连接替换了旧的在线连接");
        } else {
            tracing::info!(user_id = %user_id, "用户上线");
        }
        connection_id
    }

    /// 仅当 `connection_id` 仍是该用户的当前连接时移除；返回是否移除
    pub async fn deregister(&self, user_id: UserId, connection_id: ConnectionId) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(&user_id) {
            Some(entry) if entry.connection_id == connection_id => {
                entries.remove(&user_id);
                tracing::info!(user_id = %user_id, "用户下线");
                true
            }
            _ => false,
        }
    }

    /// 尽力投递：已注册时恰好尝试一次，未注册时什么也不做。
    /// 返回是否成功放入通道，失败不会向调用方传播。
    pub async fn send_to(&self, user_id: UserId, payload: PresencePayload) -> bool {
        let entries = self.entries.read().await;
        let Some(entry) = entries.get(&user_id) else {
            tracing::debug!(user_id = %user_id, "用户不在线，跳过实时推送");
            return false;
        };

        match deliver(&entry.sender, payload) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(user_id = %user_id, error = %error, "实时推送失败");
                false
            }
        }
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.entries.read().await.contains_key(&user_id)
    }

    pub async fn online_count(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn deliver(sender: &PresenceSender, payload: PresencePayload) -> Result<(), DeliveryError> {
    sender.try_send(payload).map_err(|err| match err {
        mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
        mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
    })
}
