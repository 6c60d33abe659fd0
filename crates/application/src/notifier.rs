use std::sync::Arc;

use domain::{Match, Message, Timestamp, UserId};

use crate::presence::{PresencePayload, PresenceRegistry};

/// 把引擎事件翻译为实时负载，经在线注册表推送。
///
/// 所有推送都是即发即弃：消息已先行持久化，实时送达与否不影响调用结果。
#[derive(Clone)]
pub struct NotificationBridge {
    registry: Arc<PresenceRegistry>,
}

impl NotificationBridge {
    pub fn new(registry: Arc<PresenceRegistry>) -> Self {
        Self { registry }
    }

    /// 配对成功：通知双方，`initiator` 是触发配对的一方
    pub async fn match_created(&self, record: &Match, initiator: UserId, at: Timestamp) {
        for (recipient, text) in [
            (record.user1, Self::match_text(record.user1 == initiator)),
            (record.user2, Self::match_text(record.user2 == initiator)),
        ] {
            let Some(counterpart) = record.counterpart_of(recipient) else {
                continue;
            };
            self.registry
                .send_to(
                    recipient,
                    PresencePayload::Match {
                        match_id: record.id,
                        user_id: counterpart,
                        text: text.to_string(),
                        sent_at: at,
                    },
                )
                .await;
        }
    }

    fn match_text(is_initiator: bool) -> &'static str {
        if is_initiator {
            "It's a match!"
        } else {
            "You got a match!"
        }
    }

    /// 新消息：推送给配对中除发送者以外的一方
    pub async fn message_sent(&self, record: &Match, message: &Message) {
        let Some(recipient) = record.counterpart_of(message.from_user) else {
            tracing::warn!(match_id = %record.id, from_user = %message.from_user, "发送者不属于该配对，跳过推送");
            return;
        };

        self.registry
            .send_to(
                recipient,
                PresencePayload::Message {
                    match_id: record.id,
                    message_id: message.id,
                    from_user: message.from_user,
                    text: message.content.as_str().to_owned(),
                    sent_at: message.created_at,
                },
            )
            .await;
    }

    /// 正在输入：调用方须已确认 `from` 是配对参与方
    pub async fn typing(&self, record: &Match, from: UserId, at: Timestamp) -> bool {
        let Some(recipient) = record.counterpart_of(from) else {
            return false;
        };

        self.registry
            .send_to(
                recipient,
                PresencePayload::Typing {
                    match_id: record.id,
                    from_user: from,
                    sent_at: at,
                },
            )
            .await
    }
}
