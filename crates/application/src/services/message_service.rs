use std::sync::Arc;

use domain::{DomainError, Match, MatchId, Message, MessageContent, MessageId, UserId};
use uuid::Uuid;

use crate::{
    clock::Clock,
    dto::MessageDto,
    error::ApplicationError,
    notifier::NotificationBridge,
    repository::{MatchRepository, MessageRepository},
    timeout::RequestTimeout,
};

#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub match_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
}

pub struct MessageServiceDependencies {
    pub match_repository: Arc<dyn MatchRepository>,
    pub message_repository: Arc<dyn MessageRepository>,
    pub notifier: NotificationBridge,
    pub clock: Arc<dyn Clock>,
    pub timeout: RequestTimeout,
}

pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    async fn participant_match(
        &self,
        match_id: MatchId,
        user: UserId,
    ) -> Result<Match, ApplicationError> {
        let record = self
            .deps
            .match_repository
            .find_by_id(match_id)
            .await?
            .ok_or(DomainError::MatchNotFound)?;

        if !record.involves(user) {
            return Err(DomainError::NotMatchParticipant.into());
        }
        Ok(record)
    }

    /// 持久化消息后推送给配对的另一方；推送失败不影响结果
    pub async fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        self.deps.timeout.run(self.send_message_inner(request)).await
    }

    async fn send_message_inner(
        &self,
        request: SendMessageRequest,
    ) -> Result<MessageDto, ApplicationError> {
        let match_id = MatchId::from(request.match_id);
        let sender = UserId::from(request.sender_id);

        let record = self.participant_match(match_id, sender).await?;
        let content = MessageContent::new(request.content)?;

        let message = Message::new(
            MessageId::from(Uuid::new_v4()),
            match_id,
            sender,
            content,
            self.deps.clock.now(),
        );
        let stored = self.deps.message_repository.insert(message).await?;

        self.deps.notifier.message_sent(&record, &stored).await;
        Ok(MessageDto::from(&stored))
    }

    pub async fn list_messages(
        &self,
        match_id: Uuid,
        user: Uuid,
    ) -> Result<Vec<MessageDto>, ApplicationError> {
        self.deps
            .timeout
            .run(self.list_messages_inner(MatchId::from(match_id), UserId::from(user)))
            .await
    }

    async fn list_messages_inner(
        &self,
        match_id: MatchId,
        user: UserId,
    ) -> Result<Vec<MessageDto>, ApplicationError> {
        self.participant_match(match_id, user).await?;
        let messages = self.deps.message_repository.list_for_match(match_id).await?;
        Ok(messages.iter().map(MessageDto::from).collect())
    }

    /// 转发"正在输入"信号。配对不存在或发送者不是参与方时静默忽略。
    pub async fn signal_typing(&self, match_id: Uuid, sender: Uuid) -> Result<bool, ApplicationError> {
        let match_id = MatchId::from(match_id);
        let sender = UserId::from(sender);

        let lookup = self
            .deps
            .timeout
            .run(self.participant_match(match_id, sender))
            .await;
        let record = match lookup {
            Ok(record) => record,
            Err(ApplicationError::Domain(error)) => {
                tracing::debug!(match_id = %match_id, user_id = %sender, error = %error, "忽略输入状态信号");
                return Ok(false);
            }
            Err(error) => return Err(error),
        };

        Ok(self
            .deps
            .notifier
            .typing(&record, sender, self.deps.clock.now())
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::PresencePayload;
    use crate::services::test_support::Harness;

    async fn matched_pair(harness: &Harness) -> (Uuid, Uuid, Uuid) {
        let a = harness.add_user(0xa1, "female", None).await;
        let b = harness.add_user(0xb1, "male", None).await;
        let record = Match::between(UserId::from(a), UserId::from(b), harness.clock.now());
        let created = harness.store.create(record).await.unwrap();
        (created.id.into(), a, b)
    }

    fn message(match_id: Uuid, sender: Uuid, content: &str) -> SendMessageRequest {
        SendMessageRequest {
            match_id,
            sender_id: sender,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn message_is_persisted_and_pushed_to_recipient() {
        let harness = Harness::new();
        let (match_id, a, b) = matched_pair(&harness).await;
        let mut a_rx = harness.connect(a).await;
        let mut b_rx = harness.connect(b).await;
        let service = harness.message_service();

        let sent = service.send_message(message(match_id, a, "hello")).await.unwrap();
        assert_eq!(sent.content, "hello");
        assert_eq!(sent.from_user, a);

        match b_rx.recv().await {
            Some(PresencePayload::Message { text, from_user, .. }) => {
                assert_eq!(text, "hello");
                assert_eq!(Uuid::from(from_user), a);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert!(a_rx.try_recv().is_err());

        let history = service.list_messages(match_id, b).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, sent.id);
    }

    #[tokio::test]
    async fn offline_recipient_still_gets_the_stored_message() {
        let harness = Harness::new();
        let (match_id, a, b) = matched_pair(&harness).await;
        let service = harness.message_service();

        service.send_message(message(match_id, b, "are you there?")).await.unwrap();

        assert_eq!(harness.store.message_count().await, 1);
        assert_eq!(service.list_messages(match_id, a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn outsider_cannot_send_or_read() {
        let harness = Harness::new();
        let (match_id, a, b) = matched_pair(&harness).await;
        let outsider = harness.add_user(0xc1, "male", None).await;
        let mut a_rx = harness.connect(a).await;
        let mut b_rx = harness.connect(b).await;
        let service = harness.message_service();

        let result = service.send_message(message(match_id, outsider, "hi")).await;
        assert!(matches!(
            result,
            Err(ApplicationError::Domain(DomainError::NotMatchParticipant))
        ));
        assert_eq!(harness.store.message_count().await, 0);
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_err());

        assert!(matches!(
            service.list_messages(match_id, outsider).await,
            Err(ApplicationError::Domain(DomainError::NotMatchParticipant))
        ));
    }

    #[tokio::test]
    async fn blank_message_and_unknown_match_are_rejected() {
        let harness = Harness::new();
        let (match_id, a, _) = matched_pair(&harness).await;
        let service = harness.message_service();

        assert!(matches!(
            service.send_message(message(match_id, a, "   ")).await,
            Err(ApplicationError::Domain(DomainError::InvalidArgument { .. }))
        ));
        assert!(matches!(
            service.send_message(message(Uuid::new_v4(), a, "hi")).await,
            Err(ApplicationError::Domain(DomainError::MatchNotFound))
        ));
        assert_eq!(harness.store.message_count().await, 0);
    }

    #[tokio::test]
    async fn typing_reaches_only_the_counterpart() {
        let harness = Harness::new();
        let (match_id, a, b) = matched_pair(&harness).await;
        let outsider = harness.add_user(0xc1, "male", None).await;
        let mut a_rx = harness.connect(a).await;
        let mut b_rx = harness.connect(b).await;
        let service = harness.message_service();

        assert!(service.signal_typing(match_id, a).await.unwrap());
        assert!(matches!(
            b_rx.recv().await,
            Some(PresencePayload::Typing { .. })
        ));

        assert!(!service.signal_typing(match_id, outsider).await.unwrap());
        assert!(!service.signal_typing(Uuid::new_v4(), a).await.unwrap());
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_err());
    }
}
