use application::PresencePayload;
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::UserId;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::state::AppState;

/// 客户端上行帧
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClientFrame {
    Typing {
        #[serde(rename = "matchId")]
        match_id: Uuid,
    },
}

/// 发送任务的写命令
enum WsCommand {
    SendPong(Vec<u8>),
}

/// WebSocket 连接管理器
///
/// 封装单个在线连接的生命周期：
/// - 向在线注册表登记出站通道
/// - 把推送负载写成 JSON 文本帧
/// - 读取客户端的输入状态帧并回应 ping
/// - 断开时仅注销本连接自己的登记
pub struct WebSocketConnection {
    socket: WebSocket,
    state: AppState,
    user_id: UserId,
}

impl WebSocketConnection {
    pub fn new(socket: WebSocket, state: AppState, user_id: Uuid) -> Self {
        tracing::info!(user_id = %user_id, "WebSocket 连接已建立");
        Self {
            socket,
            state,
            user_id: UserId::from(user_id),
        }
    }

    pub async fn run(self) {
        let Self {
            socket,
            state,
            user_id,
        } = self;

        let (payload_tx, mut payload_rx) =
            mpsc::channel::<PresencePayload>(state.presence_channel_capacity.max(1));
        let connection_id = state.registry.register(user_id, payload_tx).await;

        let (mut sender, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 发送任务：统一处理所有对 WebSocket sender 的写操作
        let mut send_task = tokio::spawn(async move {
            // 被新连接替换后注册表会释放发送端，此后本连接不再收到推送
            let mut forwarding = true;
            loop {
                tokio::select! {
                    Some(cmd) = cmd_rx.recv() => {
                        match cmd {
                            WsCommand::SendPong(data) => {
                                if sender.send(WsMessage::Pong(data.into())).await.is_err() {
                                    tracing::warn!("Failed to send pong message");
                                    break;
                                }
                            }
                        }
                    }
                    payload = payload_rx.recv(), if forwarding => {
                        let Some(payload) = payload else {
                            tracing::debug!(user_id = %user_id, "在线登记已被替换，停止转发推送");
                            forwarding = false;
                            continue;
                        };
                        let text = match serde_json::to_string(&payload) {
                            Ok(json) => json,
                            Err(err) => {
                                tracing::warn!(error = %err, "failed to serialize websocket payload");
                                continue;
                            }
                        };
                        if sender.send(WsMessage::Text(text.into())).await.is_err() {
                            tracing::warn!(user_id = %user_id, "Failed to send push payload");
                            break;
                        }
                    }
                    else => break,
                }
            }
            tracing::debug!("WebSocket发送任务结束");
        });

        // 接收任务：处理来自WebSocket客户端的消息
        let mut recv_task = {
            let state = state.clone();
            tokio::spawn(async move {
                while let Some(Ok(message)) = incoming.next().await {
                    if Self::handle_incoming(message, &state, user_id, &cmd_tx)
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                tracing::debug!("WebSocket接收任务结束");
            })
        };

        // 任意一个任务结束即视为连接断开
        tokio::select! {
            _ = &mut send_task => recv_task.abort(),
            _ = &mut recv_task => send_task.abort(),
        }

        if !state.registry.deregister(user_id, connection_id).await {
            tracing::debug!(user_id = %user_id, "连接已被替换，保留较新的在线登记");
        }
        tracing::info!(user_id = %user_id, "WebSocket连接已断开");
    }

    /// 处理来自客户端的消息
    ///
    /// 返回 `Err` 表示应当结束读取循环。
    async fn handle_incoming(
        message: WsMessage,
        state: &AppState,
        user_id: UserId,
        cmd_tx: &mpsc::Sender<WsCommand>,
    ) -> Result<(), ()> {
        match message {
            WsMessage::Close(_) => {
                tracing::info!("WebSocket收到关闭消息");
                return Err(());
            }
            WsMessage::Ping(data) => {
                if cmd_tx
                    .send(WsCommand::SendPong(data.to_vec()))
                    .await
                    .is_err()
                {
                    tracing::warn!("Failed to send pong command");
                    return Err(());
                }
            }
            WsMessage::Pong(_) | WsMessage::Binary(_) => {}
            WsMessage::Text(text) => match serde_json::from_str::<ClientFrame>(text.as_str()) {
                Ok(ClientFrame::Typing { match_id }) => {
                    if let Err(err) = state
                        .message_service
                        .signal_typing(match_id, Uuid::from(user_id))
                        .await
                    {
                        tracing::warn!(user_id = %user_id, match_id = %match_id, error = %err, "转发输入状态失败");
                    }
                }
                Err(err) => {
                    tracing::debug!(user_id = %user_id, error = %err, "忽略无法识别的客户端消息");
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_frame_parses_match_id() {
        let match_id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"typing","matchId":"{match_id}"}}"#);
        match serde_json::from_str::<ClientFrame>(&raw) {
            Ok(ClientFrame::Typing { match_id: parsed }) => assert_eq!(parsed, match_id),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"wave"}"#).is_err());
    }
}
