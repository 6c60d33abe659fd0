#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use application::{
    Clock, MemoryStore, MessageService, MessageServiceDependencies, NotificationBridge,
    PresenceRegistry, ProximityService, ProximityServiceDependencies, RequestTimeout,
    SwipeService, SwipeServiceDependencies, SystemClock,
};
use domain::{GeoPoint, User, UserId};
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::Value;
use tokio::{net::TcpListener, net::TcpStream, sync::oneshot, time::sleep};
use tokio_tungstenite::{
    connect_async, tungstenite::Message as TungsteniteMessage, MaybeTlsStream, WebSocketStream,
};
use uuid::Uuid;
use web_api::{router, AppState, JwtConfig, JwtService};

pub type TestSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// 基于内存存储启动的完整 HTTP / WebSocket 服务
pub struct TestServer {
    pub base_http: String,
    pub base_ws: String,
    pub store: Arc<MemoryStore>,
    pub client: Client,
    jwt_service: Arc<JwtService>,
    clock: Arc<SystemClock>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(PresenceRegistry::new());
        let clock = Arc::new(SystemClock::default());
        let timeout = RequestTimeout::new(Duration::from_secs(5));

        let swipe_service = SwipeService::new(SwipeServiceDependencies {
            user_repository: store.clone(),
            swipe_repository: store.clone(),
            match_repository: store.clone(),
            notifier: NotificationBridge::new(registry.clone()),
            clock: clock.clone(),
            timeout,
        });
        let proximity_service = ProximityService::new(ProximityServiceDependencies {
            user_repository: store.clone(),
            swipe_repository: store.clone(),
            seen_repository: store.clone(),
            crossed_path_repository: store.clone(),
            clock: clock.clone(),
            timeout,
        });
        let message_service = MessageService::new(MessageServiceDependencies {
            match_repository: store.clone(),
            message_repository: store.clone(),
            notifier: NotificationBridge::new(registry.clone()),
            clock: clock.clone(),
            timeout,
        });

        let jwt_service = Arc::new(JwtService::new(JwtConfig {
            secret: "integration-test-secret-key-32-chars-min".to_string(),
            expiration_hours: 1,
        }));

        let state = AppState::new(
            Arc::new(swipe_service),
            Arc::new(proximity_service),
            Arc::new(message_service),
            registry,
            jwt_service.clone(),
            16,
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(state);

        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        // allow server to start
        sleep(Duration::from_millis(50)).await;

        Self {
            base_http: format!("http://{}", addr),
            base_ws: format!("ws://{}", addr),
            store,
            client: Client::new(),
            jwt_service,
            clock,
            shutdown: Some(shutdown_tx),
        }
    }

    /// 写入一个种子用户，`location` 为 `(lng, lat)`
    pub async fn add_user(&self, name: &str, gender: &str, location: Option<(f64, f64)>) -> Uuid {
        let id = Uuid::new_v4();
        let mut user = User::new(UserId::from(id), name, gender, self.clock.now());
        user.email = format!("{name}@example.com");
        if let Some((lng, lat)) = location {
            user = user.located_at(GeoPoint::new(lng, lat).expect("valid coordinates"));
        }
        self.store.insert_user(user).await;
        id
    }

    pub fn token(&self, user: Uuid) -> String {
        self.jwt_service.generate_token(user).expect("token")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_http, path)
    }

    pub async fn get(&self, user: Uuid, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(self.token(user))
            .send()
            .await
            .expect("get request")
    }

    pub async fn post(&self, user: Uuid, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(self.token(user))
            .json(&body)
            .send()
            .await
            .expect("post request")
    }

    pub async fn online_users(&self) -> u64 {
        let health: Value = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .expect("health request")
            .json()
            .await
            .expect("health json");
        health["onlineUsers"].as_u64().expect("onlineUsers")
    }

    /// WebSocket 握手完成后登记是异步的，轮询直到在线人数达到预期
    pub async fn wait_online(&self, expected: u64) {
        for _ in 0..50 {
            if self.online_users().await == expected {
                return;
            }
            sleep(Duration::from_millis(20)).await;
        }
        panic!("online user count never reached {expected}");
    }

    pub async fn connect(&self, user: Uuid) -> TestSocket {
        let url = format!("{}/ws?token={}", self.base_ws, self.token(user));
        let (socket, _) = connect_async(url).await.expect("websocket connect");
        socket
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// 读取下一条文本帧并解析为 JSON
pub async fn next_json(socket: &mut TestSocket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("timed out waiting for websocket frame")
            .expect("websocket closed")
            .expect("websocket error");
        if let TungsteniteMessage::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("json frame");
        }
    }
}

/// 断言短时间内没有收到任何文本帧
pub async fn assert_silent(socket: &mut TestSocket) {
    let waited = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    if let Ok(Some(Ok(TungsteniteMessage::Text(text)))) = waited {
        panic!("unexpected websocket frame: {text}");
    }
}
