//! 主应用程序入口
//!
//! 加载配置、装配存储与用例服务，启动 Axum Web API 服务。

use std::{env, sync::Arc, time::Duration};

use application::{
    Clock, CrossedPathRepository, MatchRepository, MemoryStore, MessageRepository,
    MessageService, MessageServiceDependencies, NotificationBridge, PresenceRegistry,
    ProximityService, ProximityServiceDependencies, RequestTimeout, SeenRepository,
    SwipeRepository, SwipeService, SwipeServiceDependencies, SystemClock, UserRepository,
};
use config::{AppConfig, StoreBackend};
use infrastructure::{Infrastructure, InfrastructureConfig};
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState, JwtService};

/// 服务层依赖的全部仓储句柄
struct Repositories {
    users: Arc<dyn UserRepository>,
    swipes: Arc<dyn SwipeRepository>,
    matches: Arc<dyn MatchRepository>,
    seen: Arc<dyn SeenRepository>,
    crossed_paths: Arc<dyn CrossedPathRepository>,
    messages: Arc<dyn MessageRepository>,
}

impl Repositories {
    fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            users: store.clone(),
            swipes: store.clone(),
            matches: store.clone(),
            seen: store.clone(),
            crossed_paths: store.clone(),
            messages: store,
        }
    }

    async fn postgres(config: &AppConfig) -> anyhow::Result<Self> {
        let infrastructure = Infrastructure::connect(InfrastructureConfig {
            database_url: config.database.url.clone(),
            max_connections: config.database.max_connections,
            run_migrations: config.store.run_migrations,
        })
        .await?;

        Ok(Self {
            users: infrastructure.user_repository(),
            swipes: infrastructure.swipe_repository(),
            matches: infrastructure.match_repository(),
            seen: infrastructure.seen_repository(),
            crossed_paths: infrastructure.crossed_path_repository(),
            messages: infrastructure.message_repository(),
        })
    }
}

/// 配置来源：`APP_CONFIG_FILE` 指定的文件优先，其次是环境变量
fn load_config() -> anyhow::Result<AppConfig> {
    let production = env::var("APP_ENV").is_ok_and(|value| value == "production");

    let config = match env::var("APP_CONFIG_FILE") {
        Ok(path) => AppConfig::load(path)?,
        Err(_) if production => AppConfig::from_env()?,
        Err(_) => AppConfig::from_env_with_defaults(),
    };

    config.validate()?;
    if production {
        config.validate_for_production()?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = load_config()?;

    let repositories = match config.store.backend {
        StoreBackend::Postgres => {
            tracing::info!(
                "连接数据库: {}",
                config.database.url.split('@').next_back().unwrap_or("unknown")
            );
            Repositories::postgres(&config).await?
        }
        StoreBackend::Memory => {
            tracing::warn!("使用内存存储，数据不会持久化");
            Repositories::in_memory()
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let timeout = RequestTimeout::new(Duration::from_millis(config.engine.request_timeout_ms));
    let registry = Arc::new(PresenceRegistry::new());

    // 创建应用层服务
    let swipe_service = SwipeService::new(SwipeServiceDependencies {
        user_repository: repositories.users.clone(),
        swipe_repository: repositories.swipes.clone(),
        match_repository: repositories.matches.clone(),
        notifier: NotificationBridge::new(registry.clone()),
        clock: clock.clone(),
        timeout,
    });

    let proximity_service = ProximityService::new(ProximityServiceDependencies {
        user_repository: repositories.users,
        swipe_repository: repositories.swipes,
        seen_repository: repositories.seen,
        crossed_path_repository: repositories.crossed_paths,
        clock: clock.clone(),
        timeout,
    });

    let message_service = MessageService::new(MessageServiceDependencies {
        match_repository: repositories.matches,
        message_repository: repositories.messages,
        notifier: NotificationBridge::new(registry.clone()),
        clock,
        timeout,
    });

    let jwt_service = Arc::new(JwtService::new(config.jwt.clone()));

    let state = AppState::new(
        Arc::new(swipe_service),
        Arc::new(proximity_service),
        Arc::new(message_service),
        registry,
        jwt_service,
        config.engine.presence_channel_capacity,
    );

    // 启动 Web 服务器
    let app = router(state);
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("邻近匹配服务启动在 http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
