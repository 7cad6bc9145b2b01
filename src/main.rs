use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notices_api::{
    config::Config,
    db::{self, MemoryNoticeStore, NoticeStore, PgNoticeStore},
    routes,
    services::{icons::IconStorage, scheduler::ScheduleCoordinator},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let notices: Arc<dyn NoticeStore> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            db::run_migrations(&pool).await?;
            info!("Database connected and migrations applied");
            Arc::new(PgNoticeStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, notices are kept in memory and lost on restart");
            Arc::new(MemoryNoticeStore::new())
        }
    };

    let scheduler = ScheduleCoordinator::from_config(&config.aws.scheduler());
    if scheduler.is_configured() {
        info!("EventBridge Scheduler configured, push notifications enabled");
    } else {
        warn!(
            "EventBridge Scheduler not configured (missing: {}), notices with a push time cannot be saved",
            scheduler.missing_settings().join(", ")
        );
    }

    let icons = IconStorage::from_config(&config);
    info!("Push notification icons stored in: {}", icons.backend());

    let state = AppState {
        notices,
        scheduler: Arc::new(scheduler),
        icons: Arc::new(icons),
        config: config.clone(),
    };

    let app = routes::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Notices API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
