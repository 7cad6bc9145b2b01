pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use config::Config;
use db::NoticeStore;
use services::icons::IconStorage;
use services::scheduler::ScheduleCoordinator;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub notices: Arc<dyn NoticeStore>,
    pub scheduler: Arc<ScheduleCoordinator>,
    pub icons: Arc<IconStorage>,
    pub config: Arc<Config>,
}
