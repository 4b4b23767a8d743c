pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod listing;
pub mod reading;
pub mod state;
pub mod storage;

use tracing_subscriber::{EnvFilter, filter::LevelFilter, fmt::time::ChronoLocal};

use config::AppConfig;
use state::AppState;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(log_filter(
            &std::env::var("BLOG_API_LOG").unwrap_or_default(),
        ))
        .init();
}

/// 未设置 `BLOG_API_LOG` 时默认输出 INFO 及以上
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .parse_lossy(directives)
}

pub async fn run() -> error::Result<()> {
    init_tracing();

    let config = AppConfig::load()?;
    let pool = storage::init_db(&config).await?;

    if let Some(file) = config.migrations_file.as_deref() {
        storage::migrate(&pool, file).await?;
        tracing::info!(file, "migrations applied");
    }

    api::run_server(AppState::new(pool), &config.bind_addr).await
}
