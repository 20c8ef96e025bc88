pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;
pub mod state;

pub use shared::config::AppConfig;
pub use shared::error::{AppError, Result};
pub use state::AppState;

/// RUST_LOG が無ければ `fieldsync=debug,info`。二度目以降の呼び出しは何もしない
pub fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldsync=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
