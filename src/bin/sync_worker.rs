use anyhow::{Context, Result};
use fieldsync_lib::application::ports::NoAuth;
use fieldsync_lib::infrastructure::http::{HttpSubmissionGateway, HttpUploadGateway};
use fieldsync_lib::{AppConfig, AppState, init_logging};
use std::sync::Arc;
use tracing::info;

/// 端末のストアを開き、Ctrl-C まで同期パスを回し続ける
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = AppConfig::from_env();
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;

    let auth = Arc::new(NoAuth);
    let submissions = Arc::new(
        HttpSubmissionGateway::try_new(&config.api, auth.clone())
            .context("failed to build submission client")?,
    );
    let uploads = Arc::new(
        HttpUploadGateway::try_new(&config.api, auth).context("failed to build upload client")?,
    );

    let state = AppState::new(config, submissions, uploads)
        .await
        .context("failed to open survey store")?;

    let summary = state.sync_queue_service.queue_summary().await?;
    info!(
        pending = summary.pending,
        failed = summary.failed,
        completed = summary.completed,
        "sync worker ready"
    );

    let handle = match state.start_auto_sync() {
        Some(handle) => handle,
        None => {
            // 自動同期が無効なら1パスだけ実行して終了
            let report = state.scheduler.run_once().await?;
            info!(?report, "single sync pass finished");
            state.shutdown().await;
            return Ok(());
        }
    };

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");
    handle.abort();
    state.shutdown().await;
    Ok(())
}
