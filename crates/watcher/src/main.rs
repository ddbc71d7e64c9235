//! Command-line dashboard watcher.
//!
//! Subscribes to a user's job list and logs sync events until Ctrl-C.
//! Pass a CSV path as the first argument to upload and start a job
//! before watching it run.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_gateway::GatewayClient;
use tally_sync::{DashboardSession, SyncConfig, SyncEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally_watcher=info,tally_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let api_url =
        std::env::var("TALLY_API_URL").unwrap_or_else(|_| "http://localhost:8000".into());
    let ws_url = std::env::var("TALLY_WS_URL").unwrap_or_else(|_| "ws://localhost:8000".into());
    let user_id: i64 = std::env::var("TALLY_USER_ID")
        .unwrap_or_else(|_| "1".into())
        .parse()
        .context("TALLY_USER_ID must be an integer")?;

    let client = Arc::new(GatewayClient::new(api_url));

    if let Some(path) = std::env::args().nth(1) {
        let contents = std::fs::read(&path).with_context(|| format!("Failed to read {path}"))?;
        let file_name = std::path::Path::new(&path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("upload.csv");
        let job_id = client.upload_csv(user_id, file_name, contents).await?;
        client.start_job(job_id).await?;
        tracing::info!(job_id, %path, "Uploaded and started");
    }

    let session =
        DashboardSession::subscribe(client.clone(), ws_url, user_id, SyncConfig::from_env()).await;
    let mut events = session.subscribe_events();

    tracing::info!(user_id, "Watching; Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(SyncEvent::JobUpdated { job_id }) => {
                    if let Some(job) = session.jobs().iter().find(|job| job.id == job_id) {
                        tracing::info!(
                            job_id,
                            status = %job.status,
                            percent = job.progress_percent,
                            processed = job.processed_records,
                            total = job.total_records,
                            "Job progress",
                        );
                    }
                }
                Ok(SyncEvent::SnapshotApplied { job_count }) => {
                    tracing::info!(job_count, "Snapshot applied");
                }
                Ok(SyncEvent::ConnectionOpened { .. }) => {
                    tracing::info!("Realtime channel up");
                }
                Ok(SyncEvent::ConnectionClosed { .. }) => {
                    tracing::warn!("Realtime channel down; polling covers the gap");
                }
                Ok(SyncEvent::PollFailed { error }) => {
                    tracing::warn!(%error, "Poll failed");
                }
                Ok(SyncEvent::DetailFetchFailed { job_id, error }) => {
                    tracing::warn!(job_id, %error, "Detail fetch failed");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    session.unsubscribe().await;
    Ok(())
}
