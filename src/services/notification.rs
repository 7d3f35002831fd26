use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// User-visible alert channel (toast, dialog, local notification...).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, title: &str, body: &str) -> Result<()>;
}

/// Sink that writes alerts to the log. Used by the CLI.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl NotificationSink for TracingNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        info!(target: "alert", title = %title, "🔔 {}", body);
        Ok(())
    }
}

/// Fire-and-forget delivery. Never blocks the caller; failures are logged
/// and dropped. The handle may be awaited to know the alert was handed off.
pub fn dispatch(
    sink: &Arc<dyn NotificationSink>,
    title: &str,
    body: impl Into<String>,
) -> JoinHandle<()> {
    let sink = Arc::clone(sink);
    let title = title.to_string();
    let body = body.into();

    tokio::spawn(async move {
        if let Err(e) = sink.notify(&title, &body).await {
            warn!(
                title = %title,
                error = %e,
                "NotificationFailed: alert could not be delivered"
            );
        }
    })
}
