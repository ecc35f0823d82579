use super::{NotificationEvent, Notifier};
use aidfund_persistence::OutboxStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Logs notifications instead of delivering them.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(
        &self,
        user_id: &str,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        info!(user = user_id, event = %event, %payload, "Notification");
        Ok(())
    }
}

/// Queues notifications in the JSONL outbox for a delivery worker.
pub struct OutboxNotifier {
    outbox: Arc<OutboxStore>,
}

impl OutboxNotifier {
    pub fn new(outbox: Arc<OutboxStore>) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    async fn notify(
        &self,
        user_id: &str,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        let outbox = Arc::clone(&self.outbox);
        let user_id = user_id.to_string();
        let record = tokio::task::spawn_blocking(move || {
            outbox.append(&user_id, event.as_ref(), payload)
        })
        .await??;
        info!(id = %record.id, event = %event, "Notification queued");
        Ok(())
    }
}
