use anyhow::Result;
use async_trait::async_trait;
use metrics::counter;

use crate::event::CustomerEvent;

pub mod kafka;

/// Where customer mutation events go. The primary request must never fail
/// because of this collaborator: callers log a send error and move on.
#[async_trait]
pub trait EventSink {
    async fn send(&self, event: CustomerEvent) -> Result<()>;
}

/// Logs events instead of producing them. Selected with PRINT_SINK=true.
pub struct PrintSink {}

#[async_trait]
impl EventSink for PrintSink {
    async fn send(&self, event: CustomerEvent) -> Result<()> {
        tracing::info!("customer event: {:?}", event);
        counter!("customer_api_events_published_total").increment(1);

        Ok(())
    }
}

/// Stands in when no publisher is configured (empty KAFKA_HOSTS):
/// publishing becomes an explicit no-op.
pub struct NoopSink {}

#[async_trait]
impl EventSink for NoopSink {
    async fn send(&self, _event: CustomerEvent) -> Result<()> {
        Ok(())
    }
}
