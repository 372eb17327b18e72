//! In-memory report sink.
//!
//! Keeps every payload it receives, for tests and dry runs.

use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::ReportSink;
use crate::error::{Error, Result};
use crate::report::WebhookPayload;

/// One received payload
#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub payload: WebhookPayload,
    pub received_at: Instant,
}

/// Sink that records payloads instead of sending them
#[derive(Debug, Default)]
pub struct RecordingSink {
    deliveries: RwLock<Vec<RecordedDelivery>>,
    /// Status to fail every delivery with
    fail_with: Option<u16>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that records each payload, then fails with `status`
    pub fn failing(status: u16) -> Self {
        Self {
            deliveries: RwLock::new(Vec::new()),
            fail_with: Some(status),
        }
    }

    /// All deliveries in arrival order
    pub fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.deliveries.read().clone()
    }

    pub fn payloads(&self) -> Vec<WebhookPayload> {
        self.deliveries
            .read()
            .iter()
            .map(|d| d.payload.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.deliveries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deliveries.read().is_empty()
    }

    pub fn clear(&self) {
        self.deliveries.write().clear();
    }
}

#[async_trait]
impl ReportSink for RecordingSink {
    async fn send(&self, payload: &WebhookPayload) -> Result<()> {
        self.deliveries.write().push(RecordedDelivery {
            payload: payload.clone(),
            received_at: Instant::now(),
        });
        debug!("Recorded payload #{}", self.len());

        match self.fail_with {
            Some(status) => Err(Error::DeliveryStatus { status }),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        "recording sink".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> WebhookPayload {
        WebhookPayload {
            username: "test".to_string(),
            embeds: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_records_in_order() {
        let sink = RecordingSink::new();
        assert!(sink.is_empty());

        sink.send(&payload()).await.unwrap();
        sink.send(&payload()).await.unwrap();

        let deliveries = sink.deliveries();
        assert_eq!(deliveries.len(), 2);
        assert!(deliveries[0].received_at <= deliveries[1].received_at);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_failing_sink_still_records() {
        let sink = RecordingSink::failing(500);
        let result = sink.send(&payload()).await;

        assert!(matches!(result, Err(Error::DeliveryStatus { status: 500 })));
        assert_eq!(sink.len(), 1);
    }
}
