//! Lead hand-off targets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::model::LeadPayload;
use crate::error::HandoffError;
use crate::leads::model::Lead;
use crate::store::Database;

/// Receives completed leads from the chat.
///
/// One call per completed conversation; implementations must not retry.
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn submit(&self, payload: &LeadPayload) -> Result<(), HandoffError>;
}

/// Writes leads straight into the site database.
pub struct StoreLeadSink {
    db: Arc<dyn Database>,
}

impl StoreLeadSink {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LeadSink for StoreLeadSink {
    async fn submit(&self, payload: &LeadPayload) -> Result<(), HandoffError> {
        let lead = Lead::from_payload(payload.clone());
        self.db.insert_lead(&lead).await?;
        info!(lead_id = %lead.id, "Chat lead stored");
        Ok(())
    }
}

/// POSTs leads as JSON to a lead intake endpoint.
pub struct HttpLeadSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLeadSink {
    /// Request timeout for a single hand-off.
    const TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(endpoint: impl Into<String>) -> Result<Self, HandoffError> {
        let client = reqwest::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .map_err(|e| HandoffError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl LeadSink for HttpLeadSink {
    async fn submit(&self, payload: &LeadPayload) -> Result<(), HandoffError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| HandoffError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HandoffError::Status(status.as_u16()));
        }
        debug!(endpoint = %self.endpoint, "Lead posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LibSqlBackend;

    #[tokio::test]
    async fn store_sink_persists_lead() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let sink = StoreLeadSink::new(Arc::clone(&db));

        let payload = LeadPayload {
            name: "Alex".into(),
            email: "alex@example.com".into(),
            service_interest: "UI/UX Design".into(),
            ..Default::default()
        };
        sink.submit(&payload).await.unwrap();

        let leads = db.list_leads(10).await.unwrap();
        assert_eq!(leads.len(), 1);
        assert_eq!(leads[0].name, "Alex");
        assert_eq!(leads[0].service_interest, "UI/UX Design");
    }

    #[tokio::test]
    async fn http_sink_reports_unreachable_endpoint() {
        // Port 9 (discard) on localhost is not expected to accept connections.
        let sink = HttpLeadSink::new("http://127.0.0.1:9/api/leads").unwrap();
        let err = sink.submit(&LeadPayload::default()).await.unwrap_err();
        assert!(matches!(err, HandoffError::Transport(_)));
    }
}
