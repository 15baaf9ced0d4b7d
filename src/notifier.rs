use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::logging;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("incident request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("incident API rejected the report with status {0}")]
    Rejected(u16),
}

/// What the pipeline wants the outside world to know about a gap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentReport {
    pub message: String,
    pub description: String,
}

/// Outbound incident channel. One call per report, no retries; delivery
/// failures are the caller's problem to log, not to recover.
#[async_trait]
pub trait IncidentSink: Send + Sync {
    async fn notify(&self, report: &IncidentReport) -> Result<(), NotifyError>;
}

#[async_trait]
impl<T: IncidentSink + ?Sized> IncidentSink for Arc<T> {
    async fn notify(&self, report: &IncidentReport) -> Result<(), NotifyError> {
        (**self).notify(report).await
    }
}

#[derive(Debug, Clone)]
pub struct IncidentConfig {
    pub endpoint: String,
    pub token: String,
    pub incident_name: String,
    pub requester_email: String,
}

#[derive(Serialize)]
struct IncidentRequest<'a> {
    name: &'a str,
    summary: String,
    requester_email: &'a str,
    description: &'a str,
    email: bool,
}

pub struct HttpNotifier {
    client: reqwest::Client,
    config: IncidentConfig,
}

impl HttpNotifier {
    pub fn new(config: IncidentConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IncidentSink for HttpNotifier {
    async fn notify(&self, report: &IncidentReport) -> Result<(), NotifyError> {
        let body = IncidentRequest {
            name: &report.message,
            summary: format!("FROM: {}", self.config.incident_name),
            requester_email: &self.config.requester_email,
            description: &report.description,
            email: true,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.token)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        logging::info(
            "incident.response",
            "Incident API responded",
            json!({ "status": status.as_u16() }),
        );
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
