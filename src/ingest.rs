use anyhow::Result;
use serde_json::json;

use crate::config::Settings;
use crate::connection::FeedSession;
use crate::detector;
use crate::logging;
use crate::notifier::{HttpNotifier, IncidentReport, IncidentSink};
use crate::store::{StoreError, TickStore};
use crate::tick::Tick;

/// Ingestion coordinator: persists each raw feed message, runs the gap
/// check over the stored history, and raises at most one incident per
/// process run.
pub struct Ingestor<N: IncidentSink> {
    store: TickStore,
    notifier: N,
    metric_field: String,
    gap_threshold_secs: f64,
    incident_sent: bool,
}

impl<N: IncidentSink> Ingestor<N> {
    pub fn new(store: TickStore, notifier: N, metric_field: String, gap_threshold_secs: f64) -> Self {
        Self {
            store,
            notifier,
            metric_field,
            gap_threshold_secs,
            incident_sent: false,
        }
    }

    pub fn incident_sent(&self) -> bool {
        self.incident_sent
    }

    pub fn store(&self) -> &TickStore {
        &self.store
    }

    /// Handles one raw message off the socket. Malformed payloads are
    /// logged and dropped; a failed append is fatal and propagates so the
    /// process can exit for a supervised restart.
    pub async fn on_tick(&mut self, raw: &str) -> Result<(), StoreError> {
        let tick = match Tick::from_json(raw, &self.metric_field) {
            Ok(tick) => tick,
            Err(err) => {
                logging::warn(
                    "ingest.parse_failed",
                    "Dropping malformed feed message",
                    json!({ "error": err.to_string() }),
                );
                return Ok(());
            }
        };

        self.store.append(&tick)?;

        let gaps = self.store.find_gaps(self.gap_threshold_secs)?;
        if !gaps.is_empty() && !self.incident_sent {
            logging::warn(
                "ingest.gap_detected",
                "Gap detected in recorded tick history",
                json!({ "gap_count": gaps.len(), "threshold_secs": self.gap_threshold_secs }),
            );
            let report = IncidentReport {
                message: "Gaps in data".to_string(),
                description: detector::describe(&gaps),
            };
            if let Err(err) = self.notifier.notify(&report).await {
                logging::error(
                    "incident.send_failed",
                    "Incident delivery failed",
                    json!({ "error": err.to_string() }),
                );
            }
            // Set regardless of delivery outcome: at most one incident per run.
            self.incident_sent = true;
        }
        Ok(())
    }
}

pub async fn run() -> Result<()> {
    let settings = Settings::from_env()?;
    let store = TickStore::open(&settings.db_path)?;
    let notifier = HttpNotifier::new(settings.incident.clone());
    let ingestor = Ingestor::new(
        store,
        notifier,
        settings.feed.metrics.clone(),
        settings.gap_threshold_secs,
    );

    logging::info(
        "agent.start",
        "Starting feed sentinel",
        json!({
            "db": settings.db_path.display().to_string(),
            "assets": settings.feed.assets,
            "metric": settings.feed.metrics,
            "threshold_secs": settings.gap_threshold_secs,
        }),
    );

    FeedSession::new(settings.feed, ingestor).run().await
}
