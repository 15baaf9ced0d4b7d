use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::time;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::constants::{
    RECONNECT_BASE_DELAY_SECS, RECONNECT_MAX_ATTEMPTS, RECONNECT_MAX_DELAY_SECS,
};
use crate::ingest::Ingestor;
use crate::logging;
use crate::notifier::IncidentSink;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to connect to feed: {0}")]
    Connect(#[source] tokio_tungstenite::tungstenite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open,
    Closed,
    Failed,
}

enum SessionEnd {
    ServerGoingAway,
    Lost,
    Interrupted,
}

/// Subscription parameters for the upstream timeseries stream.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub endpoint: String,
    pub api_key: String,
    pub assets: String,
    pub frequency: String,
    pub metrics: String,
}

impl FeedConfig {
    pub fn request_url(&self) -> String {
        format!(
            "{}?api_key={}&assets={}&frequency={}&metrics={}",
            self.endpoint, self.api_key, self.assets, self.frequency, self.metrics
        )
    }
}

/// Wait before reconnection attempt `attempt_index + 1`, exponential from
/// the base delay and capped at the maximum.
pub fn backoff_delay(attempt_index: u32) -> Duration {
    let raw = RECONNECT_BASE_DELAY_SECS.saturating_mul(1u64 << attempt_index.min(62));
    Duration::from_secs(raw.min(RECONNECT_MAX_DELAY_SECS))
}

/// The attempt plan for one run of the reconnection protocol: each entry is
/// the attempt number and the wait served before it.
pub fn backoff_schedule() -> impl Iterator<Item = (u32, Duration)> {
    (1..=RECONNECT_MAX_ATTEMPTS).map(|attempt| (attempt, backoff_delay(attempt - 1)))
}

/// Only a server-initiated "going away" close (code 1001) is an invitation
/// to reconnect; every other close ends the session for good.
pub fn close_requires_reconnect(frame: Option<&CloseFrame<'_>>) -> bool {
    match frame {
        Some(frame) => {
            frame.code == CloseCode::Away
                && frame.reason.to_ascii_lowercase().contains("going away")
        }
        None => false,
    }
}

/// Owns the socket lifecycle for one logical feed session: connect, pump
/// messages into the ingestor, and run the bounded reconnection protocol
/// when the server announces it is going away.
pub struct FeedSession<N: IncidentSink> {
    feed: FeedConfig,
    ingestor: Ingestor<N>,
    state: SessionState,
}

impl<N: IncidentSink> FeedSession<N> {
    pub fn new(feed: FeedConfig, ingestor: Ingestor<N>) -> Self {
        Self {
            feed,
            ingestor,
            state: SessionState::Connecting,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn run(mut self) -> Result<()> {
        let mut sigint =
            signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;

        let mut stream = match self.connect().await {
            Ok(stream) => stream,
            Err(err) => {
                self.state = SessionState::Failed;
                return Err(err).context("initial feed connection failed");
            }
        };

        loop {
            match self.drive(&mut stream, &mut sigint).await? {
                SessionEnd::ServerGoingAway => {
                    self.state = SessionState::Closed;
                    match self.reconnect().await {
                        Some(next) => stream = next,
                        None => anyhow::bail!(
                            "gave up after {RECONNECT_MAX_ATTEMPTS} reconnection attempts"
                        ),
                    }
                }
                SessionEnd::Lost => {
                    self.state = SessionState::Failed;
                    logging::warn_simple("feed.session_end", "Feed session ended");
                    return Ok(());
                }
                SessionEnd::Interrupted => {
                    self.state = SessionState::Closed;
                    logging::info_simple("feed.session_end", "Feed session stopped by interrupt");
                    return Ok(());
                }
            }
        }
    }

    async fn connect(&mut self) -> Result<WsStream, FeedError> {
        self.state = SessionState::Connecting;
        let url = self.feed.request_url();
        let (stream, response) = connect_async(url).await.map_err(FeedError::Connect)?;
        logging::info(
            "feed.connected",
            "WebSocket handshake complete",
            json!({ "status": response.status().as_u16() }),
        );
        Ok(stream)
    }

    async fn drive(&mut self, stream: &mut WsStream, sigint: &mut Signal) -> Result<SessionEnd> {
        self.state = SessionState::Open;
        logging::info(
            "feed.open",
            "Connection is open",
            json!({ "assets": self.feed.assets, "metric": self.feed.metrics }),
        );

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    logging::warn_simple("signal.received", "SIGINT received, stopping feed session");
                    return Ok(SessionEnd::Interrupted);
                }
                next = stream.next() => match next {
                    Some(Ok(Message::Text(raw))) => {
                        self.ingestor
                            .on_tick(&raw)
                            .await
                            .context("tick ingestion failed")?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match &frame {
                            Some(frame) => (u16::from(frame.code), frame.reason.to_string()),
                            None => (0, String::new()),
                        };
                        logging::warn(
                            "feed.close",
                            "Connection closed by server",
                            json!({ "code": code, "reason": reason }),
                        );
                        if close_requires_reconnect(frame.as_ref()) {
                            return Ok(SessionEnd::ServerGoingAway);
                        }
                        return Ok(SessionEnd::Lost);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        logging::error(
                            "feed.socket_error",
                            "Feed socket error",
                            json!({ "error": err.to_string() }),
                        );
                        return Ok(SessionEnd::Lost);
                    }
                    None => {
                        logging::warn_simple("feed.eof", "Feed stream ended without close frame");
                        return Ok(SessionEnd::Lost);
                    }
                }
            }
        }
    }

    /// Bounded retry loop: wait, attempt, observe. A successful handshake
    /// means the socket reports itself connected and streaming resumes; a
    /// later eligible close starts a fresh protocol.
    async fn reconnect(&mut self) -> Option<WsStream> {
        logging::info_simple("feed.reconnect", "Reconnection advised by the server");

        for (attempt, wait) in backoff_schedule() {
            logging::info(
                "feed.reconnect_wait",
                "Waiting before reconnection attempt",
                json!({ "attempt": attempt, "wait_secs": wait.as_secs() }),
            );
            time::sleep(wait).await;

            match self.connect().await {
                Ok(stream) => {
                    logging::info(
                        "feed.reconnected",
                        "Reconnected to feed",
                        json!({ "attempt": attempt }),
                    );
                    return Some(stream);
                }
                Err(err) => logging::warn(
                    "feed.reconnect_failed",
                    "Reconnection attempt failed",
                    json!({ "attempt": attempt, "error": err.to_string() }),
                ),
            }
        }

        self.state = SessionState::Failed;
        logging::error(
            "feed.reconnect_giveup",
            "Failed to reconnect to feed",
            json!({ "attempts": RECONNECT_MAX_ATTEMPTS }),
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    use async_trait::async_trait;

    use crate::ingest::Ingestor;
    use crate::notifier::{IncidentReport, IncidentSink, NotifyError};
    use crate::store::TickStore;

    struct NullSink;

    #[async_trait]
    impl IncidentSink for NullSink {
        async fn notify(&self, _report: &IncidentReport) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    fn session_for(endpoint: &str) -> FeedSession<NullSink> {
        let feed = FeedConfig {
            endpoint: endpoint.to_string(),
            api_key: "secret".to_string(),
            assets: "btc".to_string(),
            frequency: "1s".to_string(),
            metrics: "ReferenceRateUSD".to_string(),
        };
        let store = TickStore::open_in_memory().expect("open store");
        let ingestor = Ingestor::new(store, NullSink, "ReferenceRateUSD".to_string(), 2.0);
        FeedSession::new(feed, ingestor)
    }

    #[test]
    fn backoff_doubles_and_caps_at_max() {
        let waits: Vec<u64> = (0..6).map(|a| backoff_delay(a).as_secs()).collect();
        assert_eq!(waits, vec![1, 2, 4, 8, 16, 32]);
        assert_eq!(backoff_delay(10).as_secs(), 32);
    }

    #[test]
    fn reconnect_schedule_is_bounded_with_doubling_waits() {
        let schedule: Vec<(u32, u64)> = backoff_schedule()
            .map(|(attempt, wait)| (attempt, wait.as_secs()))
            .collect();
        assert_eq!(schedule, vec![(1, 1), (2, 2), (3, 4), (4, 8), (5, 16)]);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_reconnect_fails_the_session() {
        // Nothing listens on the discard port, so every attempt is refused.
        let mut session = session_for("ws://127.0.0.1:9");
        assert_eq!(session.state(), SessionState::Connecting);

        assert!(session.reconnect().await.is_none());
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn going_away_close_triggers_reconnect() {
        let frame = CloseFrame {
            code: CloseCode::Away,
            reason: Cow::Borrowed("Server is going away"),
        };
        assert!(close_requires_reconnect(Some(&frame)));
    }

    #[test]
    fn other_closes_do_not_trigger_reconnect() {
        let wrong_code = CloseFrame {
            code: CloseCode::Normal,
            reason: Cow::Borrowed("Server is going away"),
        };
        let wrong_reason = CloseFrame {
            code: CloseCode::Away,
            reason: Cow::Borrowed("maintenance window"),
        };
        assert!(!close_requires_reconnect(Some(&wrong_code)));
        assert!(!close_requires_reconnect(Some(&wrong_reason)));
        assert!(!close_requires_reconnect(None));
    }

    #[test]
    fn request_url_carries_subscription_parameters() {
        let feed = FeedConfig {
            endpoint: "wss://feed.example.com/stream".to_string(),
            api_key: "secret".to_string(),
            assets: "btc".to_string(),
            frequency: "1s".to_string(),
            metrics: "ReferenceRateUSD".to_string(),
        };
        let url = feed.request_url();
        assert!(url.starts_with("wss://feed.example.com/stream?"));
        for param in [
            "api_key=secret",
            "assets=btc",
            "frequency=1s",
            "metrics=ReferenceRateUSD",
        ] {
            assert!(url.contains(param), "missing {param} in {url}");
        }
    }
}
