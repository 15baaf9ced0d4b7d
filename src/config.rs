use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::connection::FeedConfig;
use crate::constants::{
    DEFAULT_ASSETS, DEFAULT_DB_PATH, DEFAULT_FREQUENCY, DEFAULT_GAP_THRESHOLD_SECS,
    DEFAULT_METRIC, FEED_ENDPOINT, INCIDENT_ENDPOINT,
};
use crate::notifier::IncidentConfig;

/// Process configuration, read once at startup from the environment
/// (with `.env` support). Credentials are mandatory; everything else has
/// a sensible default.
#[derive(Debug, Clone)]
pub struct Settings {
    pub feed: FeedConfig,
    pub incident: IncidentConfig,
    pub db_path: PathBuf,
    pub gap_threshold_secs: f64,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let gap_threshold_secs = match env::var("SENTINEL_GAP_THRESHOLD_SECS") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("invalid SENTINEL_GAP_THRESHOLD_SECS `{raw}`"))?,
            Err(_) => DEFAULT_GAP_THRESHOLD_SECS,
        };

        Ok(Self {
            feed: FeedConfig {
                endpoint: env_or("SENTINEL_FEED_ENDPOINT", FEED_ENDPOINT),
                api_key: require("COINMETRICS_API_KEY")?,
                assets: env_or("SENTINEL_ASSETS", DEFAULT_ASSETS),
                frequency: env_or("SENTINEL_FREQUENCY", DEFAULT_FREQUENCY),
                metrics: env_or("SENTINEL_METRIC", DEFAULT_METRIC),
            },
            incident: IncidentConfig {
                endpoint: env_or("SENTINEL_INCIDENT_ENDPOINT", INCIDENT_ENDPOINT),
                token: require("BETTERSTACK_API_KEY")?,
                incident_name: require("BETTERSTACK_INCIDENT_NAME")?,
                requester_email: require("BETTERSTACK_INCIDENT_REQUESTER_EMAIL")?,
            },
            db_path: PathBuf::from(env_or("SENTINEL_DB_PATH", DEFAULT_DB_PATH)),
            gap_threshold_secs,
        })
    }
}

fn require(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("missing required environment variable {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
