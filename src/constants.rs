pub const FEED_ENDPOINT: &str = "wss://api.coinmetrics.io/v4/timeseries-stream/asset-metrics";
pub const INCIDENT_ENDPOINT: &str = "https://uptime.betterstack.com/api/v2/incidents";
pub const DEFAULT_DB_PATH: &str = "ticks.db";
pub const DEFAULT_ASSETS: &str = "btc";
pub const DEFAULT_FREQUENCY: &str = "1s";
pub const DEFAULT_METRIC: &str = "ReferenceRateUSD";
pub const DEFAULT_GAP_THRESHOLD_SECS: f64 = 2.0;
pub const RECONNECT_MAX_ATTEMPTS: u32 = 5;
pub const RECONNECT_BASE_DELAY_SECS: u64 = 1;
pub const RECONNECT_MAX_DELAY_SECS: u64 = 32;
