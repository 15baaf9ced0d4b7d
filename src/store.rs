use std::path::Path;

use rusqlite::{params, Connection};
use thiserror::Error;

use crate::tick::{parse_feed_time, Tick};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open tick database: {0}")]
    OpenFailed(#[source] rusqlite::Error),
    #[error("failed to append tick: {0}")]
    WriteFailed(#[source] rusqlite::Error),
    #[error("tick query failed: {0}")]
    QueryFailed(#[source] rusqlite::Error),
}

/// One detected gap between time-adjacent ticks. `row_index` is the 1-based
/// position of the later tick when the store is ordered by time ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct GapRecord {
    pub row_index: u64,
    pub curr_time: String,
    pub prev_time: String,
    pub gap_seconds: f64,
}

/// Append-only durable log of received ticks. Single writer, synchronous
/// commits; the connection is never shared across threads.
pub struct TickStore {
    conn: Connection,
}

impl TickStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(StoreError::OpenFailed)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(StoreError::OpenFailed)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ticks (
                time TEXT,
                asset TEXT,
                metric_value TEXT,
                sequence_id TEXT
            )",
            [],
        )
        .map_err(StoreError::OpenFailed)?;
        Ok(Self { conn })
    }

    pub fn append(&self, tick: &Tick) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO ticks (time, asset, metric_value, sequence_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![tick.time, tick.asset, tick.value, tick.sequence_id],
            )
            .map_err(StoreError::WriteFailed)?;
        Ok(())
    }

    /// Scans the full history ordered by time ascending and returns every
    /// consecutive pair whose delta exceeds the threshold.
    pub fn find_gaps(&self, threshold_seconds: f64) -> Result<Vec<GapRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT time FROM ticks ORDER BY time ASC")
            .map_err(StoreError::QueryFailed)?;
        let times = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(StoreError::QueryFailed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StoreError::QueryFailed)?;

        let mut gaps = Vec::new();
        for (idx, pair) in times.windows(2).enumerate() {
            // A row whose stamp does not parse cannot anchor a gap on either
            // side; the pair is skipped rather than failing the whole scan.
            let (Some(prev), Some(curr)) = (parse_feed_time(&pair[0]), parse_feed_time(&pair[1]))
            else {
                continue;
            };
            let gap_seconds = (curr - prev).num_milliseconds() as f64 / 1_000.0;
            if gap_seconds > threshold_seconds {
                gaps.push(GapRecord {
                    row_index: (idx + 2) as u64,
                    curr_time: pair[1].clone(),
                    prev_time: pair[0].clone(),
                    gap_seconds,
                });
            }
        }
        Ok(gaps)
    }

    pub fn tick_count(&self) -> Result<u64, StoreError> {
        self.conn
            .query_row("SELECT COUNT(*) FROM ticks", [], |row| row.get(0))
            .map_err(StoreError::QueryFailed)
    }
}
