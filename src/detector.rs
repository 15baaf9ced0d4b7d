use std::fmt::Write;

use crate::store::{GapRecord, StoreError, TickStore};

/// True iff any time-adjacent pair in the stored history exceeds the
/// threshold. Runs the full-history scan on every call; at one tick per
/// second the history stays small enough that the simple form wins.
pub fn detect(store: &TickStore, threshold_seconds: f64) -> Result<bool, StoreError> {
    Ok(!store.find_gaps(threshold_seconds)?.is_empty())
}

/// Renders the gap list into the incident description body.
pub fn describe(gaps: &[GapRecord]) -> String {
    let mut body = String::from("Gaps in data:");
    for gap in gaps {
        let _ = write!(
            body,
            "\n  row {}: {} -> {} ({:.3}s)",
            gap.row_index, gap.prev_time, gap.curr_time, gap.gap_seconds
        );
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tick::Tick;

    fn tick(time: &str, seq: &str) -> Tick {
        Tick {
            time: time.to_string(),
            asset: "btc".to_string(),
            value: "65000.0".to_string(),
            sequence_id: seq.to_string(),
        }
    }

    #[test]
    fn detect_reports_presence_not_position() {
        let store = TickStore::open_in_memory().expect("open");
        store.append(&tick("2024-03-01T00:00:00Z", "1")).expect("append");
        store.append(&tick("2024-03-01T00:00:09Z", "2")).expect("append");
        // The gap sits in the middle of history once a later tick arrives.
        store.append(&tick("2024-03-01T00:00:10Z", "3")).expect("append");

        assert!(detect(&store, 2.0).expect("detect"));
        assert!(!detect(&store, 20.0).expect("detect"));
    }

    #[test]
    fn describe_lists_every_gap() {
        let gaps = vec![
            GapRecord {
                row_index: 4,
                curr_time: "2024-03-01T00:00:05Z".to_string(),
                prev_time: "2024-03-01T00:00:02Z".to_string(),
                gap_seconds: 3.0,
            },
            GapRecord {
                row_index: 9,
                curr_time: "2024-03-01T00:01:00Z".to_string(),
                prev_time: "2024-03-01T00:00:50Z".to_string(),
                gap_seconds: 10.0,
            },
        ];

        let body = describe(&gaps);
        assert!(body.starts_with("Gaps in data:"));
        assert!(body.contains("row 4: 2024-03-01T00:00:02Z -> 2024-03-01T00:00:05Z (3.000s)"));
        assert!(body.contains("row 9"));
    }
}
