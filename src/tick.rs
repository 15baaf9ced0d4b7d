use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed feed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("feed payload missing field `{0}`")]
    MissingField(String),
    #[error("unparseable feed timestamp `{0}`")]
    BadTimestamp(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub time: String,
    pub asset: String,
    pub value: String,
    pub sequence_id: String,
}

impl Tick {
    /// Parses one feed message. `metric_field` names the metric column the
    /// subscription requested (e.g. `ReferenceRateUSD`); everything is kept
    /// as text so upstream precision survives storage.
    pub fn from_json(raw: &str, metric_field: &str) -> Result<Self, ParseError> {
        let payload: Value = serde_json::from_str(raw)?;
        let time = extract(&payload, "time")?;
        // A tick that cannot be placed on the timeline would poison every
        // later gap scan once stored, so it is rejected here with the other
        // parse failures.
        if parse_feed_time(&time).is_none() {
            return Err(ParseError::BadTimestamp(time));
        }
        Ok(Self {
            time,
            asset: extract(&payload, "asset")?,
            value: extract(&payload, metric_field)?,
            sequence_id: extract(&payload, "cm_sequence_id")?,
        })
    }
}

/// Feed times are RFC 3339; stamps without a zone designator show up
/// occasionally and are treated as UTC.
pub fn parse_feed_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(stamped) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamped.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn extract(payload: &Value, field: &str) -> Result<String, ParseError> {
    match payload.get(field) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Null) | None => Err(ParseError::MissingField(field.to_string())),
        Some(other) => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_message() {
        let raw = r#"{"time":"2024-03-01T00:00:00.000000000Z","asset":"btc","ReferenceRateUSD":"65000.12","cm_sequence_id":"42"}"#;
        let tick = Tick::from_json(raw, "ReferenceRateUSD").expect("parse tick");
        assert_eq!(tick.asset, "btc");
        assert_eq!(tick.value, "65000.12");
        assert_eq!(tick.sequence_id, "42");
    }

    #[test]
    fn numeric_fields_are_kept_as_text() {
        let raw = r#"{"time":"2024-03-01T00:00:01Z","asset":"btc","ReferenceRateUSD":65000.5,"cm_sequence_id":43}"#;
        let tick = Tick::from_json(raw, "ReferenceRateUSD").expect("parse tick");
        assert_eq!(tick.value, "65000.5");
        assert_eq!(tick.sequence_id, "43");
    }

    #[test]
    fn missing_metric_field_is_rejected() {
        let raw = r#"{"time":"2024-03-01T00:00:00Z","asset":"btc","cm_sequence_id":"1"}"#;
        let err = Tick::from_json(raw, "ReferenceRateUSD").unwrap_err();
        assert!(matches!(err, ParseError::MissingField(field) if field == "ReferenceRateUSD"));
    }

    #[test]
    fn unparseable_time_is_rejected() {
        let raw = r#"{"time":"garbage","asset":"btc","ReferenceRateUSD":"65000.12","cm_sequence_id":"1"}"#;
        let err = Tick::from_json(raw, "ReferenceRateUSD").unwrap_err();
        assert!(matches!(err, ParseError::BadTimestamp(time) if time == "garbage"));
    }

    #[test]
    fn naive_timestamps_are_accepted_as_utc() {
        let raw = r#"{"time":"2024-03-01T00:00:00.5","asset":"btc","ReferenceRateUSD":"65000.12","cm_sequence_id":"1"}"#;
        let tick = Tick::from_json(raw, "ReferenceRateUSD").expect("parse tick");
        assert_eq!(tick.time, "2024-03-01T00:00:00.5");
    }

    #[test]
    fn non_json_payload_is_rejected() {
        let err = Tick::from_json("not json at all", "ReferenceRateUSD").unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }
}
