//! Bus messages and the SenML records they carry.

use super::value::Value;
use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One SenML sample. Exactly one of the five value fields is expected to
/// be populated; the rest is `value_of`'s job to collapse.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SenmlRecord {
    #[serde(default, rename = "bn")]
    pub base_name: String,
    #[serde(default, rename = "bt")]
    pub base_time: f64,
    #[serde(default, rename = "t")]
    pub time: f64,
    #[serde(default, rename = "v")]
    pub value: Option<f64>,
    #[serde(default, rename = "vs")]
    pub string_value: Option<String>,
    #[serde(default, rename = "vd")]
    pub data_value: Option<String>,
    #[serde(default, rename = "vb")]
    pub bool_value: Option<bool>,
    #[serde(default, rename = "s")]
    pub sum: Option<f64>,
}

impl SenmlRecord {
    /// First non-empty of `Value`, `StringValue`, `DataValue`, `BoolValue`,
    /// `Sum`; `Nil` if all are empty.
    pub fn value(&self) -> Value {
        if let Some(v) = self.value {
            return Value::from(v);
        }
        if let Some(s) = &self.string_value {
            return Value::String(s.clone());
        }
        if let Some(d) = &self.data_value {
            return Value::Bytes(d.clone().into_bytes());
        }
        if let Some(b) = self.bool_value {
            return Value::Boolean(b);
        }
        if let Some(s) = self.sum {
            return Value::from(s);
        }
        Value::Nil
    }

    /// `(BaseTime + Time) * 1e9`, as nanoseconds since the Unix epoch.
    pub fn timestamp_ns(&self) -> i64 {
        ((self.base_time + self.time) * 1_000_000_000.0) as i64
    }
}

/// A telemetry message delivered by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusMessage {
    pub channel: String,
    pub subtopic: String,
    pub publisher: String,
    /// Raw SenML array; parsed lazily by the evaluator so a malformed
    /// payload surfaces as a per-evaluation error, not a dispatch error.
    pub payload: JsonValue,
}

impl BusMessage {
    pub fn records(&self) -> Result<Vec<SenmlRecord>, Error> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| Error::Malformed(format!("invalid SenML payload: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_of_prefers_value_over_others() {
        let record = SenmlRecord {
            value: Some(1.0),
            string_value: Some("ignored".to_string()),
            ..Default::default()
        };
        assert_eq!(record.value(), Value::from(1.0));
    }

    #[test]
    fn value_of_falls_back_to_string() {
        let record = SenmlRecord {
            string_value: Some("hot".to_string()),
            ..Default::default()
        };
        assert_eq!(record.value(), Value::String("hot".to_string()));
    }

    #[test]
    fn value_of_nil_when_all_empty() {
        assert_eq!(SenmlRecord::default().value(), Value::Nil);
    }

    #[test]
    fn timestamp_combines_base_time_and_time() {
        let record = SenmlRecord {
            base_time: 1700000000.0,
            time: 0.0,
            ..Default::default()
        };
        assert_eq!(record.timestamp_ns(), 1_700_000_000_000_000_000);
    }

    #[test]
    fn records_parses_json_array() {
        let message = BusMessage {
            channel: "a".to_string(),
            subtopic: "x".to_string(),
            publisher: "pub".to_string(),
            payload: serde_json::json!([{"bn": "t", "bt": 0, "t": 0, "v": 1.0}]),
        };
        let records = message.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].base_name, "t");
    }

    #[test]
    fn records_rejects_malformed_payload() {
        let message = BusMessage {
            channel: "a".to_string(),
            subtopic: "x".to_string(),
            publisher: "pub".to_string(),
            payload: serde_json::json!({"not": "an array"}),
        };
        assert!(message.records().is_err());
    }
}
