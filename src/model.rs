use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// One element of an OpenTSDB `/api/query` response array.
#[derive(serde::Deserialize, serde::Serialize, Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dps: Option<Map<String, Value>>,
    /// `aggregateTags`, `query`, `annotations` and anything else the server sent.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Row index of the merged table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RowKey {
    Epoch(i64),
    Timestamp(DateTime<Utc>),
}

impl RowKey {
    pub fn epoch_seconds(&self) -> i64 {
        match self {
            RowKey::Epoch(secs) => *secs,
            RowKey::Timestamp(ts) => ts.timestamp(),
        }
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Epoch(secs) => write!(f, "{secs}"),
            RowKey::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

/// Values of one series keyed by row. `None` is an explicit null from the server.
pub type Datapoints = HashMap<RowKey, Option<f64>>;
