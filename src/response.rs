use crate::alias::{AliasOutcome, AliasRegistry, AliasRule};
use crate::errors::{self, ErrorKind};
use crate::frame::{Column, ColumnsBuilder, FrameBuilder};
use crate::model::{Datapoints, SeriesRecord};
use arrow::array::RecordBatch;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use tracing::debug;

/// Raw OpenTSDB query output in any of the shapes a caller may hold it.
#[derive(Debug)]
pub enum RawResponse<'a> {
    Text(&'a str),
    OwnedText(String),
    Bytes(&'a [u8]),
    OwnedBytes(Vec<u8>),
    Value(Value),
    Records(Vec<SeriesRecord>),
}

impl<'a> From<&'a str> for RawResponse<'a> {
    fn from(s: &'a str) -> Self {
        RawResponse::Text(s)
    }
}

impl<'a> From<&'a String> for RawResponse<'a> {
    fn from(s: &'a String) -> Self {
        RawResponse::Text(s.as_str())
    }
}

impl From<String> for RawResponse<'_> {
    fn from(s: String) -> Self {
        RawResponse::OwnedText(s)
    }
}

impl<'a> From<&'a [u8]> for RawResponse<'a> {
    fn from(b: &'a [u8]) -> Self {
        RawResponse::Bytes(b)
    }
}

impl From<Vec<u8>> for RawResponse<'_> {
    fn from(b: Vec<u8>) -> Self {
        RawResponse::OwnedBytes(b)
    }
}

impl From<Value> for RawResponse<'_> {
    fn from(v: Value) -> Self {
        RawResponse::Value(v)
    }
}

impl From<Vec<Value>> for RawResponse<'_> {
    fn from(v: Vec<Value>) -> Self {
        RawResponse::Value(Value::Array(v))
    }
}

impl From<Vec<SeriesRecord>> for RawResponse<'_> {
    fn from(v: Vec<SeriesRecord>) -> Self {
        RawResponse::Records(v)
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// How series are turned into table columns.
#[derive(Debug, Clone)]
pub struct FrameOptions {
    pub name_rule: Option<AliasRule>,
    pub convert_time: bool,
    pub registry: AliasRegistry,
}

impl Default for FrameOptions {
    fn default() -> Self {
        FrameOptions {
            name_rule: None,
            convert_time: false,
            registry: AliasRegistry::with_builtins(),
        }
    }
}

impl FrameOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name_rule(mut self, rule: impl Into<AliasRule>) -> Self {
        self.name_rule = Some(rule.into());
        self
    }

    pub fn with_convert_time(mut self, convert_time: bool) -> Self {
        self.convert_time = convert_time;
        self
    }

    pub fn with_registry(mut self, registry: AliasRegistry) -> Self {
        self.registry = registry;
        self
    }
}

/// Name → datapoints, in first-seen order of each name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Columns {
    columns: Vec<Column>,
    positions: HashMap<String, usize>,
    fallbacks: Vec<AliasOutcome>,
}

impl Columns {
    /// Inserts `datapoints` under `name`. An existing column with the same name keeps its
    /// position but its data is replaced; the replaced data is returned.
    pub fn insert(&mut self, name: String, datapoints: Datapoints) -> Option<Datapoints> {
        match self.positions.get(&name) {
            Some(&idx) => Some(std::mem::replace(
                &mut self.columns[idx].datapoints,
                datapoints,
            )),
            None => {
                self.positions.insert(name.clone(), self.columns.len());
                self.columns.push(Column { name, datapoints });
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Datapoints> {
        self.positions
            .get(name)
            .map(|&idx| &self.columns[idx].datapoints)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> + '_ {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Alias rules that degraded to the canonical id while these columns were built.
    pub fn alias_fallbacks(&self) -> &[AliasOutcome] {
        &self.fallbacks
    }

    pub fn to_table(&self, convert_time: bool) -> errors::Result<RecordBatch> {
        let mut builder = FrameBuilder::new(convert_time);
        for column in &self.columns {
            builder.append(column)?;
        }
        Ok(builder.get_batch()?)
    }
}

/// A decoded OpenTSDB response: its series in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    series: Vec<SeriesRecord>,
}

impl Response {
    pub fn from_raw<'a>(input: impl Into<RawResponse<'a>>) -> errors::Result<Response> {
        let series = match input.into() {
            RawResponse::Text(s) => serde_json::from_str::<Vec<SeriesRecord>>(s)?,
            RawResponse::OwnedText(s) => serde_json::from_str::<Vec<SeriesRecord>>(&s)?,
            RawResponse::Bytes(b) => serde_json::from_slice::<Vec<SeriesRecord>>(b)?,
            RawResponse::OwnedBytes(b) => serde_json::from_slice::<Vec<SeriesRecord>>(&b)?,
            RawResponse::Records(records) => records,
            RawResponse::Value(Value::Array(items)) => items
                .into_iter()
                .map(|item| -> errors::Result<SeriesRecord> {
                    match item {
                        Value::Object(_) => Ok(serde_json::from_value(item)?),
                        other => {
                            Err(ErrorKind::InvalidInputType(json_type_name(&other).to_owned())
                                .into())
                        }
                    }
                })
                .collect::<errors::Result<Vec<_>>>()?,
            RawResponse::Value(other) => {
                return Err(ErrorKind::InvalidInputType(json_type_name(&other).to_owned()).into())
            }
        };
        debug!("Decoded {} series", series.len());
        Ok(Response { series })
    }

    pub fn from_reader<R: Read>(reader: R) -> errors::Result<Response> {
        let series: Vec<SeriesRecord> = serde_json::from_reader(reader)?;
        debug!("Decoded {} series", series.len());
        Ok(Response { series })
    }

    /// A fresh traversal on every call.
    pub fn series(&self) -> impl Iterator<Item = &SeriesRecord> + '_ {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Column name and datapoints per series. A name seen twice keeps the later series' data.
    pub fn to_columns(&self, options: &FrameOptions) -> errors::Result<Columns> {
        let mut columns = Columns::default();
        for s in self.series() {
            let name = match &options.name_rule {
                None => s.id()?,
                Some(rule) => {
                    let outcome = s.alias_outcome(rule, &options.registry)?;
                    let name = outcome.name().to_owned();
                    if outcome.is_fallback() {
                        columns.fallbacks.push(outcome);
                    }
                    name
                }
            };
            let datapoints = s.datapoints(options.convert_time)?;
            debug!("Series `{name}` with {} datapoints", datapoints.len());
            if let Some(replaced) = columns.insert(name.clone(), datapoints) {
                debug!(
                    "Column `{name}` overwritten, dropping {} datapoints of an earlier series",
                    replaced.len()
                );
            }
        }
        Ok(columns)
    }

    pub fn to_table(&self, options: &FrameOptions) -> errors::Result<RecordBatch> {
        self.to_columns(options)?.to_table(options.convert_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowKey;
    use crate::schema::INDEX_COLUMN;
    use arrow::array::AsArray;
    use arrow::datatypes::{Float64Type, Int64Type, TimestampSecondType};
    use serde_json::json;

    const TWO_HOSTS: &str = r#"[
        {"metric": "sys.cpu", "tags": {"host": "a"}, "aggregateTags": [], "dps": {"1": 1.5, "2": 2.5}},
        {"metric": "sys.cpu", "tags": {"host": "b"}, "aggregateTags": [], "dps": {"2": 20, "3": 30}}
    ]"#;

    fn values(batch: &RecordBatch, name: &str) -> Vec<Option<f64>> {
        batch
            .column_by_name(name)
            .unwrap()
            .as_primitive::<Float64Type>()
            .iter()
            .collect()
    }

    #[test]
    fn test_from_text() -> errors::Result<()> {
        let r = Response::from_raw(TWO_HOSTS)?;
        assert_eq!(r.len(), 2);
        let metrics: Vec<&str> = r.series().map(|s| s.metric.as_str()).collect();
        assert_eq!(metrics, vec!["sys.cpu", "sys.cpu"]);
        // Each call starts a new traversal.
        assert_eq!(r.series().count(), r.series().count());
        Ok(())
    }

    #[test]
    fn test_from_values_and_records() -> errors::Result<()> {
        let values = vec![json!({"metric": "m", "tags": {}, "dps": {"1": 1}})];
        let from_values = Response::from_raw(values)?;
        let records: Vec<SeriesRecord> = from_values.series().cloned().collect();
        let from_records = Response::from_raw(records)?;
        assert_eq!(from_values, from_records);
        let from_bytes = Response::from_raw(TWO_HOSTS.as_bytes())?;
        assert_eq!(from_bytes, Response::from_reader(TWO_HOSTS.as_bytes())?);
        Ok(())
    }

    #[test]
    fn test_from_owned_text_and_bytes() -> errors::Result<()> {
        let borrowed = Response::from_raw(TWO_HOSTS)?;
        let body: String = TWO_HOSTS.to_owned();
        assert_eq!(Response::from_raw(&body)?, borrowed);
        assert_eq!(Response::from_raw(body)?, borrowed);
        let bytes: Vec<u8> = TWO_HOSTS.as_bytes().to_vec();
        assert_eq!(Response::from_raw(bytes)?, borrowed);
        let err = Response::from_raw(b"[1".to_vec()).unwrap_err();
        assert!(err.is_parse_error());
        Ok(())
    }

    #[test]
    fn test_index_name_clash() {
        let r = Response::from_raw(r#"[{"metric":"timestamp","tags":{},"dps":{"1":5}}]"#).unwrap();
        let err = r.to_table(&FrameOptions::new()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ArrowError(_)));
    }

    #[test]
    fn test_invalid_input_type() {
        let err = Response::from_raw(json!(42)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidInputType(t) if t == "number"));
        let err = Response::from_raw(json!([{"metric": "m"}, "x"])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidInputType(t) if t == "string"));
    }

    #[test]
    fn test_malformed_text() {
        let err = Response::from_raw("[{\"metric\": ").unwrap_err();
        assert!(err.is_parse_error());
        assert!(matches!(err.kind(), ErrorKind::SerdeJsonError(_)));
    }

    #[test]
    fn test_table_by_id() -> errors::Result<()> {
        let r = Response::from_raw(TWO_HOSTS)?;
        let batch = r.to_table(&FrameOptions::new())?;
        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_owned())
            .collect();
        assert_eq!(names, vec![INDEX_COLUMN, "sys.cpu{host=a}", "sys.cpu{host=b}"]);

        let index = batch.column(0).as_primitive::<Int64Type>();
        assert_eq!(index.values().to_vec(), vec![1, 2, 3]);
        assert_eq!(values(&batch, "sys.cpu{host=a}"), vec![Some(1.5), Some(2.5), None]);
        assert_eq!(values(&batch, "sys.cpu{host=b}"), vec![None, Some(20.0), Some(30.0)]);
        Ok(())
    }

    #[test]
    fn test_duplicate_names_overwrite() -> errors::Result<()> {
        let raw = r#"[{"metric":"a","tags":{},"dps":{"1":1}},{"metric":"a","tags":{},"dps":{"2":2}}]"#;
        let r = Response::from_raw(raw)?;
        let columns = r.to_columns(&FrameOptions::new())?;
        assert_eq!(columns.len(), 1);
        let a = columns.get("a").unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a[&RowKey::Epoch(2)], Some(2.0));

        let batch = r.to_table(&FrameOptions::new())?;
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(values(&batch, "a"), vec![Some(2.0)]);
        Ok(())
    }

    #[test]
    fn test_alias_columns() -> errors::Result<()> {
        let r = Response::from_raw(TWO_HOSTS)?;
        let options = FrameOptions::new().with_name_rule("%(tags.host)s");
        let columns = r.to_columns(&options)?;
        assert_eq!(columns.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(columns.alias_fallbacks().is_empty());

        let options = FrameOptions::new().with_name_rule("%(tags.dc)s");
        let columns = r.to_columns(&options)?;
        assert_eq!(
            columns.names().collect::<Vec<_>>(),
            vec!["sys.cpu{host=a}", "sys.cpu{host=b}"]
        );
        assert_eq!(columns.alias_fallbacks().len(), 2);
        Ok(())
    }

    #[test]
    fn test_alias_collision_keeps_first_position() -> errors::Result<()> {
        let r = Response::from_raw(TWO_HOSTS)?;
        let options = FrameOptions::new().with_name_rule("!metric");
        let batch = r.to_table(&options)?;
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(values(&batch, "sys.cpu"), vec![Some(20.0), Some(30.0)]);
        Ok(())
    }

    #[test]
    fn test_convert_time_table() -> errors::Result<()> {
        let r = Response::from_raw(TWO_HOSTS)?;
        let options = FrameOptions::new().with_convert_time(true);
        let batch = r.to_table(&options)?;
        let index = batch.column(0).as_primitive::<TimestampSecondType>();
        assert_eq!(index.values().to_vec(), vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn test_empty_response() -> errors::Result<()> {
        let r = Response::from_raw("[]")?;
        assert!(r.is_empty());
        let batch = r.to_table(&FrameOptions::new())?;
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 1);
        Ok(())
    }

    #[test]
    fn test_bad_timestamp_propagates() {
        let r = Response::from_raw(r#"[{"metric":"a","tags":{},"dps":{"x":1}}]"#).unwrap();
        let err = r.to_table(&FrameOptions::new()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidTimestamp { .. }));
    }
}
