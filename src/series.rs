use crate::alias::{AliasOutcome, AliasRegistry, AliasRule, Metadata};
use crate::errors::{self, ErrorKind};
use crate::model::{Datapoints, RowKey, SeriesRecord};
use chrono::DateTime;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::info;

impl SeriesRecord {
    pub fn new(metric: &str, tags: HashMap<String, String>, dps: Map<String, Value>) -> Self {
        SeriesRecord {
            metric: metric.to_owned(),
            tags: Some(tags),
            dps: Some(dps),
            extra: Map::new(),
        }
    }

    pub fn tags(&self) -> errors::Result<&HashMap<String, String>> {
        self.tags.as_ref().ok_or_else(|| self.missing("tags"))
    }

    pub fn dps(&self) -> errors::Result<&Map<String, Value>> {
        self.dps.as_ref().ok_or_else(|| self.missing("dps"))
    }

    fn missing(&self, field: &'static str) -> errors::AppError {
        ErrorKind::MissingField {
            metric: self.metric.clone(),
            field,
        }
        .into()
    }

    /// `metric{k1=v1,k2=v2}` with tag keys in ascending order, or just `metric` without tags.
    pub fn id(&self) -> errors::Result<String> {
        let tags = self.tags()?;
        if tags.is_empty() {
            return Ok(self.metric.clone());
        }
        let mut keys: Vec<&String> = tags.keys().collect();
        keys.sort();
        let rendered: Vec<String> = keys.iter().map(|k| format!("{k}={}", tags[*k])).collect();
        Ok(format!("{}{{{}}}", self.metric, rendered.join(",")))
    }

    pub fn flattened_metadata(&self) -> errors::Result<Metadata> {
        let mut md = Metadata::new();
        md.insert("metric".to_owned(), self.metric.clone());
        for (k, v) in self.tags()? {
            md.insert(format!("tags.{k}"), v.clone());
        }
        Ok(md)
    }

    /// Applies `rule`; an error or an empty result degrades to [`SeriesRecord::id`].
    pub fn alias_outcome(
        &self,
        rule: &AliasRule,
        registry: &AliasRegistry,
    ) -> errors::Result<AliasOutcome> {
        let id = self.id()?;
        let derived = self
            .flattened_metadata()
            .map_err(|e| e.to_string())
            .and_then(|md| rule.apply(&md, registry).map_err(|e| e.to_string()));
        let outcome = match derived {
            Ok(name) if !name.is_empty() => AliasOutcome::Derived(name),
            Ok(_) => AliasOutcome::Fallback {
                id,
                reason: "rule produced an empty name".to_owned(),
            },
            Err(reason) => AliasOutcome::Fallback { id, reason },
        };
        if let AliasOutcome::Fallback { id, reason } = &outcome {
            info!("Caught an error generating alias `{rule}` for `{id}`: {reason}");
        }
        Ok(outcome)
    }

    pub fn alias(&self, rule: &AliasRule, registry: &AliasRegistry) -> errors::Result<String> {
        Ok(self.alias_outcome(rule, registry)?.into_name())
    }

    /// Parses `dps` keys into row keys. When two keys parse to the same second, the one later
    /// in the document wins.
    pub fn datapoints(&self, convert_time: bool) -> errors::Result<Datapoints> {
        let dps = self.dps()?;
        let mut out: Datapoints = HashMap::with_capacity(dps.len());
        for (key, value) in dps {
            let secs: i64 = key
                .trim()
                .parse()
                .map_err(|source| ErrorKind::InvalidTimestamp {
                    key: key.clone(),
                    source,
                })?;
            let row = if convert_time {
                let ts = DateTime::from_timestamp(secs, 0)
                    .ok_or(ErrorKind::TimestampOutOfRange(secs))?;
                RowKey::Timestamp(ts)
            } else {
                RowKey::Epoch(secs)
            };
            let value = match value {
                Value::Null => None,
                Value::Number(n) => Some(
                    n.as_f64()
                        .ok_or_else(|| ErrorKind::InvalidValue { key: key.clone() })?,
                ),
                _ => return Err(ErrorKind::InvalidValue { key: key.clone() }.into()),
            };
            out.insert(row, value);
        }
        Ok(out)
    }
}
