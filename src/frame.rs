use crate::model::{Datapoints, RowKey};
use crate::schema::{FrameSchema, INDEX_COLUMN, UTC};
use arrow::array::{ArrayRef, Float64Builder, Int64Builder, RecordBatch, TimestampSecondBuilder};
use arrow::datatypes::Schema;
use arrow::error::ArrowError;
use std::collections::BTreeSet;
use std::sync::Arc;

pub trait ColumnsBuilder<'a> {
    type T;

    fn get_schema(&self) -> Arc<Schema>;
    fn get_batch(&mut self) -> Result<RecordBatch, ArrowError>;
    fn append(&mut self, msg: &'a Self::T) -> Result<(), ArrowError>;

    #[allow(unused)]
    fn reset(&mut self) -> Result<(), ArrowError>;
}

/// A named column of the merged table.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub datapoints: Datapoints,
}

/// Outer-joins columns on their row keys into a single batch.
pub struct FrameBuilder<'a> {
    convert_time: bool,
    columns: Vec<&'a Column>,
}

impl<'a> ColumnsBuilder<'a> for FrameBuilder<'a> {
    type T = Column;

    fn get_schema(&self) -> Arc<Schema> {
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        Arc::new(FrameSchema::new(names.as_slice(), self.convert_time).schema)
    }

    fn get_batch(&mut self) -> Result<RecordBatch, ArrowError> {
        let rows: BTreeSet<RowKey> = self
            .columns
            .iter()
            .flat_map(|c| c.datapoints.keys().copied())
            .collect();

        // Order follows `FrameSchema::new`: index first, then columns as appended.
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(self.columns.len() + 1);
        arrays.push(self.index_array(&rows));
        for column in &self.columns {
            let mut values = Float64Builder::with_capacity(rows.len());
            for row in &rows {
                values.append_option(column.datapoints.get(row).copied().flatten());
            }
            arrays.push(Arc::new(values.finish()));
        }
        RecordBatch::try_new(self.get_schema(), arrays)
    }

    fn append(&mut self, msg: &'a Self::T) -> Result<(), ArrowError> {
        if msg.name == INDEX_COLUMN {
            return Err(ArrowError::InvalidArgumentError(format!(
                "Column name `{INDEX_COLUMN}` is reserved for the row index"
            )));
        }
        let mismatched = msg
            .datapoints
            .keys()
            .any(|k| matches!(k, RowKey::Timestamp(_)) != self.convert_time);
        if mismatched {
            return Err(ArrowError::InvalidArgumentError(format!(
                "Column `{}` is not keyed by {}",
                msg.name,
                if self.convert_time { "timestamps" } else { "epoch seconds" }
            )));
        }
        self.columns.push(msg);
        Ok(())
    }

    fn reset(&mut self) -> Result<(), ArrowError> {
        self.columns.clear();
        Ok(())
    }
}

impl<'a> FrameBuilder<'a> {
    pub fn new(convert_time: bool) -> FrameBuilder<'a> {
        FrameBuilder {
            convert_time,
            columns: Vec::new(),
        }
    }

    fn index_array(&self, rows: &BTreeSet<RowKey>) -> ArrayRef {
        if self.convert_time {
            let mut index = TimestampSecondBuilder::with_capacity(rows.len()).with_timezone(UTC);
            rows.iter().for_each(|r| index.append_value(r.epoch_seconds()));
            Arc::new(index.finish())
        } else {
            let mut index = Int64Builder::with_capacity(rows.len());
            rows.iter().for_each(|r| index.append_value(r.epoch_seconds()));
            Arc::new(index.finish())
        }
    }
}
