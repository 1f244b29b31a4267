use arrow::datatypes::{DataType, Field, Schema, TimeUnit};

pub const INDEX_COLUMN: &str = "timestamp";
pub const UTC: &str = "UTC";

#[derive(Debug)]
pub struct FrameSchema {
    pub schema: Schema,
}

impl FrameSchema {
    pub fn index_type(convert_time: bool) -> DataType {
        if convert_time {
            DataType::Timestamp(TimeUnit::Second, Some(UTC.into()))
        } else {
            DataType::Int64
        }
    }

    pub fn index_field(convert_time: bool) -> Field {
        Field::new(INDEX_COLUMN, Self::index_type(convert_time), false)
    }

    pub fn value_field(name: &str) -> Field {
        Field::new(name, DataType::Float64, true)
    }

    /// Index column first, then one nullable `Float64` column per series name.
    pub fn new(column_names: &[&str], convert_time: bool) -> FrameSchema {
        let mut all_fields: Vec<Field> = Vec::with_capacity(column_names.len() + 1);
        all_fields.push(Self::index_field(convert_time));
        all_fields.extend(column_names.iter().map(|name| Self::value_field(name)));
        let schema = Schema::new(all_fields);
        FrameSchema { schema }
    }
}
