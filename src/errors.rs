use thiserror::Error;

#[derive(Error, Debug)]
#[error(transparent)]
pub struct AppError(Box<ErrorKind>);

#[derive(Error, Debug)]
pub enum ErrorKind {
    #[error("InvalidInputType: unsupported response input of type `{0}`")]
    InvalidInputType(String),
    #[error("InvalidTimestamp: `{key}` is not an integer epoch: {source}")]
    InvalidTimestamp {
        key: String,
        source: std::num::ParseIntError,
    },
    #[error("TimestampOutOfRange: {0} seconds cannot be represented as a UTC timestamp")]
    TimestampOutOfRange(i64),
    #[error("InvalidValue: datapoint `{key}` is neither a number nor null")]
    InvalidValue { key: String },
    #[error("MissingField: series `{metric}` has no `{field}` field")]
    MissingField { metric: String, field: &'static str },
    #[error("SerdeJsonError: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
    #[error("IoError: {0}")]
    IoError(#[from] std::io::Error),
    #[error("ArrowError: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),
    #[error("ParquetError: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),
}

impl AppError {
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// True for malformed text and for timestamp keys or values that cannot be decoded.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            *self.0,
            ErrorKind::SerdeJsonError(_)
                | ErrorKind::InvalidTimestamp { .. }
                | ErrorKind::TimestampOutOfRange(_)
                | ErrorKind::InvalidValue { .. }
        )
    }
}

impl<E> From<E> for AppError
where
    ErrorKind: From<E>,
{
    fn from(err: E) -> Self {
        AppError(Box::new(ErrorKind::from(err)))
    }
}
pub type Result<T> = std::result::Result<T, AppError>;
