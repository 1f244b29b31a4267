//! Turn OpenTSDB `/api/query` responses into a single Arrow table.
//!
//! ```ignore
//! use otsdb_frame_rs::{FrameOptions, Response};
//!
//! let response = Response::from_raw(body.as_str())?;
//! let batch = response.to_table(&FrameOptions::new().with_name_rule("%(tags.host)s"))?;
//! ```

pub mod alias;
pub mod errors;
pub mod frame;
pub mod logger;
pub mod model;
pub mod response;
pub mod schema;
pub mod series;
pub mod writer;

pub use alias::{AliasError, AliasOutcome, AliasRegistry, AliasRule};
pub use errors::{AppError, ErrorKind};
pub use model::{Datapoints, RowKey, SeriesRecord};
pub use response::{Columns, FrameOptions, RawResponse, Response};
