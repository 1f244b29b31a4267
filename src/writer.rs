use crate::errors;
use arrow::array::RecordBatch;
use clap::ValueEnum;
use parquet::arrow::arrow_writer::ArrowWriterOptions;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties, WriterVersion};
use std::io::Write;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatisticsMode {
    /// Compute no statistics
    None,
    /// Compute chunk-level statistics but not page-level
    Chunk,
    /// Compute page-level and chunk-level statistics
    #[default]
    Page,
}

impl From<StatisticsMode> for EnabledStatistics {
    fn from(mode: StatisticsMode) -> Self {
        match mode {
            StatisticsMode::None => EnabledStatistics::None,
            StatisticsMode::Chunk => EnabledStatistics::Chunk,
            StatisticsMode::Page => EnabledStatistics::Page,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterSettings {
    pub statistics_mode: StatisticsMode,
    pub zstd_level: i32,
}

impl Default for WriterSettings {
    fn default() -> Self {
        WriterSettings {
            statistics_mode: StatisticsMode::Page,
            zstd_level: 3,
        }
    }
}

impl WriterSettings {
    pub fn properties(&self) -> errors::Result<WriterProperties> {
        let compression = Compression::ZSTD(ZstdLevel::try_new(self.zstd_level)?);
        Ok(WriterProperties::builder()
            .set_statistics_enabled(self.statistics_mode.into())
            .set_compression(compression)
            .set_dictionary_enabled(true)
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .build())
    }
}

/// Writes `batch` as a single-row-group Parquet file and returns the number of rows written.
pub fn write_parquet<W: Write + Send>(
    batch: &RecordBatch,
    writer: W,
    settings: &WriterSettings,
) -> errors::Result<i64> {
    let wrt_opts = ArrowWriterOptions::new()
        .with_properties(settings.properties()?)
        .with_skip_arrow_metadata(true);
    let mut writer = ArrowWriter::try_new_with_options(writer, batch.schema(), wrt_opts)?;
    writer.write(batch)?;
    let md = writer.close()?;
    Ok(md.num_rows)
}
