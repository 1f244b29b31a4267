#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[cfg(target_env = "msvc")]
#[global_allocator]
static GLOBAL: snmalloc_rs::SnMalloc = snmalloc_rs::SnMalloc;

use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use flate2::read::GzDecoder;
use otsdb_frame_rs::errors::AppError;
use otsdb_frame_rs::writer::{write_parquet, StatisticsMode, WriterSettings};
use otsdb_frame_rs::{errors, logger, FrameOptions, Response};
use std::io::Read;
use std::time::Instant;
use tracing::{info, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Parser, Debug, Clone)]
#[clap()]
struct AppArgs {
    /// Input path to an OpenTSDB query response (JSON, optionally gzipped)
    #[clap(long)]
    input_json_file_path: String,
    /// Output path to Parquet
    #[clap(long)]
    output_parquet_file_path: Option<String>,
    /// Column naming rule: `%(key)s` template or `!transform`
    #[clap(long)]
    alias: Option<String>,
    /// Index rows by UTC timestamps instead of epoch seconds
    #[clap(long)]
    convert_time: bool,
    /// Controls statistics for Parquet
    #[clap(long, value_enum, default_value_t = StatisticsMode::Page)]
    statistics_mode: StatisticsMode,
    /// ZSTD compression level for Parquet
    #[clap(long, default_value_t = 3)]
    zstd_level: i32,
    /// Print the merged table to stdout
    #[clap(long)]
    print: bool,
    #[clap(long, default_value = "INFO")]
    log_level: String,
}

fn main() -> errors::Result<()> {
    let t: Instant = Instant::now();
    let args = AppArgs::parse();
    logger::setup("otsdb2pq", args.log_level.as_str());
    info!("Received args: {:?}", args);

    let response = read_response(args.input_json_file_path.as_str())?;
    let mut options = FrameOptions::new().with_convert_time(args.convert_time);
    if let Some(rule) = args.alias.as_deref() {
        options = options.with_name_rule(rule);
    }

    let columns = response.to_columns(&options)?;
    for fallback in columns.alias_fallbacks() {
        warn!("Alias fallback: {:?}", fallback);
    }
    if columns.len() < response.len() {
        warn!(
            "{} series collapsed into {} columns, earlier series with a duplicate name were dropped",
            response.len(),
            columns.len()
        );
    }
    let batch = columns.to_table(options.convert_time)?;
    info!(
        "{} series, {} columns, {} rows",
        response.len(),
        columns.len(),
        batch.num_rows()
    );

    if args.print {
        println!("{}", pretty_format_batches(&[batch.clone()])?);
    }

    if let Some(path) = args.output_parquet_file_path.as_deref() {
        let settings = WriterSettings {
            statistics_mode: args.statistics_mode,
            zstd_level: args.zstd_level,
        };
        let file = std::fs::File::create(path)?;
        let rows = write_parquet(&batch, file, &settings)?;
        info!("Wrote {rows} rows to {path}");
    }

    let total_elapsed_secs = (t.elapsed().as_millis() as f64) / 1000.0;
    info!("Done in {total_elapsed_secs:.3} seconds");
    Ok(())
}

fn read_response(path: &str) -> Result<Response, AppError> {
    let bytes = {
        let mut bytes = Vec::new();
        let mut f = std::fs::File::open(path)?;
        f.read_to_end(&mut bytes)?;
        bytes
    };
    if bytes.starts_with(&GZIP_MAGIC) {
        Response::from_reader(GzDecoder::new(bytes.as_slice()))
    } else {
        Response::from_raw(bytes.as_slice())
    }
}
