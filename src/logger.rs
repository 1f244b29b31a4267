use tracing_subscriber::fmt::format::{DefaultFields, Format};
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::EnvFilter;

/// Installs the global fmt subscriber. `RUST_LOG` wins over `log_level` when set.
pub fn setup(app: &str, log_level: &str) {
    let lib = env!("CARGO_CRATE_NAME");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{}={log_level},{lib}={log_level}",
            app.replace('-', "_")
        ))
    });
    let subscriber = get_subscriber(filter);
    subscriber.init();
}

pub fn get_subscriber(filter: EnvFilter) -> SubscriberBuilder<DefaultFields, Format, EnvFilter> {
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
}
