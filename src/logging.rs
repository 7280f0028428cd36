use tracing_subscriber::EnvFilter;

// RUST_LOG, when set, overrides the configured level
pub fn init(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "logging initialized");
}
