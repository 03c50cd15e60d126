use tracing_subscriber::EnvFilter;

/// Initialize structured logging.
///
/// `RUST_LOG` wins when set; otherwise the `--log-level` flag is used as the
/// default directive for all targets.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
