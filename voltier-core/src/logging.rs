use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .try_init();
}
