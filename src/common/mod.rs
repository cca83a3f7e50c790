use tracing_subscriber::EnvFilter;

/// Per-process test setup: color-eyre panics and a `RUST_LOG`-driven tracing
/// subscriber whose output the test harness captures.
pub fn init() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        color_eyre::install().unwrap();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
