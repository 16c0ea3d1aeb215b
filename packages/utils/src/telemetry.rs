use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the process-wide subscriber. Called once from main, after the
/// config has been parsed (the filter directives come from it).
pub fn init_tracing(filter: EnvFilter) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_target(false),
        )
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to init tracing: {e}"))?;

    Ok(())
}

// the test version does not take a filter since config itself is tested
// and modified from different parallel tests, so this only uses defaults.
// it has an extra complexity of race conditions across threads, hence the
// once-guard - it's used from unit tests, integration tests, and benches.
pub fn init_tracing_tests() {
    use std::sync::LazyLock;

    static INIT: LazyLock<std::sync::Mutex<bool>> = LazyLock::new(|| std::sync::Mutex::new(false));

    let mut init = INIT.lock().unwrap();

    if !*init {
        *init = true;

        tracing_subscriber::fmt::init();
        tracing::debug!("Tracing initialized for tests");
    }
}
