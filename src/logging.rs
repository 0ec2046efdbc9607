use tracing_subscriber::{fmt, EnvFilter};

/// Initializes a process-wide `tracing` subscriber. Honors `RUST_LOG`
/// when set; otherwise falls back to `default_level` (e.g. `"info"`).
/// Safe to call once at the top of a binary's `main`; library code
/// never calls this itself.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .ok();
}
