use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset: INFO, with sqlx statement logging
/// held at WARN.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Install the global tracing subscriber.
///
/// Returns `false` when a subscriber was already installed, so hosts and
/// tests can call this freely.
pub fn init_tracing() -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_tracing();
        assert!(!init_tracing());
        tracing::info!("[Telemetry] still logging after repeated init");
    }
}
