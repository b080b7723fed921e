//! Idempotent tracing-subscriber setup for orchestrator epoch logging.

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Installs a compact `tracing-subscriber` registry and a panic hook that
/// routes panic messages through `tracing::error!`. Safe to call more than
/// once; only the first call takes effect.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        use tracing_subscriber::fmt::format::FmtSpan;
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        std::panic::set_hook(Box::new(|info| {
            tracing::error!("PANIC: {}", info);
        }));

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                    .with_target(false)
                    .with_level(true)
                    .compact(),
            )
            .init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
