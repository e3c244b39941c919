use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the JSON structured-logging subscriber.
///
/// `RUST_LOG` overrides the default filter. Calling this twice is harmless;
/// the second installation attempt is ignored.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .try_init();
}
