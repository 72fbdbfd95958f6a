use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset. sqlx logs every statement at `info`.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,sea_orm=warn";

/// Install the JSON stdout subscriber for a service process.
///
/// Events are flattened so `fields` sit at the top level of each line, and
/// the enclosing span (e.g. a batch id) is attached. Calling it again is a no-op.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false),
        )
        .try_init();
}
