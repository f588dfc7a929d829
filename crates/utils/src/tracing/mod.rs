//! Tracing setup

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-export tracing macros for convenience
pub use tracing::{debug, error, info, instrument, span, trace, warn, Level, Span};

type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Initialize the tracing system
///
/// Honors `RUST_LOG` when set and falls back to `info` otherwise. Output is a
/// compact single-line format on stderr so it stays out of the way of
/// whatever the host process writes to stdout.
pub fn init() -> Result<(), InitError> {
    init_with_default("info")
}

/// Initialize the tracing system with a custom fallback directive
pub fn init_with_default(directive: &str) -> Result<(), InitError> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directive))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(is_tty())
        .compact()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

/// Create a span covering one cached call
pub fn lookup_span(method: &impl std::fmt::Display) -> Span {
    span!(Level::DEBUG, "lookup", method = %method)
}
