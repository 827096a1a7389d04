//! Diagnostic logging setup.
//!
//! `bt` writes diagnostics to stderr so stdout stays clean JSON. The filter
//! comes from `BT_LOG` (same syntax as `RUST_LOG`), default `warn`.
//! `BT_LOG_FORMAT=json` switches to one JSON object per event.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "BT_LOG";

/// Environment variable selecting the event format.
pub const LOG_FORMAT_ENV: &str = "BT_LOG_FORMAT";

/// True when `BT_LOG_FORMAT` asks for JSON events.
pub fn json_requested() -> bool {
    std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"))
}

/// Build the filter: `BT_LOG` if set and valid, else `warn` (or `info` when verbose).
pub fn build_filter(verbose: bool) -> EnvFilter {
    let fallback = if verbose { "bugtrail=info" } else { "warn" };
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the global subscriber. Calling it twice is harmless.
///
/// With `json` set, events are emitted as one JSON object per line.
pub fn init(verbose: bool, json: bool) {
    let registry = tracing_subscriber::registry().with(build_filter(verbose));
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    // Already installed (tests, embedding): keep the existing subscriber
    let _ = result;
}
