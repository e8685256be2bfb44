//! Structured logging setup shared by both binaries. JSON output in
//! production-like environments, pretty output otherwise; level is driven
//! by the `logging.level` config section, overridable by `RUST_LOG`.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global `tracing` subscriber. `json` selects the JSON
/// formatter (used when `app.env != "development"`); `default_level` seeds
/// the filter when `RUST_LOG` is unset.
pub fn init(default_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    let subscriber = fmt().with_env_filter(filter);
    if json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}
