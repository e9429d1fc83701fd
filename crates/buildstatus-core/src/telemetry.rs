//! Tracing setup for buildstatus binaries.
//!
//! Our own crates log at the requested level; everything else (reqwest,
//! hyper, rustls) stays at `warn` so a verbose run shows status updates
//! rather than connection-pool chatter. `RUST_LOG` replaces the whole filter.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Targets that follow the requested level.
const OWN_TARGETS: &[&str] = &["buildstatus_core", "buildstatus_github", "buildstatus"];

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    let mut directives = String::from("warn");
    for target in OWN_TARGETS {
        directives.push(',');
        directives.push_str(target);
        directives.push('=');
        directives.push_str(&level);
    }
    directives
}

/// Install the global subscriber. Later calls are no-ops.
///
/// JSON output keeps span fields (`build_id`, `owner`, `repo`) on every
/// line; text output shows targets only at `DEBUG` and below.
pub fn init_tracing(json: bool, level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let layer = if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    } else {
        fmt::layer().with_target(level >= Level::DEBUG).boxed()
    };

    let _ = tracing_subscriber::registry()
        .with(layer.with_filter(filter))
        .try_init();
}
