//! Tracing setup shared by the `canary` CLI and the `canary-ui` server.
//!
//! Tracing is for development diagnostics only and always goes to stderr, so
//! command output on stdout stays machine-readable. Remote failures the user
//! must see are carried as `core::session::Notice` on the session view and
//! do not depend on `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Directives used by the CLI when `RUST_LOG` is unset.
pub const CLI_DIRECTIVES: &str = "warn";

/// Directives used by the UI server when `RUST_LOG` is unset.
pub const SERVER_DIRECTIVES: &str = "warn,canary=info,canary_ui=info";

/// `RUST_LOG` when set and parseable, otherwise `default_directives`.
pub fn env_filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// Install the CLI subscriber: compact lines, quiet by default.
///
/// ```bash
/// RUST_LOG=canary=debug canary run --state MA --record 1 --type Submission --message msg.json
/// ```
pub fn init() {
    init_with(CLI_DIRECTIVES);
}

/// Install a compact stderr subscriber with the given fallback directives.
pub fn init_with(default_directives: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_directives))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
