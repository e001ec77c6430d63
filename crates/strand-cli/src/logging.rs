//! CLI logging setup.
//!
//! All log output goes to stderr so stdout stays reserved for command
//! results (notably the `--json` build objects). With `--json`, log
//! lines are emitted as one JSON object per line for machine
//! consumption.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// The `-v` count raises the level for strand's own crates only;
/// dependencies stay at WARN unless `RUST_LOG` says otherwise.
///
/// # Panics
/// Panics if a global subscriber is already installed.
pub fn init(verbosity: u8, json: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(from_env) => from_env,
        Err(_) => {
            let level = match verbosity {
                0 => Level::INFO,
                1 => Level::DEBUG,
                _ => Level::TRACE,
            };
            EnvFilter::new(format!(
                "warn,strand={level},strand_core={level},strand_dev={level},strand_util={level}"
            ))
        }
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
