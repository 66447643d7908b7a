//! Logging setup for the `rmcpp` binary.
//!
//! The filter is read from `RMCPP_LOG`, falling back to `RUST_LOG`, and
//! defaults to `warn`. Everything goes to stderr so stdout only ever carries
//! the filtered source.
//!
//! ```bash
//! RMCPP_LOG=debug rmcpp -i foo.c
//! RMCPP_LOG=rmcpp::scanner=trace rmcpp foo.c
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

fn build_filter() -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(LevelFilter::WARN.into());
    match std::env::var("RMCPP_LOG") {
        Ok(val) => builder.parse_lossy(val),
        Err(_) => builder.from_env_lossy(),
    }
}

/// Initialise the global tracing subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter())
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}
