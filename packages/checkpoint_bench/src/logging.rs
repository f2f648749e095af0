use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Installs a global subscriber that logs to stderr and honors the `RUST_LOG` environment
/// variable.
///
/// Without `RUST_LOG`, only warnings and errors are shown, so standard output carries just the
/// benchmark report. Use `RUST_LOG=checkpoint_bench=debug` to see every checkpoint.
// Process-global side effect with nothing to assert on.
#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg_attr(test, mutants::skip)]
pub fn init_subscriber() {
    let fmt_layer = fmt::layer().with_target(true).with_writer(std::io::stderr);

    let filter_layer = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}
