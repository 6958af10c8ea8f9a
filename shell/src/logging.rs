//! Diagnostic tracing for the shell itself.
//!
//! Kept apart from the host log sink (`io::host::Host::log`), which carries the
//! module's per-tick output and fault lines. Nothing written here reaches the
//! host; everything goes to stderr and is filtered by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
///
/// Scoped to this crate so dependency noise stays out of simulator runs.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "tick_shell=debug"
    } else {
        "tick_shell=warn"
    }
}

/// Install the stderr subscriber.
///
/// `RUST_LOG` wins over `verbose`:
/// ```bash
/// RUST_LOG=tick_shell::driver=trace tick-shell simulate scenarios/healthy.toml
/// ```
/// A second call is a no-op.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_crate_level_only() {
        assert_eq!(default_directive(false), "tick_shell=warn");
        assert_eq!(default_directive(true), "tick_shell=debug");
    }

    #[test]
    fn repeated_init_does_not_panic() {
        init(false);
        init(true);
    }
}
