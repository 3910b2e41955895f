use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging with tracing
///
/// This function sets up the tracing subscriber with the following configuration:
/// - Reads filter from RUST_LOG environment variable if available
/// - Falls back to "bitfit_lib=debug,warn" if RUST_LOG is not set
/// - Uses a formatted output layer
///
/// Returns `false` if a global subscriber was already installed, in which case
/// the existing one is left untouched.
///
/// # Example
///
/// ```no_run
/// use bitfit_lib::utils::logging::init_logging;
///
/// init_logging();
/// ```
pub fn init_logging() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bitfit_lib=debug,warn"));

    let installed = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("BitFit logging initialized");
    }
    installed
}
