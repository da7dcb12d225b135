//! Tracing setup.
//!
//! Initializes console tracing with an environment filter.
//!
//! # Configuration
//!
//! - `RUST_LOG`: standard env-filter directives (default: `info`)
//! - `NODE_ENV`: `development` enables ANSI colors and hides targets
//!
//! # Usage
//!
//! ```rust,ignore
//! use quote_engine::telemetry::init_telemetry;
//!
//! init_telemetry();
//! ```

use tracing_subscriber::EnvFilter;

/// Initialize console tracing with an env filter.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init_telemetry() {
    let is_development = std::env::var("NODE_ENV")
        .map(|v| v == "development")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(!is_development)
        .with_ansi(is_development)
        .try_init();

    if result.is_ok() {
        tracing::info!("Tracing initialized");
    }
}
