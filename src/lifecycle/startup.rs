//! Startup preparation.
//!
//! # Responsibilities
//! - Keep the process's own upstream calls off any inherited proxy
//! - Make sure the capture directory exists before traffic arrives
//!
//! # Design Decisions
//! - Fail fast: a log directory that cannot be created is fatal

use std::path::Path;

/// Proxy variables that could reroute the forwarder's outbound calls.
pub const PROXY_ENV_VARS: &[&str] = &[
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "ALL_PROXY",
    "http_proxy",
    "https_proxy",
    "all_proxy",
];

/// Remove inherited proxy environment variables.
///
/// Must run before any other thread is spawned.
pub fn clear_proxy_env() {
    for var in PROXY_ENV_VARS {
        if std::env::var_os(var).is_some() {
            tracing::debug!(var = %var, "Clearing inherited proxy variable");
            std::env::remove_var(var);
        }
    }
}

/// Create the capture directory (and parents) if missing.
pub fn prepare_log_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)?;
    tracing::info!(path = %path.display(), "Capture directory ready");
    Ok(())
}
