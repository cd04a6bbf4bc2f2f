//! Process environment for the compute runtime
//!
//! The CPU backend sizes its thread pools from these variables on first use,
//! so they must be set before the first session is created. Setting process
//! environment is only sound while the process is single-threaded: binaries
//! call `configure_environment` before starting their async runtime, and the
//! call made again by `get_session` then finds every variable already set.

use crate::config::SessionConfig;

/// Thread-pool variables read by the compute runtime
pub const THREAD_POOL_VARS: [&str; 2] = ["RAYON_NUM_THREADS", "OMP_NUM_THREADS"];

/// Size the runtime thread pools to the session's worker count.
///
/// Variables the operator already set are left alone. Returns the
/// `(name, value)` pairs that were actually applied.
pub fn configure_environment(config: &SessionConfig) -> Vec<(String, String)> {
    apply_defaults(&THREAD_POOL_VARS, &config.worker_threads.to_string())
}

fn apply_defaults(vars: &[&str], value: &str) -> Vec<(String, String)> {
    let mut applied = Vec::new();

    for var in vars {
        if let Some(existing) = std::env::var_os(var) {
            tracing::debug!("Keeping {}={:?} from environment", var, existing);
            continue;
        }

        std::env::set_var(var, value);
        applied.push((var.to_string(), value.to_string()));
    }

    applied
}
