//! Process startup shared by the subcommands

use crate::cli::ModelArgs;
use anyhow::Context;
use churnguard_model::{env, model_loader, ChurnService, ServingConfig};

/// Config file (if present), then the `--model` override
pub fn load_config(args: &ModelArgs) -> anyhow::Result<ServingConfig> {
    let mut config = ServingConfig::load(Some(args.config.as_path()))
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if let Some(path) = &args.model {
        config = config.with_model_path(path);
    }

    Ok(config)
}

/// Apply runtime thread-pool variables. Must run before any threads start.
pub fn prepare_environment(config: &ServingConfig) {
    for (var, value) in env::configure_environment(&config.session) {
        tracing::info!("Set {}={}", var, value);
    }
}

/// Create the session and load the model. Every failure here halts the run.
pub fn start_service(config: &ServingConfig) -> anyhow::Result<ChurnService> {
    let path = model_loader::locate_model(config.model.path.as_deref());
    tracing::info!("Loading model from {}", path.display());

    ChurnService::bootstrap(config).map_err(|e| {
        if e.is_fatal() {
            tracing::error!("Startup failed: {}", e);
        } else {
            tracing::warn!("Startup failed with a non-fatal error: {}", e);
        }
        anyhow::Error::new(e).context("Failed to start prediction service")
    })
}
