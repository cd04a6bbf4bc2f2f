use churnguard_cli::cli::{Cli, Commands};
use churnguard_cli::render::{exit_code, render_json, render_text};
use churnguard_cli::startup::{load_config, prepare_environment, start_service};
use churnguard_core::CustomerRecord;
use churnguard_model::{model_loader, ServingConfig};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let (model, verbose) = match &cli.command {
        Commands::Predict { model, verbose, .. } | Commands::Inspect { model, verbose } => {
            (model, *verbose)
        }
    };
    init_logging(verbose);

    let config = load_config(model)?;

    // Thread-pool variables go in before the runtime spawns its workers
    prepare_environment(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(cli.command, config))
}

async fn run(command: Commands, config: ServingConfig) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Predict { customer, json, .. } => {
            let service = start_service(&config)?;

            let record = CustomerRecord::from(customer);
            let submission = service.submit(&record).await;
            tracing::debug!("Request finished in state {}", submission.state());

            if json {
                println!("{}", render_json(&submission)?);
            } else {
                print!("{}", render_text(&submission));
            }

            Ok(ExitCode::from(exit_code(&submission)))
        }

        Commands::Inspect { .. } => {
            let path = model_loader::locate_model(config.model.path.as_deref());
            let summary = model_loader::inspect(&path)?;

            println!("Model path:      {}", summary.path.display());
            println!("Directory found: {}", summary.exists);
            println!("Metadata marker: {}", summary.has_metadata);
            println!("Entries:         {}", summary.entry_count);

            if summary.exists {
                Ok(ExitCode::SUCCESS)
            } else {
                tracing::error!("Model directory {} not found", path.display());
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        "churnguard=debug,churnguard_cli=debug,churnguard_model=debug"
    } else {
        "churnguard=info,churnguard_cli=info,churnguard_model=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
