//! stargal - Main Entry Point

use clap::Parser;
use stargal::cli::{cmd_apply, cmd_train, ApplyArgs, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stargal=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { data, methods, model } => {
            cmd_train(&data, &methods, &model)?;
        }
        Commands::Apply {
            data,
            methods,
            threshold,
            std_cut,
            mag_min,
            mag_max,
            mag_width,
            output_dir,
            threads,
            model,
        } => {
            cmd_apply(ApplyArgs {
                data: &data,
                methods: methods.as_deref(),
                threshold,
                std_cut,
                mag_min,
                mag_max,
                mag_width,
                output_dir: output_dir.as_deref(),
                threads,
                model: &model,
            })?;
        }
    }

    Ok(())
}
