//! fraudbench - Main Entry Point

use clap::Parser;
use fraudbench::cli::{cmd_evaluate, cmd_info, resolve_config, Cli, Commands};

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fraudbench=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Evaluate { data, config, sample_fraction, seed, contamination, parallel, json } => {
            let config = resolve_config(config.as_deref(), sample_fraction, seed, contamination, parallel)?;
            cmd_evaluate(&data, &config, json)?;
        }
        Commands::Info { data, config, column } => {
            let config = resolve_config(config.as_deref(), None, None, None, false)?;
            cmd_info(&data, &config, &column)?;
        }
    }

    Ok(())
}
