//! CLI entry point.

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use narrate_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    // stdout carries replay output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let ctx = bootstrap(&CliConfig { db_path: cli.db }).await?;

    match command {
        Commands::Replay {
            script,
            events_only,
        } => handlers::replay::execute(&ctx, &script, events_only).await,
        Commands::Progress { command } => handlers::progress::execute(&ctx, command).await,
        Commands::Settings { command } => handlers::settings::execute(&ctx, command).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {err:#}");
        let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
        std::process::exit(code);
    }
}
