mod cli;
mod commands;
mod config;
mod ui;
mod validation;

use clap::Parser;
use cli::{Cli, Commands};
use config::Settings;

fn init_logging(debug: bool, configured: &str) {
    let level = if debug { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    // A reset must work even when the current file no longer parses
    let settings = match &cli.command {
        Commands::Config { reset: true, .. } => Settings::default(),
        _ => Settings::load_or_create()?,
    };
    init_logging(cli.debug, &settings.logging.level);
    ui::configure(settings.ui.color, settings.ui.progress);

    match &cli.command {
        Commands::Install(args) => commands::install::install(args, &settings).await,
        Commands::Versions { server_type, limit } => {
            commands::versions::versions(*server_type, *limit, &settings).await
        }
        Commands::List => commands::list::list(&settings),
        Commands::System { json } => commands::system::system(*json, &settings).await,
        Commands::Cache { action } => commands::cache::cache(action, &settings),
        Commands::Config { show, reset } => commands::config::config(*show, *reset, &settings),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            ui::error(&format!("{:#}", e));
            1
        }
    };
    std::process::exit(code);
}
