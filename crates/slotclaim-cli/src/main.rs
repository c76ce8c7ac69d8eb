use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use slotclaim_core::FileConfigStore;

mod cli;
mod commands;
mod logging;

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_file, cli.verbose);

    // explicit --config > SLOTCLAIM_CONFIG > ./slotclaim.toml
    let store = Arc::new(FileConfigStore::resolve(cli.config.as_deref()));

    match cli.command {
        Command::Configure(args) => commands::configure(&store, args),
        Command::ShowConfig => commands::show_config(&store),
        Command::Stop => commands::stop(&store),
        Command::RunOnce(args) => commands::run_once(store, args).await,
        Command::Start { run_now, job } => commands::start(store, run_now, job).await,
    }
}
