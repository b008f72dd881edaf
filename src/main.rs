use anyhow::Result;
use clap::Parser;
use hearth::cli::Cli;
use hearth::env_manager;
use log::warn;

#[tokio::main]
async fn main() -> Result<()> {
    hearth::init_logger();

    if let Err(e) = env_manager::load_env_file() {
        warn!("Could not prepare .env file: {}", e);
    }
    if !env_manager::check_env_vars() {
        warn!("Language model calls will fail until the missing keys are set");
    }

    let cli = Cli::parse();
    hearth::run(cli).await
}
