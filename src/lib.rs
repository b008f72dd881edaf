pub mod api_server;
pub mod app;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod env_manager;
pub mod llm;
pub mod models;
pub mod parser;
pub mod profile;
pub mod services;
pub mod state;
pub mod transcription;

use anyhow::Result;
use env_logger::Env;
use log::*;
use std::sync::Arc;

/// Dispatch the parsed command line. No subcommand starts the terminal.
pub async fn run(cli: cli::Cli) -> Result<()> {
    let config = Config::load()?;
    match cli.command {
        Some(command) => app::execute(command, config).await,
        None => {
            info!("Initializing Hearth application");
            let services = Arc::new(services::Services::from_config(&config)?);
            app::Application::new(services).run().await
        }
    }
}

pub fn init_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

// Re-export commonly used types
pub use config::Config;
pub use models::{ParseRequest, ParsedIntentBundle};
pub use parser::{IntentParser, MultiIntentParser};
pub use profile::PreferenceLearner;
