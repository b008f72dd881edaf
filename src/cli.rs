use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Hearth - family calendar assistant for events, chores and shopping lists
#[derive(Debug, Parser)]
#[command(name = "hearth")]
#[command(about = "Family calendar assistant: turn everyday language into events, chores and shopping items", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute (if not specified, enters interactive terminal mode)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Parse a sentence into events, chores and shopping items
    Parse {
        /// The text to parse
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Transcribe an audio file and parse it
    Voice {
        /// Path to the audio file (mp3, m4a, wav, webm, ...)
        #[arg(required = true)]
        path: PathBuf,

        #[command(flatten)]
        context: ContextArgs,
    },

    /// Categorise an event into the configured taxonomy
    Classify {
        /// Event title
        #[arg(required = true)]
        title: String,

        /// Event description
        #[arg(long)]
        description: Option<String>,
    },

    /// Record a saved item so preferences can be learned
    Learn {
        #[arg(long = "user-id")]
        user_id: i64,

        /// Kind of item that was saved
        #[arg(long, value_enum, default_value_t = SavedKind::Event)]
        kind: SavedKind,

        /// Where the event takes place
        #[arg(long)]
        location: Option<String>,

        /// Event category, e.g. Soccer
        #[arg(long)]
        category: Option<String>,
    },

    /// Show the preferences that are fed into prompts
    Profile {
        #[arg(required = true)]
        user_id: i64,
    },

    /// Search the web for upcoming events
    #[command(alias = "search")]
    Discover {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Family member, as "Name" or "Name=Address" (repeatable)
        #[arg(long = "member")]
        members: Vec<String>,
    },

    /// Start the HTTP API server
    Serve {
        /// Address to bind, overrides the configured one
        #[arg(long)]
        bind: Option<String>,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Debug, Clone, Default, clap::Args)]
pub struct ContextArgs {
    /// Apply this user's learned preferences
    #[arg(long = "user-id")]
    pub user_id: Option<i64>,

    /// Home address used for travel hints
    #[arg(long = "home-address")]
    pub home_address: Option<String>,

    /// Resolve relative dates against this day (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SavedKind {
    Event,
    Chore,
    Shopping,
}

#[derive(Debug, Subcommand)]
pub enum ConfigActions {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Set a configuration value
    Set {
        #[arg(value_enum)]
        key: ConfigKey,

        value: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Parsing backend: openai or gemini
    Provider,
    /// Parsing model name
    Model,
    /// Classifier model name
    ClassifierModel,
    /// HTTP bind address
    Bind,
}
