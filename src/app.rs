use crate::cli::{Commands, ConfigActions, ConfigKey, ContextArgs, SavedKind};
use crate::classifier::EventRecord;
use crate::config::{get_config_path, Config, LLMProvider};
use crate::discovery::{DiscoveryRequest, FamilyMember};
use crate::models::{ActionObservation, ObservationKind, ParsedIntentBundle};
use crate::services::Services;
use crate::transcription::AudioInput;
use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDate};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Human-readable summary of a parsed bundle.
pub fn render_bundle(bundle: &ParsedIntentBundle) -> String {
    if bundle.is_empty() {
        return "Nothing to add.".to_string();
    }

    let mut lines = Vec::new();
    for event in &bundle.events {
        let mut line = format!(
            "📅 {} on {} {}-{}",
            event.title().unwrap_or("(untitled)"),
            event.date().unwrap_or("?"),
            event.start_time().unwrap_or("?"),
            event.end_time().unwrap_or("?")
        );
        if let Some(location) = event.location() {
            line.push_str(&format!(" @ {}", location));
        }
        lines.push(line);
    }
    for chore in &bundle.chores {
        let mut line = format!("🧹 {}", chore.title().unwrap_or("(untitled)"));
        if let Some(who) = chore.assigned_to() {
            line.push_str(&format!(" for {}", who));
        }
        if let Some(due) = chore.due_date() {
            line.push_str(&format!(" by {}", due));
        }
        lines.push(line);
    }
    for item in &bundle.shopping_items {
        lines.push(format!("🛒 {}", item.name().unwrap_or("(unnamed)")));
    }
    lines.join("\n")
}

/// Parse `Name` or `Name=Address`.
pub fn parse_member(spec: &str) -> FamilyMember {
    match spec.split_once('=') {
        Some((name, address)) => FamilyMember {
            name: name.trim().to_string(),
            address: Some(address.trim().to_string()).filter(|a| !a.is_empty()),
        },
        None => FamilyMember { name: spec.trim().to_string(), address: None },
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub struct Application {
    services: Arc<Services>,
    user_id: Option<i64>,
    home_address: Option<String>,
}

impl Application {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services, user_id: None, home_address: None }
    }

    /// Interactive terminal: every line that is not a command gets parsed.
    pub async fn run(&mut self) -> Result<()> {
        log::info!("Starting Hearth Terminal");
        let mut rl = DefaultEditor::new()?;

        println!("Welcome to Hearth! Tell me what's coming up for the family.");
        println!("Example: Soccer practice Tuesday at 5, remind Sam to walk the dog, and we need milk");
        println!("Type 'help' for commands.");

        loop {
            match rl.readline("🏠 ") {
                Ok(line) => {
                    let _ = rl.add_history_entry(line.as_str());
                    match self.process_input(&line).await {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(err) => log::error!("Failed to process input: {:?}", err),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Returns `false` when the session should end.
    async fn process_input(&mut self, input: &str) -> Result<bool> {
        let trimmed = input.trim();
        let (word, rest) = trimmed.split_once(' ').unwrap_or((trimmed, ""));

        match word.to_ascii_lowercase().as_str() {
            "" => {}
            "exit" | "quit" => return Ok(false),
            "help" => {
                println!("Commands:");
                println!("  user <id>         apply a user's learned preferences");
                println!("  home <address>    set the home address hint");
                println!("  profile           show the active user's preferences");
                println!("  exit              leave the terminal");
                println!("Anything else is parsed as a family request.");
            }
            "user" => {
                let id = rest.trim().parse::<i64>().map_err(|_| anyhow!("Usage: user <id>"))?;
                self.user_id = Some(id);
                println!("Using preferences for user {}", id);
            }
            "home" => {
                self.home_address = Some(rest.trim().to_string()).filter(|a| !a.is_empty());
                println!("Home address set");
            }
            "profile" => {
                let id = self.user_id.ok_or_else(|| anyhow!("Set a user first: user <id>"))?;
                let lines = self.services.profile_lines(id).await?;
                if lines.is_empty() {
                    println!("No confident preferences yet.");
                }
                for line in lines {
                    println!("{}", line);
                }
            }
            _ => {
                let bundle = self
                    .services
                    .interact(trimmed, self.user_id, self.home_address.clone(), today())
                    .await;
                println!("{}", render_bundle(&bundle));
            }
        }
        Ok(true)
    }
}

async fn context_for(services: &Services, args: ContextArgs) -> crate::models::ParseContext {
    services
        .parse_context(args.user_id, args.home_address, args.date.unwrap_or_else(today))
        .await
}

/// Run a one-shot subcommand.
pub async fn execute(command: Commands, mut config: Config) -> Result<()> {
    match command {
        Commands::Config { action } => return execute_config(action, &mut config),
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            return crate::api_server::start_api_server(config).await;
        }
        _ => {}
    }

    let services = Services::from_config(&config)?;
    match command {
        Commands::Parse { text, context } => {
            let query = text.join(" ");
            let request = context_for(&services, context).await.into_request(query);
            let bundle = services.parser.parse(&request).await;
            print_json(&bundle)?;
        }
        Commands::Voice { path, context } => {
            let audio = AudioInput::from_path(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let context = context_for(&services, context).await;
            let bundle = services.voice.process(&audio, context).await?;
            print_json(&bundle)?;
        }
        Commands::Classify { title, description } => {
            let label = services.classifier.classify(&EventRecord::new(title, description)).await;
            println!("{}", label);
        }
        Commands::Learn { user_id, kind, location, category } => {
            let observation = ActionObservation {
                user_id,
                input_text: None,
                kind: match kind {
                    SavedKind::Event => ObservationKind::Event,
                    SavedKind::Chore => ObservationKind::Chore,
                    SavedKind::Shopping => ObservationKind::Shopping,
                },
                location,
                category,
            };
            let outcome = services.learn(observation).await?;
            println!("{:?}", outcome);
        }
        Commands::Profile { user_id } => {
            for line in services.profile_lines(user_id).await? {
                println!("{}", line);
            }
        }
        Commands::Discover { query, members } => {
            let request = DiscoveryRequest {
                query: query.join(" "),
                family: members.iter().map(|m| parse_member(m)).collect(),
                as_of: today(),
            };
            let result = services.assistant.search(&request).await?;
            println!("✅ Found {} suggestions:", result.suggestions.len());
            for (i, suggestion) in result.suggestions.iter().enumerate() {
                println!("{}. {}", i + 1, suggestion.display());
            }
            for source in &result.sources {
                println!("   source: {}", source.uri);
            }
        }
        Commands::Config { .. } | Commands::Serve { .. } => {}
    }
    Ok(())
}

fn execute_config(action: ConfigActions, config: &mut Config) -> Result<()> {
    match action {
        ConfigActions::Show => println!("{}", toml::to_string_pretty(&*config)?),
        ConfigActions::Path => println!("{}", get_config_path()?.display()),
        ConfigActions::Set { key, value } => {
            match key {
                ConfigKey::Provider => {
                    config.language_model.provider = match value.to_ascii_lowercase().as_str() {
                        "openai" => LLMProvider::OpenAI,
                        "gemini" => LLMProvider::Gemini,
                        other => return Err(anyhow!("Unknown provider '{}': use openai or gemini", other)),
                    };
                }
                ConfigKey::Model => config.language_model.model = value,
                ConfigKey::ClassifierModel => config.classifier.model = value,
                ConfigKey::Bind => config.server.bind = value,
            }
            config.save()?;
            println!("Configuration updated");
        }
    }
    Ok(())
}
