use log::{info, warn};
use secrecy::SecretString;
use std::env;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

pub const REQUIRED_ENV_VARS: &[&str] = &["OPENAI_API_KEY"];

// Only needed by the event discovery assistant
pub const OPTIONAL_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "HEARTH_CONFIG_PATH", "RUST_LOG"];

/// Report missing required variables. Returns false if any is absent.
pub fn check_env_vars() -> bool {
    let mut all_present = true;

    for var in REQUIRED_ENV_VARS {
        match env::var(var) {
            Ok(val) if !val.trim().is_empty() => (),
            _ => {
                warn!("Missing required environment variable: {}", var);
                all_present = false;
            }
        }
    }

    all_present
}

pub fn load_env_file() -> io::Result<()> {
    match dotenvy::dotenv() {
        Ok(path) => {
            info!("Loaded environment from {:?}", path);
            Ok(())
        }
        Err(e) => {
            info!("No .env file found or error loading it: {}", e);
            create_env_template()
        }
    }
}

fn create_env_template() -> io::Result<()> {
    let env_path = PathBuf::from(".env");

    // Don't overwrite existing .env file
    if env_path.exists() {
        return Ok(());
    }

    let mut file = File::create(env_path)?;

    for var in REQUIRED_ENV_VARS {
        writeln!(file, "{}=", var)?;
    }

    for var in OPTIONAL_ENV_VARS {
        writeln!(file, "# {}=", var)?;
    }

    Ok(())
}

/// Read an API key, treating blank values as missing.
pub fn api_key(name: &str) -> Option<SecretString> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Some(SecretString::from(value.trim().to_string())),
        _ => None,
    }
}
