use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Overrides the location of `config.toml`.
pub const CONFIG_PATH_VAR: &str = "HEARTH_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub language_model: LanguageModelConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    OpenAI,
    Gemini,
}

impl Default for LLMProvider {
    fn default() -> Self {
        LLMProvider::OpenAI
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageModelConfig {
    pub provider: LLMProvider,
    pub model: String,
    pub api_base: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for LanguageModelConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            request_timeout_secs: 60,
        }
    }
}

/// Backend for event discovery. Only Gemini can ground answers in web search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub provider: LLMProvider,
    pub model: String,
    pub api_base: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Gemini,
            model: "gemini-flash-latest".to_string(),
            api_base: None,
            request_timeout_secs: 120,
        }
    }
}

impl AssistantConfig {
    pub fn backend(&self) -> LanguageModelConfig {
        LanguageModelConfig {
            provider: self.provider,
            model: self.model.clone(),
            api_base: self.api_base.clone(),
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Independent of `language_model`; switching the parser leaves this alone.
    pub provider: LLMProvider,
    pub model: String,
    pub api_base: Option<String>,
    pub request_timeout_secs: u64,
    /// Total attempts per event, including the first one.
    pub max_retries: u32,
    /// First backoff delay; doubled after every failed attempt.
    pub base_delay_ms: u64,
    /// Custom taxonomy. The built-in ten categories are used when absent.
    pub labels: Option<Vec<String>>,
    pub cache_path: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::OpenAI,
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            request_timeout_secs: 60,
            max_retries: 3,
            base_delay_ms: 1000,
            labels: None,
            cache_path: None,
        }
    }
}

impl ClassifierConfig {
    pub fn backend(&self) -> LanguageModelConfig {
        LanguageModelConfig {
            provider: self.provider,
            model: self.model.clone(),
            api_base: self.api_base.clone(),
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub model: String,
    pub api_base: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self { model: "whisper-1".to_string(), api_base: None, request_timeout_secs: 120 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where learned profile attributes are kept. Defaults to the data dir.
    pub profile_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:3000".to_string() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            language_model: LanguageModelConfig::default(),
            classifier: ClassifierConfig::default(),
            transcription: TranscriptionConfig::default(),
            assistant: AssistantConfig::default(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = get_config_path()?;

        // If config doesn't exist, create default
        if !config_path.exists() {
            let default_config = Config::default();
            default_config.save()?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(&config_path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Resolved location of the profile attribute store.
    pub fn profile_path(&self) -> Result<PathBuf> {
        match &self.storage.profile_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("profile_attributes.json")),
        }
    }

    /// Resolved location of the classification cache.
    pub fn classifier_cache_path(&self) -> Result<PathBuf> {
        match &self.classifier.cache_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("event_class_cache.json")),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "hearth", "hearth").context("Failed to determine project directories")
}

pub fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}
