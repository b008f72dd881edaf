//! Speech-to-text and the voice intake path.
//!
//! A voice note is transcribed, then handed to the same multi-intent parser
//! as typed text. Transcription failures are never papered over.

pub mod whisper;

pub use whisper::WhisperTranscriber;

use crate::llm::ProviderError;
use crate::models::{ParseContext, ParsedIntentBundle};
use crate::parser::IntentParser;
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;

/// Extensions the transcription endpoint accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["mp3", "mp4", "mpeg", "mpga", "m4a", "wav", "webm", "ogg", "flac", "oga"];

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("failed to read audio: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("audio file is empty")]
    EmptyAudio,
    #[error("transcription produced no text")]
    EmptyTranscript,
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// An uploaded audio clip held in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioInput {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AudioInput {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), bytes }
    }

    pub async fn from_path(path: &Path) -> Result<Self, TranscriptionError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();
        Ok(Self { file_name, bytes })
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    /// Reject clips the endpoint would refuse anyway.
    pub fn validate(&self) -> Result<(), TranscriptionError> {
        match self.extension() {
            Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) => {}
            _ => return Err(TranscriptionError::UnsupportedFormat(self.file_name.clone())),
        }
        if self.bytes.is_empty() {
            return Err(TranscriptionError::EmptyAudio);
        }
        Ok(())
    }
}

/// Trait for speech-to-text backends.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioInput) -> Result<String, TranscriptionError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

/// Transcribe, then parse.
pub struct VoiceIntake {
    transcriber: Arc<dyn Transcriber>,
    parser: Arc<dyn IntentParser>,
}

impl VoiceIntake {
    pub fn new(transcriber: Arc<dyn Transcriber>, parser: Arc<dyn IntentParser>) -> Self {
        Self { transcriber, parser }
    }

    pub async fn process(
        &self,
        audio: &AudioInput,
        context: ParseContext,
    ) -> Result<ParsedIntentBundle, TranscriptionError> {
        audio.validate()?;
        debug!("Transcribing {} ({} bytes) with {}", audio.file_name, audio.bytes.len(), self.transcriber.name());

        let transcript = self.transcriber.transcribe(audio).await?;
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(TranscriptionError::EmptyTranscript);
        }
        info!("Transcribed voice note: {}", transcript);

        Ok(self.parser.parse(&context.into_request(transcript)).await)
    }
}
