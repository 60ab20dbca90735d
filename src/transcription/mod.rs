use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use crate::config::OpenAIConfig;
use crate::error::{ConfigError, ServiceError};

pub mod providers;

pub use providers::OpenAIProvider;

/// Speech-to-text backend. One call per audio file below the payload ceiling.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    fn name(&self) -> &'static str;

    async fn transcribe(&self, audio_path: &Path) -> Result<String, ServiceError>;
}

/// Transcribe `files` one after another and join the texts with a single space.
pub async fn transcribe_in_order<P: AsRef<Path>>(
    speech: &dyn SpeechToText,
    files: &[P],
) -> Result<String, ServiceError> {
    let mut parts = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        if files.len() > 1 {
            info!(
                "Transcribing chunk {}/{}: {:?}",
                index + 1,
                files.len(),
                file.as_ref()
            );
        }
        parts.push(speech.transcribe(file.as_ref()).await?);
    }
    Ok(parts.join(" "))
}

pub fn provider_from_config(config: &OpenAIConfig) -> Result<OpenAIProvider, ConfigError> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| ConfigError::Missing(vec![crate::config::env_keys::OPENAI_API_KEY]))?;
    Ok(OpenAIProvider::new(
        api_key,
        &config.api_base,
        &config.transcription_model,
        config.language.clone(),
    ))
}
