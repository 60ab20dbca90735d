use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, error, info};

use super::openai_error;
use crate::error::ServiceError;
use crate::transcription::SpeechToText;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    language: Option<String>,
}

impl OpenAIProvider {
    pub fn new(api_key: String, api_base: &str, model: &str, language: Option<String>) -> Self {
        let endpoint = format!("{}/audio/transcriptions", api_base.trim_end_matches('/'));
        info!(
            "Initialized OpenAI transcription provider with endpoint: {} (model {})",
            endpoint, model
        );
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint,
            model: model.to_string(),
            language,
        }
    }
}

fn mime_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("flac") => "audio/flac",
        Some("ogg") => "audio/ogg",
        Some("opus") => "audio/opus",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl SpeechToText for OpenAIProvider {
    fn name(&self) -> &'static str {
        "OpenAI API"
    }

    async fn transcribe(&self, audio_path: &Path) -> Result<String, ServiceError> {
        info!("Transcribing audio file via OpenAI API: {:?}", audio_path);

        let audio = tokio::fs::read(audio_path).await?;
        let file_name = audio_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();
        let part = Part::bytes(audio)
            .file_name(file_name)
            .mime_str(mime_type_for(audio_path))?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", part);
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!(
                "OpenAI transcription request failed with status {}: {}",
                status, body
            );
            return Err(openai_error(status, &body));
        }

        let transcription: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Decode(format!("transcription response: {e}")))?;

        let text = transcription.text.trim().to_string();
        info!("Transcription complete: {} chars", text.len());
        debug!("Raw transcription: {}", text);
        Ok(text)
    }
}
