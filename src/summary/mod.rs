//! Transcript summarization through a text-generation service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::OpenAIConfig;
use crate::error::{ConfigError, ServiceError};
use crate::transcription::providers::openai_error;

/// Instruction sent with every transcript.
pub const SUMMARY_INSTRUCTIONS: &str = "\
You are an assistant that summarizes transcripts of recorded meetings. \
Provide a concise summary of the following transcript. \
Include a key points section that lists the key points discussed as bullet points. \
The last section must be the whole transcript, inserted verbatim. \
Base everything on the transcript provided and do not make up any information. \
Format the result as Markdown, without wrapping it in a code fence.";

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(&self, instructions: &str, input: &str) -> Result<String, ServiceError>;
}

/// Summarize one transcript with the fixed instruction template.
pub async fn summarize(
    generator: &dyn TextGenerator,
    transcript: &str,
) -> Result<String, ServiceError> {
    let summary = generator.generate(SUMMARY_INSTRUCTIONS, transcript).await?;
    Ok(strip_code_fence(&summary))
}

/// Remove a single enclosing ```` ``` ```` fence if the model added one anyway.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return trimmed.to_string();
    };
    if inner.contains("```") {
        return trimmed.to_string();
    }
    match inner.split_once('\n') {
        Some((lang, body)) if !lang.contains(' ') => body.trim().to_string(),
        _ => inner.trim().to_string(),
    }
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    instructions: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// OpenAI Responses API.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl OpenAIGenerator {
    pub fn new(api_key: String, api_base: &str, model: &str) -> Self {
        let endpoint = format!("{}/responses", api_base.trim_end_matches('/'));
        info!(
            "Initialized OpenAI summary generator with endpoint: {} (model {})",
            endpoint, model
        );
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint,
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &OpenAIConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::Missing(vec![crate::config::env_keys::OPENAI_API_KEY]))?;
        Ok(Self::new(api_key, &config.api_base, &config.summary_model))
    }
}

#[async_trait]
impl TextGenerator for OpenAIGenerator {
    fn name(&self) -> &'static str {
        "OpenAI Responses API"
    }

    async fn generate(&self, instructions: &str, input: &str) -> Result<String, ServiceError> {
        debug!("Requesting summary for {} chars of input", input.len());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&ResponsesRequest {
                model: &self.model,
                instructions,
                input,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            error!(
                "OpenAI responses request failed with status {}: {}",
                status, body
            );
            return Err(openai_error(status, &body));
        }

        let parsed: ResponsesResponse = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Decode(format!("responses body: {e}")))?;
        let text: String = parsed
            .output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .map(|part| part.text.as_str())
            .collect();

        if text.trim().is_empty() {
            return Err(ServiceError::Decode(
                "response contained no output text".to_string(),
            ));
        }
        info!("Summary generated: {} chars", text.len());
        Ok(text)
    }
}
