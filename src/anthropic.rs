use crate::error::AnalyzerError;
use crate::models::{FileComplexity, ScorePolicy};
use crate::provider::{
    parse_assessment, user_prompt, ComplexityProvider, ProviderSettings, SYSTEM_PROMPT,
};
use crate::utils::truncate_chars;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude has a larger window, so more of the file is kept.
pub const MAX_CONTENT_CHARS: usize = 20_000;

const MAX_OUTPUT_TOKENS: u32 = 4096;
const TEMPERATURE: f64 = 0.1;

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<RequestMessage>,
}

#[derive(Serialize)]
struct RequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic messages-API backend.
pub struct AnthropicProvider {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    policy: ScorePolicy,
}

impl AnthropicProvider {
    pub fn new(settings: ProviderSettings, policy: ScorePolicy) -> Self {
        Self {
            client: Client::new(),
            api_url: settings
                .base_url
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: settings.api_key,
            model: settings.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            policy,
        }
    }
}

#[async_trait]
impl ComplexityProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze_file(
        &self,
        file_content: &str,
        file_path: &str,
    ) -> Result<FileComplexity, AnalyzerError> {
        let endpoint = format!("{}/v1/messages", self.api_url.trim_end_matches('/'));
        info!("Sending {} to {}", file_path, endpoint);

        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
            system: SYSTEM_PROMPT,
            messages: vec![RequestMessage {
                role: "user",
                content: user_prompt(file_path, truncate_chars(file_content, MAX_CONTENT_CHARS)),
            }],
        };

        let resp = self
            .client
            .post(&endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| AnalyzerError::transport(None, e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!("Anthropic error response for {}: {}", file_path, text);
            return Err(AnalyzerError::transport(Some(status.as_u16()), text));
        }

        let response_text = resp
            .text()
            .await
            .map_err(|e| AnalyzerError::transport(None, e.to_string()))?;
        debug!("Anthropic response: {}", response_text);
        let parsed: MessagesResponse = serde_json::from_str(&response_text)
            .map_err(|e| AnalyzerError::ProviderResponse(format!("malformed message: {}", e)))?;
        let content: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();
        if content.trim().is_empty() {
            return Err(AnalyzerError::ProviderResponse(
                "message has no text content".to_string(),
            ));
        }

        parse_assessment(&content, file_path, &self.policy)
    }
}
