use crate::error::AnalyzerError;
use crate::models::{FileComplexity, ScorePolicy};
use crate::provider::{
    parse_assessment, user_prompt, ComplexityProvider, ProviderSettings, SYSTEM_PROMPT,
};
use crate::utils::truncate_chars;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";

/// Characters of file content sent per request, before any token budgeting.
pub const MAX_CONTENT_CHARS: usize = 15_000;

const TEMPERATURE: f64 = 0.1;

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat-completions backend (also works with compatible endpoints).
pub struct OpenAiProvider {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    policy: ScorePolicy,
}

impl OpenAiProvider {
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
impl ComplexityProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn analyze_file(
        &self,
        file_content: &str,
        file_path: &str,
    ) -> Result<FileComplexity, AnalyzerError> {
        let endpoint = format!("{}/chat/completions", self.api_url.trim_end_matches('/'));
        info!("Sending {} to {}", file_path, endpoint);

        let code = truncate_chars(file_content, MAX_CONTENT_CHARS);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": user_prompt(file_path, code)
                }
            ],
            "temperature": TEMPERATURE,
            "response_format": { "type": "json_object" }
        });

        let resp = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalyzerError::transport(None, e.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            error!("OpenAI error response for {}: {}", file_path, text);
            return Err(AnalyzerError::transport(Some(status.as_u16()), text));
        }

        let response_text = resp
            .text()
            .await
            .map_err(|e| AnalyzerError::transport(None, e.to_string()))?;
        debug!("OpenAI response: {}", response_text);
        let chat_resp: ChatResponse = serde_json::from_str(&response_text)
            .map_err(|e| AnalyzerError::ProviderResponse(format!("malformed completion: {}", e)))?;
        let content = chat_resp
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AnalyzerError::ProviderResponse("completion has no content".to_string()))?;

        parse_assessment(&content, file_path, &self.policy)
    }
}
