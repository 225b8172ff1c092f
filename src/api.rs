use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{ApiConfig, ProcessingConfig};
use crate::error::GenerationError;

// Anything that turns a prompt into free text
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    // Raw reply text; empty when the reply had none
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError>;

    fn service_name(&self) -> &'static str;

    fn model(&self) -> &str;

    fn is_configured(&self) -> bool;
}

// Gemini generateContent request body
#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

// Gemini generateContent response; every level may be missing
#[derive(Debug, Deserialize, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentRequest {
    pub fn from_prompt(prompt: &str) -> Self {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

impl GenerateContentResponse {
    // candidates[0].content.parts[0].text, or "" when any step is absent
    pub fn text(&self) -> &str {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .and_then(|p| p.text.as_deref())
            .unwrap_or("")
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    processing: ProcessingConfig,
}

impl GeminiClient {
    pub fn new(api: &ApiConfig, processing: &ProcessingConfig, api_key: &str) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(processing.request_timeout_seconds))
            .build()?;

        Ok(GeminiClient {
            client,
            api_key: api_key.to_string(),
            model: api.model.clone(),
            base_url: api.base_url.trim_end_matches('/').to_string(),
            processing: processing.clone(),
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    async fn request_once(
        &self,
        request: &GenerateContentRequest,
    ) -> std::result::Result<GenerateContentResponse, String> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "Gemini API request failed: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("")
            )
            .trim_end()
            .to_string());
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| e.to_string())
    }

    // Retries with a linearly growing delay; the last failure is reported
    async fn request_with_retry(
        &self,
        request: &GenerateContentRequest,
    ) -> std::result::Result<GenerateContentResponse, String> {
        let mut last_error = None;

        for attempt in 0..=self.processing.max_retries {
            if attempt > 0 {
                let delay =
                    Duration::from_millis(self.processing.request_delay_ms * (attempt as u64 + 1));
                tracing::warn!(
                    "retry {}/{} after {:?}",
                    attempt,
                    self.processing.max_retries,
                    delay
                );
                sleep(delay).await;
            }

            match self.request_once(request).await {
                Ok(response) => {
                    if attempt > 0 {
                        tracing::info!("request succeeded after {} retries", attempt);
                    }
                    return Ok(response);
                }
                Err(e) => {
                    tracing::warn!("attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| "all retries failed".to_string()))
    }
}

#[async_trait]
impl ContentGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        if !self.is_configured() {
            return Err(GenerationError::RequestError(
                "Gemini API key is not configured".to_string(),
            ));
        }

        let request = GenerateContentRequest::from_prompt(prompt);
        let response = self
            .request_with_retry(&request)
            .await
            .map_err(GenerationError::RequestError)?;

        Ok(response.text().to_string())
    }

    fn service_name(&self) -> &'static str {
        Provider::Gemini.as_str()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// Supported content-generation providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

pub struct ProviderInfo {
    pub name: &'static str,
    pub provider: Provider,
    pub default_model: &'static str,
    pub available_models: &'static [&'static str],
    pub description: &'static str,
}

static GEMINI_INFO: ProviderInfo = ProviderInfo {
    name: "Google Gemini",
    provider: Provider::Gemini,
    default_model: "gemini-2.0-flash",
    available_models: &["gemini-2.0-flash", "gemini-1.5-pro", "gemini-1.5-flash"],
    description: "Google's multimodal AI model for text generation",
};

impl Provider {
    pub const DEFAULT: Provider = Provider::Gemini;

    pub fn all() -> &'static [Provider] {
        &[Provider::Gemini]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
        }
    }

    pub fn info(&self) -> &'static ProviderInfo {
        match self {
            Provider::Gemini => &GEMINI_INFO,
        }
    }

    pub fn is_supported(name: &str) -> bool {
        name.parse::<Provider>().is_ok()
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gemini" => Ok(Provider::Gemini),
            other => anyhow::bail!("Unsupported LLM service type: {}", other),
        }
    }
}

// Build the configured provider's client for the given key
pub fn create_generator(
    api: &ApiConfig,
    processing: &ProcessingConfig,
    api_key: &str,
) -> Result<Box<dyn ContentGenerator>> {
    let provider: Provider = api.provider.parse()?;
    match provider {
        Provider::Gemini => Ok(Box::new(GeminiClient::new(api, processing, api_key)?)),
    }
}
