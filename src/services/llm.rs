use std::fmt::Debug;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// Text-chat client used for drafting scripts. Image generation goes through
// services::image; this one only ever returns prose.
#[async_trait]
pub trait LlmClient: Send + Sync + Debug {
    async fn chat(&self, system: &str, user: &str) -> Result<String>;
}

// The script prompt was tuned against this sampling temperature.
const DRAFT_TEMPERATURE: f64 = 0.7;

#[derive(Debug)]
pub struct GeminiTextClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiTextClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    contents: Vec<RequestContent>,
    #[serde(rename = "systemInstruction")]
    system_instruction: SystemInstruction,
    #[serde(rename = "generationConfig")]
    generation_config: RequestGenerationConfig,
}

#[derive(Serialize)]
struct RequestContent {
    role: String,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Serialize)]
struct RequestGenerationConfig {
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    candidates: Option<Vec<ResponseCandidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: String,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

fn chat_request(system: &str, user: &str) -> ChatRequest {
    ChatRequest {
        contents: vec![RequestContent {
            role: "user".to_string(),
            parts: vec![RequestPart {
                text: user.to_string(),
            }],
        }],
        system_instruction: SystemInstruction {
            parts: vec![RequestPart {
                text: system.to_string(),
            }],
        },
        generation_config: RequestGenerationConfig {
            temperature: DRAFT_TEMPERATURE,
        },
    }
}

fn extract_reply(response: ChatResponse) -> Result<String> {
    if let Some(err) = response.error {
        bail!("Gemini API returned an error: {}", err.message);
    }

    let Some(candidate) = response.candidates.unwrap_or_default().into_iter().next() else {
        bail!("Gemini reply carried no candidates");
    };

    if let Some(part) = candidate.content.and_then(|c| c.parts.into_iter().next()) {
        return Ok(part.text);
    }

    // Content or parts missing, usually a safety block.
    let reason = candidate.finish_reason.as_deref().unwrap_or("UNKNOWN");
    bail!("Gemini reply carried no text. Finish reason: {}", reason)
}

#[async_trait]
impl LlmClient for GeminiTextClient {
    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let resp = self
            .client
            .post(&url)
            .json(&chat_request(system, user))
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            bail!("Gemini chat failed with status {}: {}", status, body);
        }

        let response: ChatResponse = serde_json::from_str(&body)
            .with_context(|| format!("Gemini reply was not the expected JSON. Body: {}", body))?;
        extract_reply(response)
    }
}
