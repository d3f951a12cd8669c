// =============================================================================
// GEMINI CLIENT - Google AI Studio API Integration
// =============================================================================
//
// Implements `AiProvider` against the Gemini `generateContent` endpoint
// (https://ai.google.dev/api/generate-content).
//
// **Request shape:**
// Every question is one stateless request with a single "user" content whose
// parts are the instruction texts followed by the documents as inline data.
// Inline data is base64-encoded in the JSON body.
//
// **Authentication:**
// The API key is passed as a query parameter (`?key=API_KEY`). The key is
// supplied per call because the operator can change it while the session runs.

use crate::core::ai::{AiProvider, ContentPart};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// =============================================================================
// GEMINI API DATA STRUCTURES
// =============================================================================

/// A single part of content: either text or an inline blob.
#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,

    /// Set on parts that carry the model's reasoning instead of the answer.
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    /// Base64 of the raw bytes.
    data: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    /// "user" or "model". Gemini may omit it on blocked candidates.
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,

    #[allow(dead_code)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

/// Error response from the Gemini API.
#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[allow(dead_code)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

// =============================================================================
// GEMINI CLIENT IMPLEMENTATION
// =============================================================================

/// Client for Google's Gemini API.
pub struct GeminiClient {
    client: Client,
    base_url: String,
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GeminiClient {
    pub fn new() -> Self {
        Self::with_base_url(API_BASE)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    fn convert_part(part: &ContentPart) -> Part {
        match part {
            ContentPart::Text(text) => Part {
                text: Some(text.clone()),
                ..Default::default()
            },
            ContentPart::InlineData { mime_type, data } => Part {
                inline_data: Some(Blob {
                    mime_type: mime_type.clone(),
                    data: BASE64.encode(data),
                }),
                ..Default::default()
            },
        }
    }

    fn build_request(parts: &[ContentPart]) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: parts.iter().map(Self::convert_part).collect(),
            }],
        }
    }

    /// Joins the answer text of the first candidate, skipping thought parts.
    fn extract_answer(response: GenerateContentResponse) -> Result<String, Box<dyn Error + Send + Sync>> {
        let content = response
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .ok_or(
                "No content in Gemini response - the model may have been blocked by safety filters",
            )?;

        let text: Vec<String> = content
            .parts
            .into_iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text)
            .collect();

        if text.is_empty() {
            return Err("Gemini response contained no text".into());
        }
        Ok(text.join(""))
    }
}

#[async_trait]
impl AiProvider for GeminiClient {
    async fn generate(
        &self,
        api_key: &str,
        model: &str,
        parts: &[ContentPart],
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let request = Self::build_request(parts);

        // Never log the key.
        tracing::debug!("Gemini request to model {}: {} part(s)", model, parts.len());

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(&error_text) {
                return Err(format!(
                    "Gemini API error ({}): {}",
                    status, error_response.error.message
                )
                .into());
            }

            return Err(format!("Gemini API error: {} - {}", status, error_text).into());
        }

        let response_json: GenerateContentResponse = response.json().await?;
        let answer = Self::extract_answer(response_json)?;

        tracing::debug!("Gemini response received: {} chars", answer.len());
        Ok(answer)
    }
}

// =============================================================================
// TESTS
// =============================================================================
