//! Gemini Provider
//!
//! Implementation of the GenerationProvider trait for Google's Gemini API.
//! Documents travel as `file_data` parts referencing already-uploaded file
//! URIs, so the engine never streams file bytes itself.

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::{missing_api_key_error, parse_http_error, GenerationProvider};
use super::types::{DocumentAttachment, LlmError, LlmResult, ProviderConfig};

/// Default Gemini API endpoint
const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider
pub struct GeminiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider with the given configuration
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Get the API base URL
    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(GEMINI_API_URL)
    }

    fn api_key(&self) -> LlmResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| missing_api_key_error("gemini"))
    }

    /// Build the generateContent request body
    fn build_request_body(
        &self,
        prompt: &str,
        documents: &[DocumentAttachment],
    ) -> serde_json::Value {
        let mut parts: Vec<serde_json::Value> = Vec::with_capacity(documents.len() + 1);

        for doc in documents {
            parts.push(serde_json::json!({
                "file_data": {
                    "file_uri": doc.uri,
                    "mime_type": doc.mime_type,
                }
            }));
        }
        parts.push(serde_json::json!({ "text": prompt }));

        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": parts,
            }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_tokens,
            }
        })
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(
        &self,
        prompt: &str,
        documents: &[DocumentAttachment],
    ) -> LlmResult<String> {
        let api_key = self.api_key()?;
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url(),
            self.config.model
        );
        let body = self.build_request_body(prompt, documents);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_http_error(status, &text, "gemini"));
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| LlmError::Other {
                message: format!("Failed to decode Gemini response: {}", e),
            })?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LlmError::EmptyCompletion);
        }

        Ok(text)
    }

    async fn health_check(&self) -> LlmResult<()> {
        let api_key = self.api_key()?;
        let url = format!("{}/models/{}", self.base_url(), self.config.model);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        if status != 200 {
            let text = response.text().await.unwrap_or_default();
            return Err(parse_http_error(status, &text, "gemini"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_orders_documents_before_prompt() {
        let provider = GeminiProvider::new(ProviderConfig {
            api_key: Some("key".to_string()),
            ..Default::default()
        });
        let docs = vec![DocumentAttachment {
            uri: "files/abc".to_string(),
            mime_type: "application/pdf".to_string(),
        }];
        let body = provider.build_request_body("analyze this", &docs);
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["file_data"]["file_uri"], "files/abc");
        assert_eq!(parts[1]["text"], "analyze this");
    }

    #[test]
    fn test_missing_api_key() {
        let provider = GeminiProvider::new(ProviderConfig::default());
        assert!(matches!(
            provider.api_key(),
            Err(LlmError::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn test_decode_candidates() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"hello "},{"text":"world"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        assert_eq!(text, "hello world");
    }
}
