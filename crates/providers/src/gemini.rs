//! Google Gemini provider implementation.
//!
//! Uses the Generative Language REST API directly:
//! - `models/{model}:generateContent` for chat turns
//! - `models/{model}:countTokens` for the tokenizer oracle
//!
//! Features:
//! - `x-goog-api-key` header authentication
//! - System instruction as a top-level field
//! - `model` role for assistant turns
//! - Thought parts are dropped from the reply text

use async_trait::async_trait;
use refchat_core::error::ProviderError;
use refchat_core::message::{Message, Role};
use refchat_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";

/// Gemini Generative Language API provider.
pub struct GeminiProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    /// Create a new Gemini provider with the given request timeout.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: "gemini".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        format!("{}/{}/models/{}:{}", self.base_url, API_VERSION, model, method)
    }

    /// Build the `generateContent` body.
    ///
    /// System messages in the history are folded into the system instruction,
    /// after `request.system_instruction`.
    fn build_body(request: &ProviderRequest) -> GenerateContentRequest<'_> {
        let mut system_parts: Vec<ApiPart<'_>> = Vec::new();
        if let Some(sys) = &request.system_instruction {
            system_parts.push(ApiPart { text: sys });
        }

        let mut contents = Vec::new();
        for msg in &request.messages {
            let role = match msg.role {
                Role::System => {
                    system_parts.push(ApiPart { text: &msg.content });
                    continue;
                }
                Role::User => "user",
                Role::Assistant => "model",
            };
            contents.push(ApiContent {
                role: Some(role),
                parts: vec![ApiPart { text: &msg.content }],
            });
        }

        let system_instruction = if system_parts.is_empty() {
            None
        } else {
            Some(ApiContent {
                role: None,
                parts: system_parts,
            })
        };

        let generation_config = if request.temperature.is_some() || request.max_tokens.is_some() {
            Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            })
        } else {
            None
        };

        GenerateContentRequest {
            system_instruction,
            contents,
            generation_config,
        }
    }

    /// POST a JSON body and map transport and status failures.
    async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status == 200 {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Gemini API error");
        Err(Self::status_error(status, error_body))
    }

    fn status_error(status: u16, body: String) -> ProviderError {
        match status {
            429 => ProviderError::RateLimited {
                retry_after_secs: 5,
            },
            401 | 403 => ProviderError::AuthenticationFailed("Invalid Gemini API key".into()),
            400 if body.contains("API_KEY_INVALID") => {
                ProviderError::AuthenticationFailed("Invalid Gemini API key".into())
            }
            404 => ProviderError::ModelNotFound(body),
            _ => ProviderError::ApiError {
                status_code: status,
                message: body,
            },
        }
    }

    /// Convert a `generateContent` response to our ProviderResponse.
    fn response_to_provider_response(
        resp: GenerateContentResponse,
        requested_model: &str,
    ) -> Result<ProviderResponse, ProviderError> {
        let candidate = resp.candidates.into_iter().next();

        let text = candidate
            .as_ref()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            let reason = resp
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .or_else(|| candidate.and_then(|c| c.finish_reason))
                .unwrap_or_else(|| "no candidates".into());
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: format!("Gemini returned no text ({reason})"),
            });
        }

        let usage = resp.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage,
            model: resp.model_version.unwrap_or_else(|| requested_model.to_string()),
        })
    }
}

#[async_trait]
impl refchat_core::Provider for GeminiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let url = self.endpoint(&request.model, "generateContent");
        let body = Self::build_body(&request);

        debug!(
            provider = "gemini",
            model = %request.model,
            turns = body.contents.len(),
            "Sending generateContent request"
        );

        let response = self.post(&url, &body).await?;
        let api_resp: GenerateContentResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse Gemini response: {e}"),
            })?;

        Self::response_to_provider_response(api_resp, &request.model)
    }

    async fn count_tokens(&self, model: &str, text: &str) -> Result<u32, ProviderError> {
        let url = self.endpoint(model, "countTokens");
        let body = CountTokensRequest {
            contents: vec![ApiContent {
                role: Some("user"),
                parts: vec![ApiPart { text }],
            }],
        };

        debug!(provider = "gemini", model = %model, chars = text.len(), "Counting tokens");

        let response = self.post(&url, &body).await?;
        let api_resp: CountTokensResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse countTokens response: {e}"),
            })?;

        Ok(api_resp.total_tokens)
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent<'a>>,
    contents: Vec<ApiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct CountTokensRequest<'a> {
    contents: Vec<ApiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<ApiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use refchat_core::Provider;

    fn provider() -> GeminiProvider {
        GeminiProvider::new("test-key", Duration::from_secs(5)).unwrap()
    }

    fn request(messages: Vec<Message>) -> ProviderRequest {
        ProviderRequest {
            model: "gemini-2.5-pro".into(),
            system_instruction: Some("You are a PromoTool assistant".into()),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    #[test]
    fn constructor() {
        let p = provider();
        assert_eq!(p.name(), "gemini");
        assert_eq!(p.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn constructor_with_base_url() {
        let p = provider().with_base_url("https://proxy.example.com/");
        assert_eq!(p.base_url, "https://proxy.example.com");
        assert_eq!(
            p.endpoint("models/gemini-2.5-pro", "countTokens"),
            "https://proxy.example.com/v1beta/models/gemini-2.5-pro:countTokens"
        );
    }

    #[test]
    fn body_maps_roles_and_system_instruction() {
        let req = request(vec![
            Message::user("Hello"),
            Message::assistant("Hi!"),
            Message::system("Be concise"),
            Message::user("Which KPI?"),
        ]);
        let body = serde_json::to_value(GeminiProvider::build_body(&req)).unwrap();

        let system = &body["systemInstruction"]["parts"];
        assert_eq!(system[0]["text"], "You are a PromoTool assistant");
        assert_eq!(system[1]["text"], "Be concise");
        assert!(body["systemInstruction"].get("role").is_none());

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "Which KPI?");
        assert!(body.get("generationConfig").is_none());
    }

    #[test]
    fn body_includes_generation_config_when_set() {
        let mut req = request(vec![Message::user("Hi")]);
        req.temperature = Some(0.2);
        req.max_tokens = Some(1024);
        let body = serde_json::to_value(GeminiProvider::build_body(&req)).unwrap();
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert!(body["generationConfig"]["temperature"].as_f64().is_some());
    }

    #[test]
    fn parse_text_response() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"role": "model", "parts": [
                        {"text": "thinking...", "thought": true},
                        {"text": "Привіт, "},
                        {"text": "світ!"}
                    ]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 8, "totalTokenCount": 128},
                "modelVersion": "gemini-2.5-pro-001"
            }"#,
        )
        .unwrap();

        let pr = GeminiProvider::response_to_provider_response(resp, "gemini-2.5-pro").unwrap();
        assert_eq!(pr.message.content, "Привіт, світ!");
        assert_eq!(pr.message.role, Role::Assistant);
        let usage = pr.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 120);
        assert_eq!(usage.completion_tokens, 8);
        assert_eq!(usage.total_tokens, 128);
        assert_eq!(pr.model, "gemini-2.5-pro-001");
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let resp: GenerateContentResponse = serde_json::from_str(
            r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#,
        )
        .unwrap();
        let err = GeminiProvider::response_to_provider_response(resp, "m").unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn parse_count_tokens_response() {
        let resp: CountTokensResponse = serde_json::from_str(r#"{"totalTokens": 31}"#).unwrap();
        assert_eq!(resp.total_tokens, 31);
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(
            GeminiProvider::status_error(429, String::new()),
            ProviderError::RateLimited { .. }
        ));
        assert!(matches!(
            GeminiProvider::status_error(400, r#"{"reason":"API_KEY_INVALID"}"#.into()),
            ProviderError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            GeminiProvider::status_error(404, "no such model".into()),
            ProviderError::ModelNotFound(_)
        ));
        assert!(matches!(
            GeminiProvider::status_error(500, "boom".into()),
            ProviderError::ApiError { status_code: 500, .. }
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let p = provider().with_base_url("http://127.0.0.1:1");
        let err = p.count_tokens("gemini-2.5-pro", "hello").await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Network(_) | ProviderError::Timeout(_)
        ));
    }
}
