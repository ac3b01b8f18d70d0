use crate::ai_provider::{AIError, ReasoningProvider, ReasoningReply};
use crate::config::ReasoningConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiResponseContent,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

impl GeminiResponse {
    /// Text of the first part of the first candidate. An absent text is an
    /// empty object, i.e. a valid reply with no proposals.
    fn reply_text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .and_then(|p| p.text.clone())
            .unwrap_or_else(|| "{}".to_string())
    }
}

/// Client for a Gemini-style `generateContent` endpoint with bounded
/// per-attempt timeout and a fixed number of attempts.
pub struct GeminiProvider {
    client: Client,
    config: ReasoningConfig,
    fallback_on_error: bool,
}

impl GeminiProvider {
    pub fn new(config: ReasoningConfig, fallback_on_error: bool) -> Result<Self, AIError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AIError::Request(e.without_url().to_string()))?;

        Ok(Self {
            client,
            config,
            fallback_on_error,
        })
    }

    pub fn endpoint(&self) -> String {
        self.config.endpoint()
    }

    /// One request. A delivered body that cannot be decoded is a reply, not a
    /// transport failure, so it is never retried.
    async fn attempt(&self, prompt: &str) -> Result<ReasoningReply, AIError> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        // The key travels in a header so it never appears in a URL that
        // reqwest might echo back in an error.
        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AIError::Request(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AIError::Status {
                status: status.as_u16(),
                body: redact(body, api_key),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| AIError::Request(e.without_url().to_string()))?;
        let body = redact(body, api_key);

        match serde_json::from_str::<GeminiResponse>(&body) {
            Ok(parsed) => {
                let text = parsed.reply_text();
                info!("Reasoning service replied ({} chars)", text.len());
                Ok(ReasoningReply::from_text(&text))
            }
            Err(e) => {
                warn!("Reasoning service returned an unreadable envelope: {}", e);
                Ok(ReasoningReply::Malformed {
                    raw_text: body,
                    error: format!("Invalid response envelope: {}", e),
                })
            }
        }
    }
}

fn redact(body: String, api_key: &str) -> String {
    if api_key.is_empty() {
        body
    } else {
        body.replace(api_key, "<redacted>")
    }
}

#[async_trait::async_trait]
impl ReasoningProvider for GeminiProvider {
    async fn analyze(&self, prompt: &str) -> ReasoningReply {
        let attempts = self.config.attempts();
        let endpoint = self.endpoint();
        let mut last_error = AIError::Request("no attempt made".to_string());

        for attempt in 1..=attempts {
            debug!("Reasoning request attempt {}/{} to {}", attempt, attempts, endpoint);
            match self.attempt(prompt).await {
                Ok(reply) => {
                    debug!("Reasoning attempt {} completed", attempt);
                    return reply;
                }
                Err(e) => {
                    error!(
                        "Reasoning request failed (attempt {}/{}, url: {}): {}",
                        attempt, attempts, endpoint, e
                    );
                    let retryable = e.is_retryable();
                    last_error = e;
                    if !retryable {
                        break;
                    }
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                }
            }
        }

        warn!("Reasoning service unavailable after retries: {}", last_error);
        ReasoningReply::after_transport_failure(&last_error, self.fallback_on_error)
    }

    fn get_provider_name(&self) -> &str {
        "gemini"
    }
}
