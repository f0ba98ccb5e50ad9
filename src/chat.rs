use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// One LM invocation: prompt plus fixed sampling parameters.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The `chat(prompt) -> text` capability every phase consumes.
pub trait ChatModel {
    fn chat(
        &self,
        request: &ChatRequest,
    ) -> impl std::future::Future<Output = Result<ChatResponse>> + Send;
}

// ---------------------------------------------------------------------------
// Anthropic Messages API client
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[derive(Debug)]
pub struct AnthropicClient {
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl AnthropicClient {
    pub fn new(model: &str) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| Error::ConfigValidation(format!("${API_KEY_ENV} is not set")))?;
        Ok(Self {
            api_key,
            model: model.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    fn post_messages(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{"role": "user", "content": request.prompt}],
        });
        if let Some(ref system) = request.system {
            body["system"] = serde_json::Value::String(system.clone());
        }

        for attempt in 1..=self.retry.max_attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            match ureq::post(ANTHROPIC_API_URL)
                .set("x-api-key", &self.api_key)
                .set("anthropic-version", ANTHROPIC_VERSION)
                .set("Content-Type", "application/json")
                .send_json(&body)
            {
                Ok(response) => {
                    let parsed: MessagesResponse = response.into_json().map_err(|e| {
                        Error::Transport(format!("failed to read messages response: {e}"))
                    })?;
                    let text = parsed
                        .content
                        .first()
                        .map(|b| b.text.clone())
                        .unwrap_or_default();
                    debug!(
                        input_tokens = parsed.usage.input_tokens,
                        output_tokens = parsed.usage.output_tokens,
                        "chat completed"
                    );
                    return Ok(ChatResponse {
                        text,
                        input_tokens: parsed.usage.input_tokens,
                        output_tokens: parsed.usage.output_tokens,
                    });
                }
                Err(ref e) if attempt < self.retry.max_attempts && is_retryable(e) => {
                    warn!(attempt, error = %e, "retrying chat after transient error");
                }
                Err(e) => {
                    return Err(Error::Transport(format!("chat request failed: {e}")));
                }
            }
        }
        unreachable!()
    }
}

/// Only retry rate-limits (429), server errors (5xx), and transport/network errors.
fn is_retryable(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Status(code, _) => *code == 429 || *code >= 500,
        ureq::Error::Transport(_) => true,
    }
}

impl ChatModel for AnthropicClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.post_messages(request)
    }
}
