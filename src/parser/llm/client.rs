//! Blocking HTTP client for an OpenAI-compatible chat-completions
//! provider, behind a trait so tests can inject a mock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("cannot connect to LLM provider at {0}")]
    Connection(String),

    #[error("LLM request timed out after {0}s")]
    Timeout(u64),

    #[error("LLM provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Decode(String),
}

/// Token usage reported by the provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// One completed LLM call.
#[derive(Debug, Clone)]
pub struct LlmCompletion {
    pub content: String,
    /// None when the provider omits usage accounting.
    pub usage: Option<TokenUsage>,
}

/// Chat-completion client abstraction (allows mocking).
pub trait LlmClient {
    fn complete(&self, model: &str, system: &str, user: &str) -> Result<LlmCompletion, LlmError>;
}

/// Blocking reqwest client with a per-call timeout.
pub struct HttpLlmClient {
    base_url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl HttpLlmClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            timeout_secs,
        })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl LlmClient for HttpLlmClient {
    fn complete(&self, model: &str, system: &str, user: &str) -> Result<LlmCompletion, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Decode(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().map_err(|e| LlmError::Decode(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Decode("response contained no choices".into()))?;

        Ok(LlmCompletion {
            content,
            usage: parsed.usage,
        })
    }
}

/// Mock client for tests: returns queued responses in order (repeating
/// the last one) and counts calls so tests can assert that gated paths
/// never reach the network.
pub struct MockLlmClient {
    responses: Mutex<Vec<String>>,
    cursor: AtomicUsize,
    calls: AtomicUsize,
    usage: Option<TokenUsage>,
    fail_with: Option<String>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            responses: Mutex::new(vec![response.to_string()]),
            cursor: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            usage: Some(TokenUsage {
                prompt_tokens: 200,
                completion_tokens: 100,
            }),
            fail_with: None,
        }
    }

    /// Queue several responses, returned one per call.
    pub fn with_responses(responses: Vec<&str>) -> Self {
        let mut mock = Self::new("");
        mock.responses = Mutex::new(responses.into_iter().map(str::to_string).collect());
        mock
    }

    /// Fail every call with a connection error.
    pub fn failing(message: &str) -> Self {
        let mut mock = Self::new("");
        mock.fail_with = Some(message.to_string());
        mock
    }

    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, _model: &str, _system: &str, _user: &str) -> Result<LlmCompletion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            return Err(LlmError::Connection(message.clone()));
        }
        let responses = self.responses.lock().unwrap();
        let i = self.cursor.fetch_add(1, Ordering::SeqCst).min(responses.len() - 1);
        Ok(LlmCompletion {
            content: responses[i].clone(),
            usage: self.usage,
        })
    }
}
