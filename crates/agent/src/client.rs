// Inference clients
//
// One trait, one adapter per wire protocol, chosen once at construction.
// Retries live here; the control loop only sees text or a final error.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use gridagent_config::{AgentConfigStatus, Provider, ResolvedAgentConfig};

use crate::error::ProviderError;

const USER_AGENT: &str = concat!("gridagent/", env!("CARGO_PKG_VERSION"));
const MAX_TOKENS: u32 = 2048;
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// `infer(history, model, temperature) -> text`
pub trait InferenceClient {
    fn infer(&self, history: &[ChatMessage], model: &str, temperature: f32) -> Result<String, ProviderError>;
}

/// Bounded attempts with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry; doubled each time
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// `max_retries` counts retries after the first attempt.
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_retries + 1,
            backoff,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Shared HTTP plumbing: POST JSON, classify statuses, retry.
struct Transport {
    http: reqwest::blocking::Client,
    policy: RetryPolicy,
    provider: &'static str,
}

impl Transport {
    fn new(provider: &'static str, timeout: Duration, policy: RetryPolicy) -> Result<Self, ProviderError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self { http, policy, provider })
    }

    /// `build_request` is called once per attempt.
    fn post_with_retry(
        &self,
        build_request: impl Fn(&reqwest::blocking::Client) -> reqwest::blocking::RequestBuilder,
    ) -> Result<Value, ProviderError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = String::new();
        let mut retry_after: Option<Duration> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let wait = retry_after.take().unwrap_or_else(|| self.policy.delay(attempt - 1));
                log::warn!(
                    "{}: retry {}/{} in {:?} ({})",
                    self.provider,
                    attempt,
                    attempts - 1,
                    wait,
                    last
                );
                thread::sleep(wait);
            }

            let resp = match build_request(&self.http).send() {
                Ok(resp) => resp,
                Err(e) => {
                    last = e.to_string();
                    continue;
                }
            };

            let status = resp.status().as_u16();
            if status == 429 || status >= 500 {
                if status == 429 {
                    retry_after = resp
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .map(Duration::from_secs);
                }
                last = format!("HTTP {}", status);
                continue;
            }

            let text = resp.text().map_err(|e| ProviderError::Http(e.to_string()))?;
            if !(200..300).contains(&status) {
                return Err(ProviderError::Status {
                    status,
                    message: extract_error_message(&text),
                });
            }

            return serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|e| {
                let preview: String = text.chars().take(200).collect();
                ProviderError::Decode(format!("{} (body: {})", e, preview))
            });
        }

        Err(ProviderError::Exhausted { attempts, last })
    }
}

/// Pull `error.message` (OpenAI, Anthropic) or `message` out of an error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// OpenAI chat-completions protocol: OpenAI, DeepSeek, Gemini's compatible
/// endpoint, and local servers such as Ollama.
pub struct OpenAiCompatible {
    transport: Transport,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiCompatible {
    pub fn new(
        provider: &'static str,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            transport: Transport::new(provider, timeout, policy)?,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

impl InferenceClient for OpenAiCompatible {
    fn infer(&self, history: &[ChatMessage], model: &str, temperature: f32) -> Result<String, ProviderError> {
        let messages: Vec<Value> = history
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
            "max_tokens": MAX_TOKENS,
        });

        let response = self.transport.post_with_retry(|http| {
            let req = http.post(&self.endpoint).json(&body);
            match &self.api_key {
                Some(key) => req.bearer_auth(key),
                None => req,
            }
        })?;

        let content = response
            .pointer("/choices/0/message/content")
            .ok_or_else(|| ProviderError::Decode("no choices[0].message.content in response".to_string()))?
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();
        if content.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(content)
    }
}

/// Anthropic Messages API. System messages are lifted into `system`.
pub struct Anthropic {
    transport: Transport,
    endpoint: String,
    api_key: String,
}

impl Anthropic {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: String,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            transport: Transport::new("anthropic", timeout, policy)?,
            endpoint: endpoint.into(),
            api_key,
        })
    }
}

impl InferenceClient for Anthropic {
    fn infer(&self, history: &[ChatMessage], model: &str, temperature: f32) -> Result<String, ProviderError> {
        let system: Vec<&str> = history
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        let messages: Vec<Value> = history
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": model,
            "max_tokens": MAX_TOKENS,
            "temperature": temperature,
            "messages": messages,
        });
        if !system.is_empty() {
            body["system"] = Value::String(system.join("\n\n"));
        }

        let response = self.transport.post_with_retry(|http| {
            http.post(&self.endpoint)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
        })?;

        let blocks = response
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| ProviderError::Decode("no content array in response".to_string()))?;
        let text: String = blocks
            .iter()
            .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text.trim().to_string())
    }
}

/// Build the adapter for a resolved configuration.
pub fn client_for(config: &ResolvedAgentConfig) -> Result<Box<dyn InferenceClient>, ProviderError> {
    match &config.status {
        AgentConfigStatus::Ready => {}
        AgentConfigStatus::MissingKey => return Err(ProviderError::MissingKey(config.provider.to_string())),
        AgentConfigStatus::Disabled => {
            return Err(ProviderError::NotConfigured("no provider selected".to_string()))
        }
        AgentConfigStatus::Error(reason) => return Err(ProviderError::NotConfigured(reason.clone())),
    }

    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let policy = RetryPolicy::new(config.max_retries, Duration::from_millis(config.retry_backoff_ms));
    log::debug!("inference client: {} at {}", config.provider, config.endpoint);

    match config.provider {
        Provider::None => Err(ProviderError::NotConfigured("no provider selected".to_string())),
        Provider::Anthropic => {
            let key = config
                .api_key
                .clone()
                .ok_or_else(|| ProviderError::MissingKey(config.provider.to_string()))?;
            Ok(Box::new(Anthropic::new(&config.endpoint, key, timeout, policy)?))
        }
        Provider::Local | Provider::OpenAI | Provider::DeepSeek | Provider::Gemini => Ok(Box::new(
            OpenAiCompatible::new(config.provider.name(), &config.endpoint, config.api_key.clone(), timeout, policy)?,
        )),
    }
}
