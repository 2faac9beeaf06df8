use std::fmt;

/// Inference call failure. Only surfaces after the adapter's own retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Provider disabled or unusable configuration
    NotConfigured(String),
    /// Provider needs a key and none was found
    MissingKey(String),
    /// Client construction or a non-retryable transport failure
    Http(String),
    /// Non-retryable HTTP status
    Status { status: u16, message: String },
    /// Body did not have the expected shape
    Decode(String),
    EmptyResponse,
    /// Retryable failures on every attempt
    Exhausted { attempts: u32, last: String },
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::NotConfigured(msg) => write!(f, "provider not configured: {}", msg),
            ProviderError::MissingKey(provider) => write!(f, "no API key configured for {}", provider),
            ProviderError::Http(msg) => write!(f, "network error: {}", msg),
            ProviderError::Status { status, message } => write!(f, "API error ({}): {}", status, message),
            ProviderError::Decode(msg) => write!(f, "failed to decode response: {}", msg),
            ProviderError::EmptyResponse => write!(f, "provider returned an empty response"),
            ProviderError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
        }
    }
}

impl std::error::Error for ProviderError {}

/// Errors that end a run. Parse and execution failures never do.
#[derive(Debug)]
pub enum AgentError {
    Provider(ProviderError),
    UserChannel(String),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::Provider(e) => write!(f, "{}", e),
            AgentError::UserChannel(msg) => write!(f, "user channel failed: {}", msg),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Provider(e) => Some(e),
            AgentError::UserChannel(_) => None,
        }
    }
}

impl From<ProviderError> for AgentError {
    fn from(e: ProviderError) -> Self {
        AgentError::Provider(e)
    }
}
