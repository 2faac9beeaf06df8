// Agent configuration and secrets management
//
// API keys are looked up in order:
// 1. System keychain (preferred)
// 2. GRIDAGENT_<PROVIDER>_KEY
// 3. The provider's conventional variable (OPENAI_API_KEY, ...)
//
// Keys are NEVER stored in settings.json

use std::env;

use crate::settings::{AgentSettings, Provider, Settings};

/// Service name for keychain storage
const KEYCHAIN_SERVICE: &str = "gridagent";

/// Source of an API key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Keychain,
    /// Environment variable, by name
    Environment(String),
    None,
}

impl KeySource {
    pub fn describe(&self) -> String {
        match self {
            KeySource::Keychain => "keychain".to_string(),
            KeySource::Environment(var) => format!("environment ({})", var),
            KeySource::None => "none".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KeyLookup {
    pub key: Option<String>,
    pub source: KeySource,
}

fn env_var_name(provider: &str) -> String {
    format!("GRIDAGENT_{}_KEY", provider.to_uppercase())
}

fn keychain_account(provider: &str) -> String {
    format!("ai/{}", provider.to_lowercase())
}

/// Environment variables consulted for a provider, in order
pub fn key_env_vars(provider: Provider) -> Vec<String> {
    std::iter::once(env_var_name(provider.name()))
        .chain(provider.conventional_env_vars().iter().map(|v| v.to_string()))
        .collect()
}

/// Get an API key for the specified provider
pub fn get_api_key(provider: Provider) -> KeyLookup {
    #[cfg(feature = "keychain")]
    {
        if let Ok(entry) = keyring::Entry::new(KEYCHAIN_SERVICE, &keychain_account(provider.name())) {
            if let Ok(key) = entry.get_password() {
                return KeyLookup {
                    key: Some(key),
                    source: KeySource::Keychain,
                };
            }
        }
    }

    lookup_env(provider, |name| env::var(name).ok())
}

fn lookup_env(provider: Provider, var: impl Fn(&str) -> Option<String>) -> KeyLookup {
    for name in key_env_vars(provider) {
        if let Some(key) = var(&name).filter(|k| !k.trim().is_empty()) {
            return KeyLookup {
                key: Some(key.trim().to_string()),
                source: KeySource::Environment(name),
            };
        }
    }
    KeyLookup {
        key: None,
        source: KeySource::None,
    }
}

/// Check if keychain support is available
pub fn keychain_available() -> bool {
    #[cfg(feature = "keychain")]
    {
        keyring::Entry::new(KEYCHAIN_SERVICE, "test").is_ok()
    }
    #[cfg(not(feature = "keychain"))]
    {
        false
    }
}

/// Status of the agent configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentConfigStatus {
    /// provider = none
    Disabled,
    Ready,
    MissingKey,
    Error(String),
}

impl AgentConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Ready => "ready",
            Self::MissingKey => "missing_key",
            Self::Error(_) => "error",
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// The effective agent configuration, fully resolved from settings and the
/// key store. Everything the control loop and the provider adapters read.
#[derive(Debug, Clone)]
pub struct ResolvedAgentConfig {
    pub provider: Provider,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub key_source: KeySource,
    pub temperature: f32,
    pub max_iters: u32,
    pub stagnation_patience: u32,
    pub reflection: bool,
    pub memory: bool,
    pub add_info: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub status: AgentConfigStatus,
}

impl ResolvedAgentConfig {
    pub fn from_settings(settings: &AgentSettings) -> Self {
        let lookup = if settings.provider.needs_api_key() {
            get_api_key(settings.provider)
        } else {
            KeyLookup {
                key: None,
                source: KeySource::None,
            }
        };
        Self::with_key(settings, lookup)
    }

    /// Resolve with an already looked-up key
    pub fn with_key(settings: &AgentSettings, lookup: KeyLookup) -> Self {
        let provider = settings.provider;

        let status = if !provider.is_enabled() {
            AgentConfigStatus::Disabled
        } else if !(0.0..=2.0).contains(&settings.temperature) {
            AgentConfigStatus::Error(format!("temperature {} is outside 0.0..=2.0", settings.temperature))
        } else if settings.max_iters == 0 {
            AgentConfigStatus::Error("max_iters must be at least 1".to_string())
        } else if provider.needs_api_key() && lookup.key.is_none() {
            AgentConfigStatus::MissingKey
        } else {
            AgentConfigStatus::Ready
        };

        Self {
            provider,
            model: settings.effective_model().to_string(),
            endpoint: settings.effective_endpoint().to_string(),
            api_key: lookup.key,
            key_source: lookup.source,
            temperature: settings.temperature,
            max_iters: settings.max_iters,
            stagnation_patience: settings.stagnation_patience,
            reflection: settings.reflection,
            memory: settings.memory,
            add_info: settings.add_info.clone(),
            timeout_secs: settings.timeout_secs,
            max_retries: settings.max_retries,
            retry_backoff_ms: settings.retry_backoff_ms,
            status,
        }
    }

    /// Load settings and resolve in one call
    pub fn load() -> Self {
        Self::from_settings(&Settings::load().agent)
    }

    /// Human-readable reason the configuration cannot run, if any
    pub fn blocking_reason(&self) -> Option<String> {
        match &self.status {
            AgentConfigStatus::Ready => None,
            AgentConfigStatus::Disabled => Some(format!(
                "No provider configured. Set \"agent.provider\" in {} or pass --provider",
                Settings::config_path().display()
            )),
            AgentConfigStatus::MissingKey => Some(format!(
                "No API key found for {}. Store one in the keychain or set {}",
                self.provider,
                key_env_vars(self.provider).join(" / ")
            )),
            AgentConfigStatus::Error(reason) => Some(reason.clone()),
        }
    }
}

/// Diagnostic information about agent configuration (for `ai doctor`)
#[derive(Debug)]
pub struct AgentDiagnostics {
    pub config: ResolvedAgentConfig,
    pub keychain_available: bool,
    pub config_path: String,
}

impl AgentDiagnostics {
    pub fn from_resolved(config: ResolvedAgentConfig) -> Self {
        Self {
            config,
            keychain_available: keychain_available(),
            config_path: Settings::config_path().display().to_string(),
        }
    }
}

impl std::fmt::Display for AgentDiagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = &self.config;
        let yes_no = |b: bool| if b { "yes" } else { "no" };
        writeln!(f, "Agent Configuration")?;
        writeln!(f, "──────────────────────────────")?;
        writeln!(f, "Settings file:      {}", self.config_path)?;
        writeln!(f, "Provider:           {}", c.provider)?;
        writeln!(f, "Status:             {}", c.status.as_str())?;
        if c.provider.is_enabled() {
            writeln!(f, "Model:              {}", c.model)?;
            writeln!(f, "Endpoint:           {}", c.endpoint)?;
        }
        writeln!(f, "Key present:        {}", yes_no(c.api_key.is_some()))?;
        writeln!(f, "Key source:         {}", c.key_source.describe())?;
        writeln!(f, "Keychain available: {}", yes_no(self.keychain_available))?;
        writeln!(f, "Temperature:        {}", c.temperature)?;
        writeln!(f, "Max iterations:     {}", c.max_iters)?;
        writeln!(f, "Patience:           {}", c.stagnation_patience)?;
        writeln!(f, "Reflection:         {}", yes_no(c.reflection))?;
        writeln!(f, "Memory:             {}", yes_no(c.memory))?;
        writeln!(
            f,
            "Retries:            {} (backoff {} ms, timeout {} s)",
            c.max_retries, c.retry_backoff_ms, c.timeout_secs
        )?;
        if let Some(reason) = c.blocking_reason() {
            writeln!(f, "Blocking:           {}", reason)?;
        }
        Ok(())
    }
}
