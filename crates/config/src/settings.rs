// Application settings
// Loaded from ~/.config/gridagent/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Inference provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Agent disabled (default)
    #[default]
    None,
    /// Local OpenAI-compatible server (Ollama)
    Local,
    #[serde(rename = "openai")]
    OpenAI,
    Anthropic,
    #[serde(rename = "deepseek")]
    DeepSeek,
    Gemini,
}

impl Provider {
    pub const ALL: [Provider; 6] = [
        Provider::None,
        Provider::Local,
        Provider::OpenAI,
        Provider::Anthropic,
        Provider::DeepSeek,
        Provider::Gemini,
    ];

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Provider::None)
    }

    pub fn needs_api_key(&self) -> bool {
        !matches!(self, Provider::None | Provider::Local)
    }

    /// Lowercase identifier used in settings, env var names and the keychain
    pub fn name(&self) -> &'static str {
        match self {
            Provider::None => "none",
            Provider::Local => "local",
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::DeepSeek => "deepseek",
            Provider::Gemini => "gemini",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "claude" => Some(Provider::Anthropic),
            "ollama" => Some(Provider::Local),
            _ => Self::ALL.into_iter().find(|p| p.name() == s),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::None => "",
            Provider::Local => "llama3:8b",
            Provider::OpenAI => "gpt-4o",
            Provider::Anthropic => "claude-sonnet-4-20250514",
            Provider::DeepSeek => "deepseek-chat",
            Provider::Gemini => "gemini-2.0-flash-exp",
        }
    }

    /// Chat endpoint used when settings leave `endpoint` empty
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Provider::None => "",
            Provider::Local => "http://localhost:11434/v1/chat/completions",
            Provider::OpenAI => "https://api.openai.com/v1/chat/completions",
            Provider::Anthropic => "https://api.anthropic.com/v1/messages",
            Provider::DeepSeek => "https://api.deepseek.com/v1/chat/completions",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions",
        }
    }

    /// Environment variables the provider's own tooling reads, in lookup order
    pub fn conventional_env_vars(&self) -> &'static [&'static str] {
        match self {
            Provider::None | Provider::Local => &[],
            Provider::OpenAI => &["OPENAI_API_KEY"],
            Provider::Anthropic => &["ANTHROPIC_API_KEY", "CLAUDE_API_KEY"],
            Provider::DeepSeek => &["DEEPSEEK_API_KEY"],
            Provider::Gemini => &["GEMINI_API_KEY"],
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Control loop and provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub provider: Provider,

    /// Model identifier (empty = provider default)
    pub model: String,

    /// Chat endpoint URL (empty = provider default)
    pub endpoint: String,

    pub temperature: f32,

    /// Upper bound on subtask-loop iterations per run
    pub max_iters: u32,

    /// Identical subtask lists tolerated before the loop gives up
    pub stagnation_patience: u32,

    pub reflection: bool,

    /// Extract on-sheet notes into agent memory after each action pass
    pub memory: bool,

    /// Extra hint text appended to every action prompt
    pub add_info: String,

    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            provider: Provider::None,
            model: String::new(),
            endpoint: String::new(),
            temperature: 0.0,
            max_iters: 20,
            stagnation_patience: 3,
            reflection: true,
            memory: false,
            add_info: String::new(),
            timeout_secs: 60,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl AgentSettings {
    pub fn effective_model(&self) -> &str {
        if self.model.trim().is_empty() {
            self.provider.default_model()
        } else {
            self.model.trim()
        }
    }

    pub fn effective_endpoint(&self) -> &str {
        if self.endpoint.trim().is_empty() {
            self.provider.default_endpoint()
        } else {
            self.endpoint.trim()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub agent: AgentSettings,
}

const DEFAULT_SETTINGS_FILE: &str = r#"{
    // Agent (disabled by default)
    // Provider options: "none", "local", "openai", "anthropic", "deepseek", "gemini"
    // API keys live in the system keychain or GRIDAGENT_<PROVIDER>_KEY, not in this file
    "agent": {
        "provider": "none",
        "model": "",
        "endpoint": "",
        "temperature": 0.0,
        "max_iters": 20,
        "stagnation_patience": 3,
        "reflection": true,
        "memory": false,
        "add_info": "",
        "timeout_secs": 60,
        "max_retries": 3,
        "retry_backoff_ms": 500
    }
}
"#;

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("gridagent")
            .join("settings.json")
    }

    /// Load settings from disk, falling back to defaults.
    /// A missing file is created with a commented template.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            if let Err(e) = Self::write_default_file(&path) {
                log::warn!("could not create {}: {}", path.display(), e);
            }
            return Self::default();
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path. Unreadable or malformed files yield
    /// defaults with a warning.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                log::warn!("error parsing {}: {}; using default settings", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                log::warn!("error reading {}: {}; using default settings", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse settings JSON, dropping `//` comment lines first
    pub fn parse(contents: &str) -> Result<Self, String> {
        let cleaned: String = contents
            .lines()
            .filter(|line| !line.trim().starts_with("//"))
            .collect::<Vec<_>>()
            .join("\n");
        serde_json::from_str(&cleaned).map_err(|e| e.to_string())
    }

    pub fn save(&self) -> Result<(), String> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| e.to_string())?;
        fs::write(path, json).map_err(|e| e.to_string())
    }

    fn write_default_file(path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        fs::write(path, DEFAULT_SETTINGS_FILE).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_template_parses_to_defaults() {
        let parsed = Settings::parse(DEFAULT_SETTINGS_FILE).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn test_partial_settings_fill_defaults() {
        let parsed = Settings::parse(r#"{ "agent": { "provider": "deepseek", "max_iters": 5 } }"#).unwrap();
        assert_eq!(parsed.agent.provider, Provider::DeepSeek);
        assert_eq!(parsed.agent.max_iters, 5);
        assert_eq!(parsed.agent.stagnation_patience, 3);
        assert!(parsed.agent.reflection);
        assert_eq!(parsed.agent.effective_model(), "deepseek-chat");
        assert_eq!(parsed.agent.effective_endpoint(), "https://api.deepseek.com/v1/chat/completions");
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = Settings::default();
        settings.agent.provider = Provider::Anthropic;
        settings.agent.model = "claude-3-5-haiku-latest".to_string();
        settings.agent.memory = true;
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_provider_parse() {
        assert_eq!(Provider::parse("OpenAI"), Some(Provider::OpenAI));
        assert_eq!(Provider::parse("claude"), Some(Provider::Anthropic));
        assert_eq!(Provider::parse(" gemini "), Some(Provider::Gemini));
        assert_eq!(Provider::parse("ollama"), Some(Provider::Local));
        assert_eq!(Provider::parse("grok"), None);
        for p in Provider::ALL {
            assert_eq!(Provider::parse(p.name()), Some(p));
        }
    }

    #[test]
    fn test_explicit_model_and_endpoint_win() {
        let agent = AgentSettings {
            provider: Provider::Local,
            model: "qwen2.5".into(),
            endpoint: "http://gpu-box:8080/v1/chat/completions".into(),
            ..AgentSettings::default()
        };
        assert_eq!(agent.effective_model(), "qwen2.5");
        assert_eq!(agent.effective_endpoint(), "http://gpu-box:8080/v1/chat/completions");
    }
}
