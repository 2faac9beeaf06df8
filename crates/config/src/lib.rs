// Configuration loading

pub mod ai;
pub mod settings;

pub use ai::{AgentConfigStatus, AgentDiagnostics, KeyLookup, KeySource, ResolvedAgentConfig};
pub use settings::{AgentSettings, Provider, Settings};
