//! CLI Exit Code Registry
//!
//! Single source of truth for every exit code `gridagent` returns.
//! Scripts rely on these values.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain     | Description                                 |
//! |---------|------------|---------------------------------------------|
//! | 0       | Universal  | Success                                     |
//! | 1       | Universal  | General error (unspecified)                 |
//! | 2       | Universal  | Usage error (bad args, bad overrides)       |
//! | 3       | Universal  | File load/save failure                      |
//! | 10-19   | agent      | Inference provider and key codes            |
//! | 20-29   | script     | Action script parse/apply codes             |

use gridagent_agent::{AgentError, ProviderError};

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, invalid overrides, provider disabled.
pub const EXIT_USAGE: u8 = 2;

/// Spreadsheet or script file could not be read or written.
pub const EXIT_IO: u8 = 3;

// =============================================================================
// Agent (10-19)
// =============================================================================

/// Inference call failed after retries (network, HTTP status, bad response).
pub const EXIT_PROVIDER: u8 = 10;

/// Provider configured but no API key found.
pub const EXIT_MISSING_KEY: u8 = 11;

// =============================================================================
// Script (20-29)
// =============================================================================

/// Action script did not parse. Nothing was executed.
pub const EXIT_PARSE: u8 = 20;

/// `apply` ran every action but at least one reported failure.
pub const EXIT_ACTION_FAILED: u8 = 21;

/// Map an agent error to its exit code.
pub fn agent_exit_code(err: &AgentError) -> u8 {
    match err {
        AgentError::Provider(ProviderError::MissingKey(_)) => EXIT_MISSING_KEY,
        AgentError::Provider(ProviderError::NotConfigured(_)) => EXIT_USAGE,
        AgentError::Provider(_) => EXIT_PROVIDER,
        AgentError::UserChannel(_) => EXIT_ERROR,
    }
}
