//! Agent control loop and the inference clients it talks to.
//!
//! ```text
//! instruction -> infer -> action script -> parse -> interpret -> reflect -> commit | retry
//! ```

pub mod client;
pub mod error;
pub mod planner;
pub mod prompt;
pub mod report;
pub mod response;
pub mod runner;
pub mod state;

pub use client::{client_for, Anthropic, ChatMessage, InferenceClient, OpenAiCompatible, RetryPolicy, Role};
pub use error::{AgentError, ProviderError};
pub use planner::{NoUser, Planner, SingleTaskPlanner, UserChannel};
pub use report::{RunReport, StepOutcome, StepRecord, StopReason};
pub use response::Verdict;
pub use runner::{ControlLoop, LoopConfig, Phase};
pub use state::AgentState;
