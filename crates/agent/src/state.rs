use serde::{Deserialize, Serialize};

/// Per-run agent memory. Owned by one control loop; never shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub thought_history: Vec<String>,
    pub summary_history: Vec<String>,
    pub action_history: Vec<String>,
    /// Rolling description of what has been done so far
    pub completed_requirements: String,
    /// Notes extracted from the sheet
    pub memory: String,
    /// The last pass was rejected; the next prompt carries its context
    pub error_flag: bool,
    pub reflection_thought: String,
    pub last_failed_summary: String,
    pub last_failed_action: String,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history_len(&self) -> usize {
        self.action_history.len()
    }

    /// Append an accepted step to the histories.
    pub fn record(&mut self, thought: &str, summary: &str, action: &str) {
        self.thought_history.push(thought.to_string());
        self.summary_history.push(summary.to_string());
        self.action_history.push(action.to_string());
    }

    /// Clear rejection context after a committed step.
    pub fn clear_error(&mut self) {
        self.error_flag = false;
        self.reflection_thought.clear();
        self.last_failed_summary.clear();
        self.last_failed_action.clear();
    }

    /// Mark the last pass as rejected so the next prompt can self-correct.
    pub fn reject(&mut self, reason: &str, summary: &str, action: &str) {
        self.error_flag = true;
        self.reflection_thought = reason.to_string();
        self.last_failed_summary = summary.to_string();
        self.last_failed_action = action.to_string();
    }

    /// Add a memory note unless it is blank, `None`, or already present.
    /// Returns whether anything was added.
    pub fn remember(&mut self, note: &str) -> bool {
        let note = note.trim();
        if note.is_empty() || note.contains("None") || self.memory.contains(note) {
            return false;
        }
        if !self.memory.is_empty() {
            self.memory.push('\n');
        }
        self.memory.push_str(note);
        true
    }

    /// Fold a human reply into the progress text.
    pub fn fold_user_reply(&mut self, reply: &str) {
        let reply = reply.trim();
        if self.completed_requirements.trim().is_empty() {
            self.completed_requirements = format!("User clarified their request: {}.", reply);
        } else {
            self.completed_requirements = format!(
                "{} User provided clarification: {}.",
                self.completed_requirements.trim_end(),
                reply
            );
        }
    }
}
