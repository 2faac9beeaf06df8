use crate::state::AgentState;

/// Breaks an instruction into subtasks for one iteration.
pub trait Planner {
    fn plan(&mut self, instruction: &str, state: &AgentState) -> Vec<String>;
}

/// The whole instruction is the only subtask.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleTaskPlanner;

impl Planner for SingleTaskPlanner {
    fn plan(&mut self, instruction: &str, _state: &AgentState) -> Vec<String> {
        vec![instruction.to_string()]
    }
}

/// Where TELLUSER messages go and replies come from.
pub trait UserChannel {
    /// Show `message` and block for a reply. An empty reply ends the run.
    fn ask(&mut self, message: &str) -> Result<String, String>;
}

/// Answers every question with an empty reply, so a TELLUSER ends the run.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUser;

impl UserChannel for NoUser {
    fn ask(&mut self, message: &str) -> Result<String, String> {
        log::info!("agent asked with no user attached: {}", message);
        Ok(String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_task_planner() {
        let mut planner = SingleTaskPlanner;
        assert_eq!(
            planner.plan("Sort by date", &AgentState::new()),
            vec!["Sort by date".to_string()]
        );
    }
}
