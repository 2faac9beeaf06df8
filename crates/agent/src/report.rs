use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gridagent_actions::ExecutionResult;

use crate::response::Verdict;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model emitted TERMINATE
    Terminated,
    /// The planner repeated itself past the patience threshold
    Stagnation,
    MaxIterations,
    /// A TELLUSER got an empty reply
    UserAborted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::Terminated => "terminated",
            StopReason::Stagnation => "stagnation",
            StopReason::MaxIterations => "max_iterations",
            StopReason::UserAborted => "user_aborted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Committed,
    Rejected(Verdict),
    ParseFailed(String),
    AskedUser,
    Terminated,
}

/// One ACTING pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub iteration: u32,
    pub subtask: String,
    pub thought: String,
    pub summary: String,
    pub script: String,
    pub results: Vec<ExecutionResult>,
    pub outcome: StepOutcome,
}

impl StepRecord {
    pub fn failed_actions(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub iterations: u32,
    pub stop_reason: StopReason,
    pub steps: Vec<StepRecord>,
    pub completed_requirements: String,
}

impl RunReport {
    pub fn committed_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.outcome == StepOutcome::Committed).count()
    }

    /// Actions that reported failure, across every step.
    pub fn failed_actions(&self) -> usize {
        self.steps.iter().map(StepRecord::failed_actions).sum()
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string_pretty(self).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_json_shape() {
        let now = Utc::now();
        let report = RunReport {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            iterations: 2,
            stop_reason: StopReason::MaxIterations,
            steps: vec![StepRecord {
                iteration: 1,
                subtask: "Bold the header".into(),
                thought: String::new(),
                summary: "Bold row 1".into(),
                script: "REGEX ^.*$ | SELECT A1:D1".into(),
                results: vec![
                    ExecutionResult { success: true, message: "Selected A1:D1".into() },
                    ExecutionResult { success: false, message: "no cells selected".into() },
                ],
                outcome: StepOutcome::Rejected(Verdict::NoChange),
            }],
            completed_requirements: String::new(),
        };

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["stop_reason"], "max_iterations");
        assert_eq!(json["steps"][0]["outcome"]["kind"], "rejected");
        assert_eq!(json["steps"][0]["outcome"]["detail"], "no_change");
        assert_eq!(report.committed_steps(), 0);
        assert_eq!(report.failed_actions(), 1);
    }
}
