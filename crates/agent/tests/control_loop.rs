use std::cell::RefCell;
use std::collections::VecDeque;

use gridagent_agent::{
    AgentError, ChatMessage, ControlLoop, InferenceClient, LoopConfig, ProviderError, StepOutcome, StopReason,
    UserChannel, Verdict,
};
use gridagent_engine::{CellValue, SpreadsheetModel};

/// Replays canned replies in order and records every request.
struct ScriptedClient {
    replies: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<Vec<ChatMessage>>>,
}

impl ScriptedClient {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: RefCell::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    fn user_prompt(&self, call: usize) -> String {
        self.requests.borrow()[call]
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

impl InferenceClient for ScriptedClient {
    fn infer(&self, history: &[ChatMessage], _model: &str, _temperature: f32) -> Result<String, ProviderError> {
        self.requests.borrow_mut().push(history.to_vec());
        self.replies.borrow_mut().pop_front().ok_or(ProviderError::EmptyResponse)
    }
}

#[derive(Default)]
struct ScriptedUser {
    replies: VecDeque<String>,
    asked: Vec<String>,
}

impl ScriptedUser {
    fn replying(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            asked: Vec::new(),
        }
    }
}

impl UserChannel for ScriptedUser {
    fn ask(&mut self, message: &str) -> Result<String, String> {
        self.asked.push(message.to_string());
        self.replies.pop_front().ok_or_else(|| "no scripted reply".to_string())
    }
}

const WRITE_42: &str = "### Thought ###\nA1 is empty.\n\n### Action ###\nREGEX ^.*$ | SELECT A1:A1\nREGEX ^.*$ | SET 42\n\n### Operation ###\nWrite 42 into A1\n";
const TERMINATE: &str = "### Thought ###\nDone.\n### Action ###\nREGEX ^.*$ | TERMINATE\n### Operation ###\nStop";

fn config(reflection: bool, patience: u32, max_iters: u32) -> LoopConfig {
    LoopConfig {
        model: "test-model".into(),
        reflection,
        stagnation_patience: patience,
        max_iters,
        ..LoopConfig::default()
    }
}

#[test]
fn test_stagnation_stops_without_another_call() {
    let client = ScriptedClient::new(&[WRITE_42, "### Completed contents ###\nWrote 42 into A1."]);
    let mut model = SpreadsheetModel::new(10, 5);
    let mut agent = ControlLoop::new(&client, config(false, 1, 20));

    let report = agent.run(&mut model, "Put 42 in A1", &mut ScriptedUser::default()).unwrap();

    assert_eq!(report.stop_reason, StopReason::Stagnation);
    assert_eq!(report.iterations, 2);
    assert_eq!(client.calls(), 2);
    assert_eq!(model.sheet.get_value(0, 0), CellValue::Number(42.0));
    assert_eq!(agent.state().history_len(), 1);
    assert_eq!(report.completed_requirements, "Wrote 42 into A1.");
    assert_eq!(report.committed_steps(), 1);
}

#[test]
fn test_rejected_step_feeds_next_prompt() {
    let client = ScriptedClient::new(&[
        WRITE_42,
        "### Thought ###\nA1 should hold text, not a number.\n### Answer ###\nB",
        TERMINATE,
    ]);
    let mut model = SpreadsheetModel::new(10, 5);
    let mut agent = ControlLoop::new(&client, config(true, 3, 20));

    let report = agent.run(&mut model, "Put the word forty-two in A1", &mut ScriptedUser::default()).unwrap();

    assert_eq!(report.stop_reason, StopReason::Terminated);
    assert_eq!(client.calls(), 3);
    assert_eq!(agent.state().history_len(), 0);
    assert!(agent.state().error_flag);

    let retry_prompt = client.user_prompt(2);
    assert!(retry_prompt.contains("### Last operation ###"));
    assert!(retry_prompt.contains("Write 42 into A1"));
    assert!(retry_prompt.contains("REGEX ^.*$ | SET 42"));
    assert!(retry_prompt.contains("A1 should hold text, not a number."));

    assert_eq!(report.steps[0].outcome, StepOutcome::Rejected(Verdict::Incorrect));
    assert_eq!(report.steps[1].outcome, StepOutcome::Terminated);
}

#[test]
fn test_accepted_step_commits_and_clears_error() {
    let client = ScriptedClient::new(&[
        "### Action ###\nREGEX ^.*$ | SELECT Z1",
        "### Answer ###\nC",
        WRITE_42,
        "### Thought ###\nA1 now shows 42.\n### Answer ###\nA",
        "### Completed contents ###\nA1 holds 42.",
        TERMINATE,
    ]);
    let mut model = SpreadsheetModel::new(10, 5);
    let mut agent = ControlLoop::new(&client, config(true, 3, 20));

    let report = agent.run(&mut model, "Put 42 in A1", &mut ScriptedUser::default()).unwrap();

    assert_eq!(report.stop_reason, StopReason::Terminated);
    // SELECT Z1 is outside a five-column sheet; the failure is recorded, not fatal
    assert!(!report.steps[0].results[0].success);
    assert_eq!(report.steps[0].outcome, StepOutcome::Rejected(Verdict::NoChange));
    assert_eq!(report.steps[1].outcome, StepOutcome::Committed);
    assert!(!agent.state().error_flag);
    assert_eq!(agent.state().action_history, vec!["REGEX ^.*$ | SELECT A1:A1\nREGEX ^.*$ | SET 42".to_string()]);
    assert_eq!(agent.state().completed_requirements, "A1 holds 42.");
    assert!(client.user_prompt(5).contains("Step 1: Write 42 into A1"));
}

#[test]
fn test_tell_user_restarts_with_reply() {
    let client = ScriptedClient::new(&[
        "### Action ###\nREGEX ^.*$ | SELECT A1\nREGEX ^.*$ | TELLUSER Which column holds the totals?\nREGEX ^.*$ | SET never",
        TERMINATE,
    ]);
    let mut model = SpreadsheetModel::new(10, 5);
    let mut user = ScriptedUser::replying(&["column B"]);
    let mut agent = ControlLoop::new(&client, config(true, 3, 20));

    let report = agent.run(&mut model, "Bold the totals", &mut user).unwrap();

    assert_eq!(user.asked, vec!["Which column holds the totals?".to_string()]);
    assert_eq!(report.stop_reason, StopReason::Terminated);
    assert_eq!(client.calls(), 2);
    // Actions after TELLUSER are not run
    assert_eq!(model.sheet.get_value(0, 0), CellValue::Empty);
    assert_eq!(agent.state().completed_requirements, "User clarified their request: column B.");
    assert!(client.user_prompt(1).starts_with("### Task ###\ncolumn B"));
    assert_eq!(report.steps[0].outcome, StepOutcome::AskedUser);
}

#[test]
fn test_empty_user_reply_aborts() {
    let client = ScriptedClient::new(&["### Action ###\nREGEX ^.*$ | TELLUSER Which sheet?"]);
    let mut model = SpreadsheetModel::new(10, 5);
    let mut user = ScriptedUser::replying(&["  "]);
    let mut agent = ControlLoop::new(&client, config(true, 3, 20));

    let report = agent.run(&mut model, "Tidy up", &mut user).unwrap();

    assert_eq!(report.stop_reason, StopReason::UserAborted);
    assert_eq!(client.calls(), 1);
}

#[test]
fn test_max_iterations_bound() {
    let rejected = "### Answer ###\nC";
    let client = ScriptedClient::new(&[WRITE_42, rejected, WRITE_42, rejected]);
    let mut model = SpreadsheetModel::new(10, 5);
    let mut agent = ControlLoop::new(&client, config(true, 10, 2));

    let report = agent.run(&mut model, "Put 42 in A1", &mut ScriptedUser::default()).unwrap();

    assert_eq!(report.stop_reason, StopReason::MaxIterations);
    assert_eq!(report.iterations, 2);
    assert_eq!(client.calls(), 4);
}

#[test]
fn test_parse_failure_skips_reflection_and_retries() {
    let client = ScriptedClient::new(&["### Action ###\nREGEX ^.*$ SELECT A1", TERMINATE]);
    let mut model = SpreadsheetModel::new(10, 5);
    let mut agent = ControlLoop::new(&client, config(true, 3, 20));

    let report = agent.run(&mut model, "Select A1", &mut ScriptedUser::default()).unwrap();

    assert_eq!(client.calls(), 2);
    assert!(matches!(report.steps[0].outcome, StepOutcome::ParseFailed(_)));
    assert!(model.selected_range.is_none());
    assert!(client.user_prompt(1).contains("could not be parsed"));
}

#[test]
fn test_memory_notes_are_collected() {
    let client = ScriptedClient::new(&[
        WRITE_42,
        "### Important content ###\nA1 holds the answer 42\n\nsomething else",
        "### Completed contents ###\nWrote 42.",
        TERMINATE,
        "unused",
    ]);
    let mut model = SpreadsheetModel::new(10, 5);
    let mut agent = ControlLoop::new(
        &client,
        LoopConfig {
            memory: true,
            ..config(false, 3, 20)
        },
    );

    agent.run(&mut model, "Put 42 in A1", &mut ScriptedUser::default()).unwrap();

    assert_eq!(agent.state().memory, "A1 holds the answer 42");
    assert!(client.user_prompt(3).contains("### Memory ###\nA1 holds the answer 42"));
}

#[test]
fn test_provider_error_ends_run() {
    let client = ScriptedClient::new(&[]);
    let mut model = SpreadsheetModel::new(10, 5);
    let mut agent = ControlLoop::new(&client, config(true, 3, 20));

    let err = agent.run(&mut model, "Anything", &mut ScriptedUser::default()).unwrap_err();
    assert!(matches!(err, AgentError::Provider(ProviderError::EmptyResponse)));
}
