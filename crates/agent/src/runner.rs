//! The act / reflect / commit loop.
//!
//! One [`ControlLoop`] owns the agent state for a run and borrows the model
//! exclusively. Every inference call is synchronous; per-action failures are
//! logged and left to reflection, and only provider or user-channel errors
//! end a run early.

use chrono::Utc;
use uuid::Uuid;

use gridagent_actions::{interpret, parse, ActionKind, ExecutionResult};
use gridagent_config::ResolvedAgentConfig;
use gridagent_engine::SpreadsheetModel;

use crate::client::{ChatMessage, InferenceClient};
use crate::error::AgentError;
use crate::planner::{Planner, SingleTaskPlanner, UserChannel};
use crate::prompt::{self, ActionContext};
use crate::report::{RunReport, StepOutcome, StepRecord, StopReason};
use crate::response;
use crate::state::AgentState;

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub model: String,
    pub temperature: f32,
    pub max_iters: u32,
    pub stagnation_patience: u32,
    pub reflection: bool,
    pub memory: bool,
    /// Appended to every action prompt
    pub hint: String,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.0,
            max_iters: 20,
            stagnation_patience: 3,
            reflection: true,
            memory: false,
            hint: String::new(),
        }
    }
}

impl LoopConfig {
    pub fn from_resolved(config: &ResolvedAgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_iters: config.max_iters,
            stagnation_patience: config.stagnation_patience,
            reflection: config.reflection,
            memory: config.memory,
            hint: config.add_info.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    Acting,
    AwaitingUser,
    Reflecting,
    Committed,
    Retry,
    Terminated,
}

/// What one ACTING pass asks of the outer loop.
enum Pass {
    Next,
    Restart(String),
    Stop(StopReason),
}

pub struct ControlLoop<'a> {
    client: &'a dyn InferenceClient,
    planner: Box<dyn Planner + 'a>,
    config: LoopConfig,
    state: AgentState,
    phase: Phase,
    previous_plan: Option<Vec<String>>,
    stagnation: u32,
    steps: Vec<StepRecord>,
}

impl<'a> ControlLoop<'a> {
    pub fn new(client: &'a dyn InferenceClient, config: LoopConfig) -> Self {
        Self::with_planner(client, config, Box::new(SingleTaskPlanner))
    }

    pub fn with_planner(client: &'a dyn InferenceClient, config: LoopConfig, planner: Box<dyn Planner + 'a>) -> Self {
        Self {
            client,
            planner,
            config,
            state: AgentState::new(),
            phase: Phase::Planning,
            previous_plan: None,
            stagnation: 0,
            steps: Vec::new(),
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn transition(&mut self, next: Phase) {
        if self.phase != next {
            log::debug!("phase {:?} -> {:?}", self.phase, next);
            self.phase = next;
        }
    }

    fn infer(&self, messages: &[ChatMessage]) -> Result<String, AgentError> {
        Ok(self.client.infer(messages, &self.config.model, self.config.temperature)?)
    }

    /// Drive the model until it terminates, stalls, or runs out of iterations.
    pub fn run(
        &mut self,
        model: &mut SpreadsheetModel,
        instruction: &str,
        channel: &mut dyn UserChannel,
    ) -> Result<RunReport, AgentError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let mut instruction = instruction.trim().to_string();
        let mut iteration = 0u32;
        log::info!("run {} started: {}", run_id, instruction);

        let stop_reason = 'run: loop {
            if iteration >= self.config.max_iters {
                break StopReason::MaxIterations;
            }
            iteration += 1;

            self.transition(Phase::Planning);
            let plan = self.planner.plan(&instruction, &self.state);
            if self.previous_plan.as_ref() == Some(&plan) {
                self.stagnation += 1;
                if self.stagnation >= self.config.stagnation_patience {
                    log::info!("plan unchanged for {} iterations, stopping", self.stagnation);
                    break StopReason::Stagnation;
                }
            } else {
                self.stagnation = 0;
                self.previous_plan = Some(plan.clone());
            }

            for subtask in &plan {
                match self.act(model, &instruction, subtask, iteration, channel)? {
                    Pass::Next => {}
                    Pass::Restart(next) => {
                        instruction = next;
                        continue 'run;
                    }
                    Pass::Stop(reason) => break 'run reason,
                }
            }
        };

        if stop_reason == StopReason::Terminated {
            self.transition(Phase::Terminated);
        }
        log::info!("run {} stopped after {} iterations: {}", run_id, iteration, stop_reason);

        Ok(RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            iterations: iteration,
            stop_reason,
            steps: std::mem::take(&mut self.steps),
            completed_requirements: self.state.completed_requirements.clone(),
        })
    }

    /// One ACTING pass for a subtask, through reflection and commit.
    fn act(
        &mut self,
        model: &mut SpreadsheetModel,
        instruction: &str,
        subtask: &str,
        iteration: u32,
        channel: &mut dyn UserChannel,
    ) -> Result<Pass, AgentError> {
        self.transition(Phase::Acting);
        let before = model.snapshot();
        let messages = prompt::action_prompt(
            &ActionContext {
                instruction,
                subtask,
                sheet: &before,
                hint: &self.config.hint,
            },
            &self.state,
        );
        let reply = response::parse_action_reply(&self.infer(&messages)?);

        let mut step = StepRecord {
            iteration,
            subtask: subtask.to_string(),
            thought: reply.thought.clone(),
            summary: reply.summary.clone(),
            script: reply.script.clone(),
            results: Vec::new(),
            outcome: StepOutcome::Committed,
        };

        let actions = match parse(&reply.script) {
            Ok(actions) => actions,
            Err(e) => {
                log::warn!("discarding unparseable script: {}", e);
                self.state.reject(
                    &format!("The script could not be parsed: {}", e),
                    &reply.summary,
                    &reply.script,
                );
                step.outcome = StepOutcome::ParseFailed(e.to_string());
                self.steps.push(step);
                self.transition(Phase::Retry);
                return Ok(Pass::Next);
            }
        };

        for action in &actions {
            match &action.kind {
                ActionKind::TellUser(message) => {
                    self.transition(Phase::AwaitingUser);
                    step.outcome = StepOutcome::AskedUser;
                    self.steps.push(step);
                    let answer = channel.ask(message).map_err(AgentError::UserChannel)?;
                    if answer.trim().is_empty() {
                        return Ok(Pass::Stop(StopReason::UserAborted));
                    }
                    self.state.record(&reply.thought, &reply.summary, &reply.script);
                    self.state.fold_user_reply(&answer);
                    self.state.clear_error();
                    return Ok(Pass::Restart(answer.trim().to_string()));
                }
                ActionKind::Terminate => {
                    step.outcome = StepOutcome::Terminated;
                    self.steps.push(step);
                    return Ok(Pass::Stop(StopReason::Terminated));
                }
                _ => {
                    let result = interpret(action, model);
                    if !result.success {
                        log::warn!("action failed: {} ({})", action, result.message);
                    }
                    step.results.push(result);
                }
            }
        }

        let after = model.snapshot();

        if self.config.memory {
            let reply = self.infer(&prompt::memory_prompt(instruction, &self.state, &after))?;
            if let Some(note) = response::parse_memory_reply(&reply) {
                if self.state.remember(&note) {
                    log::debug!("memory += {}", note);
                }
            }
        }

        if self.config.reflection {
            self.transition(Phase::Reflecting);
            let messages = collect_messages(&step.results);
            let reflection = response::parse_reflection_reply(&self.infer(&prompt::reflection_prompt(
                subtask,
                &before,
                &after,
                &reply.summary,
                &reply.script,
                &messages,
            ))?);
            if !reflection.verdict.is_accepted() {
                log::info!("step rejected ({}): {}", reflection.verdict.letter(), reflection.thought);
                self.state.reject(&reflection.thought, &reply.summary, &reply.script);
                step.outcome = StepOutcome::Rejected(reflection.verdict);
                self.steps.push(step);
                self.transition(Phase::Retry);
                return Ok(Pass::Next);
            }
        }

        self.commit(instruction, step)?;
        Ok(Pass::Next)
    }

    fn commit(&mut self, instruction: &str, step: StepRecord) -> Result<(), AgentError> {
        self.transition(Phase::Committed);
        let progress = self.infer(&prompt::progress_prompt(instruction, &self.state, &step.summary, &step.script))?;
        self.state.record(&step.thought, &step.summary, &step.script);
        if let Some(text) = response::parse_progress_reply(&progress) {
            self.state.completed_requirements = text;
        }
        self.state.clear_error();
        log::info!("step {} committed: {}", self.state.history_len(), step.summary);
        self.steps.push(step);
        Ok(())
    }
}

fn collect_messages(results: &[ExecutionResult]) -> Vec<String> {
    results
        .iter()
        .map(|r| if r.success { r.message.clone() } else { format!("failed: {}", r.message) })
        .collect()
}
