// gridagent CLI - drive a spreadsheet with the action language, by hand or
// through an inference provider

mod exit_codes;

use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gridagent_actions::{interpret, parse, serialize, Action, ActionKind, ExecutionResult};
use gridagent_agent::{client_for, ControlLoop, LoopConfig, UserChannel};
use gridagent_config::{AgentConfigStatus, AgentDiagnostics, AgentSettings, Provider, ResolvedAgentConfig, Settings};
use gridagent_engine::SpreadsheetModel;

use exit_codes::{
    agent_exit_code, EXIT_ACTION_FAILED, EXIT_ERROR, EXIT_IO, EXIT_MISSING_KEY, EXIT_PARSE, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "gridagent")]
#[command(about = "Drive a spreadsheet with a compact action language")]
#[command(version)]
struct Cli {
    /// More log output on stderr (-v info, -vv debug). GRIDAGENT_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file to use instead of the per-user one
    #[arg(long, global = true, env = "GRIDAGENT_SETTINGS", value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Let the agent work on a spreadsheet until it finishes
    #[command(after_help = "\
Examples:
  gridagent run budget.xlsx -i 'Bold the header row and total column D'
  gridagent run data.csv -i 'Highlight rows flagged with ?' --provider local --model qwen2.5
  gridagent run report.sheet -i 'Fill B2:B20 with 1..19' --out filled.sheet --report run.json")]
    Run {
        /// Spreadsheet to load (.sheet, .csv, .tsv, .xlsx)
        file: PathBuf,

        /// What the agent should do
        #[arg(long, short = 'i')]
        instruction: String,

        /// Write the result here instead of back to FILE
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        #[command(flatten)]
        overrides: AgentOverrides,

        /// Write the run report as JSON
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Execute an action script against a spreadsheet, no model involved
    #[command(after_help = "\
Examples:
  gridagent apply data.csv --script fixes.txt
  echo 'REGEX ^.*$ | SELECT A1:D1; REGEX ^.*$ | FORMAT style: bold' | gridagent apply data.xlsx --script -")]
    Apply {
        /// Spreadsheet to load
        file: PathBuf,

        /// Script file, or - for stdin
        #[arg(long, short = 's')]
        script: String,

        /// Write the result here instead of back to FILE
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Parse an action script and report errors
    Check {
        /// Script file, or - for stdin
        script: String,

        /// Print the canonical form
        #[arg(long)]
        fmt: bool,
    },

    /// Agent configuration commands
    #[command(subcommand)]
    Ai(AiCommands),
}

#[derive(Subcommand)]
enum AiCommands {
    /// Show the resolved agent configuration and where the API key comes from
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Per-run overrides of the `agent` settings section.
#[derive(clap::Args, Debug, Default)]
struct AgentOverrides {
    /// none, local, openai, anthropic, deepseek, gemini
    #[arg(long)]
    provider: Option<String>,

    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    temperature: Option<f32>,

    #[arg(long, value_name = "N")]
    max_iters: Option<u32>,

    /// Identical plans tolerated before giving up
    #[arg(long, value_name = "N")]
    patience: Option<u32>,

    #[arg(long)]
    no_reflection: bool,

    /// Collect notes about the sheet between steps
    #[arg(long)]
    memory: bool,
}

impl AgentOverrides {
    fn apply(&self, agent: &mut AgentSettings) -> Result<(), CliError> {
        if let Some(name) = &self.provider {
            agent.provider = Provider::parse(name).ok_or_else(|| {
                CliError::args(format!("unknown provider '{}'", name))
                    .with_hint("one of: none, local, openai, anthropic, deepseek, gemini")
            })?;
        }
        if let Some(model) = &self.model {
            agent.model = model.clone();
        }
        if let Some(t) = self.temperature {
            agent.temperature = t;
        }
        if let Some(n) = self.max_iters {
            agent.max_iters = n;
        }
        if let Some(n) = self.patience {
            agent.stagnation_patience = n;
        }
        if self.no_reflection {
            agent.reflection = false;
        }
        if self.memory {
            agent.memory = true;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(EXIT_PARSE, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("GRIDAGENT_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    // Also installs the log -> tracing bridge for the library crates
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Only commands that talk to a provider read settings
    let load_settings = || match &cli.settings {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings_path = cli.settings.clone().unwrap_or_else(Settings::config_path);

    let result = match &cli.command {
        Commands::Run { file, instruction, out, overrides, report } => {
            cmd_run(load_settings(), file, instruction, out.clone(), overrides, report.clone())
        }
        Commands::Apply { file, script, out, json } => cmd_apply(file, script, out.clone(), *json),
        Commands::Check { script, fmt } => cmd_check(script, *fmt),
        Commands::Ai(AiCommands::Doctor { json }) => cmd_ai_doctor(load_settings(), &settings_path, *json),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

// ============================================================================
// shared helpers
// ============================================================================

fn read_script(source: &str) -> Result<String, CliError> {
    if source == "-" {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| CliError::io(format!("stdin: {}", e)))?;
        Ok(text)
    } else {
        fs::read_to_string(source).map_err(|e| CliError::io(format!("{}: {}", source, e)))
    }
}

fn parse_script(text: &str) -> Result<Vec<Action>, CliError> {
    parse(text).map_err(|e| CliError::parse(e.to_string()))
}

fn load_model(path: &Path) -> Result<SpreadsheetModel, CliError> {
    let sheet = gridagent_io::load(path).map_err(CliError::io)?;
    Ok(SpreadsheetModel::from_sheet(sheet))
}

fn save_model(model: &SpreadsheetModel, path: &Path) -> Result<(), CliError> {
    gridagent_io::save(&model.sheet, path).map_err(CliError::io)?;
    tracing::info!("saved {}", path.display());
    Ok(())
}

// ============================================================================
// run
// ============================================================================

/// Asks on stderr, reads one line from stdin. EOF counts as an empty reply.
struct StdinChannel;

impl UserChannel for StdinChannel {
    fn ask(&mut self, message: &str) -> Result<String, String> {
        let mut stderr = io::stderr();
        writeln!(stderr, "agent: {}", message).map_err(|e| e.to_string())?;
        write!(stderr, "> ").map_err(|e| e.to_string())?;
        stderr.flush().map_err(|e| e.to_string())?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line).map_err(|e| e.to_string())?;
        Ok(line.trim().to_string())
    }
}

fn cmd_run(
    mut settings: Settings,
    file: &Path,
    instruction: &str,
    out: Option<PathBuf>,
    overrides: &AgentOverrides,
    report_path: Option<PathBuf>,
) -> Result<(), CliError> {
    if instruction.trim().is_empty() {
        return Err(CliError::args("--instruction is empty"));
    }
    overrides.apply(&mut settings.agent)?;

    let config = ResolvedAgentConfig::from_settings(&settings.agent);
    if let Some(reason) = config.blocking_reason() {
        let code = match config.status {
            AgentConfigStatus::MissingKey => EXIT_MISSING_KEY,
            _ => EXIT_USAGE,
        };
        return Err(CliError::new(code, reason).with_hint("run `gridagent ai doctor` for details"));
    }

    let client = client_for(&config).map_err(|e| {
        let err = gridagent_agent::AgentError::from(e);
        CliError::new(agent_exit_code(&err), err.to_string())
    })?;
    let mut model = load_model(file)?;
    tracing::info!("{} via {} ({})", file.display(), config.provider, config.model);

    let mut agent = ControlLoop::new(client.as_ref(), LoopConfig::from_resolved(&config));
    let report = agent
        .run(&mut model, instruction, &mut StdinChannel)
        .map_err(|e| CliError::new(agent_exit_code(&e), e.to_string()).with_hint("the spreadsheet was not saved"))?;

    let target = out.unwrap_or_else(|| file.to_path_buf());
    save_model(&model, &target)?;

    if let Some(path) = report_path {
        let json = report.to_json().map_err(|e| CliError::new(EXIT_ERROR, e))?;
        fs::write(&path, json).map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?;
    }

    println!(
        "{}: {} after {} iteration(s), {} step(s) committed, {} failed action(s)",
        target.display(),
        report.stop_reason,
        report.iterations,
        report.committed_steps(),
        report.failed_actions()
    );
    Ok(())
}

// ============================================================================
// apply
// ============================================================================

fn cmd_apply(file: &Path, script: &str, out: Option<PathBuf>, json: bool) -> Result<(), CliError> {
    let actions = parse_script(&read_script(script)?)?;
    let mut model = load_model(file)?;

    let mut results: Vec<(String, ExecutionResult)> = Vec::new();
    for action in &actions {
        if action.is_terminate() {
            break;
        }
        if let ActionKind::TellUser(message) = &action.kind {
            eprintln!("agent: {}", message);
        }
        let result = interpret(action, &mut model);
        if !result.success {
            tracing::warn!("{} ({})", action, result.message);
        }
        results.push((action.to_string(), result));
    }

    let target = out.unwrap_or_else(|| file.to_path_buf());
    save_model(&model, &target)?;

    if json {
        let rows: Vec<serde_json::Value> = results
            .iter()
            .map(|(action, r)| serde_json::json!({ "action": action, "success": r.success, "message": r.message }))
            .collect();
        let text = serde_json::to_string_pretty(&rows).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{}", text);
    } else {
        for (action, r) in &results {
            println!("{} {}  # {}", if r.success { "ok  " } else { "FAIL" }, action, r.message);
        }
    }

    let failed = results.iter().filter(|(_, r)| !r.success).count();
    if failed > 0 {
        return Err(CliError::new(
            EXIT_ACTION_FAILED,
            format!("{} of {} action(s) failed", failed, results.len()),
        ));
    }
    Ok(())
}

// ============================================================================
// check
// ============================================================================

fn cmd_check(script: &str, fmt: bool) -> Result<(), CliError> {
    let actions = parse_script(&read_script(script)?)?;
    if fmt {
        let text = serialize(&actions);
        if !text.is_empty() {
            println!("{}", text);
        }
    } else {
        println!("ok: {} action(s)", actions.len());
    }
    Ok(())
}

// ============================================================================
// ai doctor
// ============================================================================

fn cmd_ai_doctor(settings: Settings, settings_path: &Path, json: bool) -> Result<(), CliError> {
    let mut diag = AgentDiagnostics::from_resolved(ResolvedAgentConfig::from_settings(&settings.agent));
    diag.config_path = settings_path.display().to_string();
    let c = &diag.config;

    if json {
        let out = serde_json::json!({
            "settings_file": diag.config_path,
            "provider": c.provider.name(),
            "status": c.status.as_str(),
            "blocking_reason": c.blocking_reason(),
            "model": c.model,
            "endpoint": c.endpoint,
            "key": if c.api_key.is_some() { "present" } else { "missing" },
            "key_source": c.key_source.describe(),
            "keychain": if diag.keychain_available { "ok" } else { "unavailable" },
            "temperature": c.temperature,
            "max_iters": c.max_iters,
            "stagnation_patience": c.stagnation_patience,
            "reflection": c.reflection,
            "memory": c.memory,
        });
        let text = serde_json::to_string_pretty(&out).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        println!("{}", text);
    } else {
        print!("{}", diag);
    }
    Ok(())
}
