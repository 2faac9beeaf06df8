// Prompt construction for the four inference calls of a pass:
// action, memory, reflection, progress.

use crate::client::ChatMessage;
use crate::state::AgentState;

const ACTION_SYSTEM: &str = "You operate a spreadsheet by writing scripts in a small action language. \
You see the sheet contents as tab-separated text and reply with the next script to run.";

const REFLECTION_SYSTEM: &str = "You review spreadsheet edits. Compare the sheet before and after an \
operation and judge whether the operation did what it was meant to do.";

const PROGRESS_SYSTEM: &str = "You keep a short running record of what has been accomplished on a \
spreadsheet task.";

const MEMORY_SYSTEM: &str = "You extract facts from a spreadsheet that will be needed later in a task.";

const ACTION_LANGUAGE: &str = r#"One action per line, each written as `REGEX <pattern> | <VERB> <params>`.
The pattern restricts the action to cells whose value matches it; use ^.*$ to match every cell.
Columns are letters and rows are 1-based. A row of -1 means the last non-empty row of that column.

REGEX ^.*$ | SELECT A1:C10            select a rectangle (SELECT C1 selects C1 down to the last used row)
REGEX ^.*$ | SELECTANDDRAG A1:A10     fill from the first cell across the range
REGEX ^.*$ | FORMAT style: bold       style the selection; keys: style, color, size, alignment, border, wrap, value_format
REGEX ^.*$ | SET =SUM(B2:B9)          write a value or formula into every selected cell
REGEX ^.*$ | TOOLACTION copy          tools: copy, cut, paste, paste_as_values, delete, bold, italic, underline, clear_formatting, conditional_formatting <color>, number_format <code>
REGEX ^.*$ | READ A1:D5               read cell values for later steps
REGEX ^.*$ | TELLUSER <question>      ask the user when the request is ambiguous
REGEX ^.*$ | TERMINATE                stop when the task is complete

FORMAT styles: bold, italic, underline, strikethrough, backgroundcolor, fontcolor, fontsize,
horizontalalignment, verticalalignment, border, wraptext, numberformat, none.
Example: REGEX ^\?.*$ | FORMAT style: backgroundcolor, color: yellow
Example: REGEX ^.*$ | FORMAT style: border, border: {top: True, bottom: True}"#;

/// Everything the action prompt draws from besides the agent state.
pub struct ActionContext<'a> {
    pub instruction: &'a str,
    pub subtask: &'a str,
    pub sheet: &'a str,
    pub hint: &'a str,
}

fn push_section(prompt: &mut String, title: &str, body: &str) {
    prompt.push_str("### ");
    prompt.push_str(title);
    prompt.push_str(" ###\n");
    prompt.push_str(body.trim_end());
    prompt.push_str("\n\n");
}

fn render_sheet(sheet: &str) -> &str {
    if sheet.trim().is_empty() {
        "(the sheet is empty)"
    } else {
        sheet
    }
}

pub fn action_prompt(ctx: &ActionContext<'_>, state: &AgentState) -> Vec<ChatMessage> {
    let mut prompt = String::new();

    let mut task = ctx.instruction.trim().to_string();
    if ctx.subtask.trim() != ctx.instruction.trim() {
        task.push_str("\nCurrent subtask: ");
        task.push_str(ctx.subtask.trim());
    }
    push_section(&mut prompt, "Task", &task);
    push_section(&mut prompt, "Sheet", render_sheet(ctx.sheet));

    if state.history_len() > 0 {
        let history: Vec<String> = state
            .summary_history
            .iter()
            .zip(&state.action_history)
            .enumerate()
            .map(|(i, (summary, action))| format!("Step {}: {}\n{}", i + 1, summary, action))
            .collect();
        push_section(&mut prompt, "History of operations", &history.join("\n"));
    }
    if !state.completed_requirements.trim().is_empty() {
        push_section(&mut prompt, "Progress", &state.completed_requirements);
    }
    if !state.memory.trim().is_empty() {
        push_section(&mut prompt, "Memory", &state.memory);
    }
    if state.error_flag {
        let mut failed = String::from("The previous attempt did not work and was discarded.\n");
        if !state.last_failed_summary.is_empty() {
            failed.push_str(&format!("Intended: {}\n", state.last_failed_summary));
        }
        if !state.last_failed_action.is_empty() {
            failed.push_str(&format!("Script:\n{}\n", state.last_failed_action));
        }
        if !state.reflection_thought.is_empty() {
            failed.push_str(&format!("Why it failed: {}\n", state.reflection_thought));
        }
        push_section(&mut prompt, "Last operation", &failed);
    }
    if !ctx.hint.trim().is_empty() {
        push_section(&mut prompt, "Hint", ctx.hint);
    }

    push_section(&mut prompt, "Action language", ACTION_LANGUAGE);
    push_section(
        &mut prompt,
        "Output format",
        "### Thought ###\nyour reasoning about the sheet and the next step\n\n\
         ### Action ###\nthe script, one action per line\n\n\
         ### Operation ###\na one-line summary of what the script does",
    );

    vec![ChatMessage::system(ACTION_SYSTEM), ChatMessage::user(prompt)]
}

pub fn reflection_prompt(
    instruction: &str,
    before: &str,
    after: &str,
    summary: &str,
    script: &str,
    results: &[String],
) -> Vec<ChatMessage> {
    let mut prompt = String::new();
    push_section(&mut prompt, "Task", instruction);
    push_section(&mut prompt, "Sheet before", render_sheet(before));
    push_section(&mut prompt, "Operation", &format!("{}\n{}", summary, script));
    if !results.is_empty() {
        push_section(&mut prompt, "Execution messages", &results.join("\n"));
    }
    push_section(&mut prompt, "Sheet after", render_sheet(after));
    push_section(
        &mut prompt,
        "Output format",
        "### Thought ###\nwhat changed and whether it is what the operation intended\n\n\
         ### Answer ###\nA if the result matches the intent, B if the result is wrong, C if nothing changed",
    );
    vec![ChatMessage::system(REFLECTION_SYSTEM), ChatMessage::user(prompt)]
}

pub fn progress_prompt(instruction: &str, state: &AgentState, summary: &str, script: &str) -> Vec<ChatMessage> {
    let mut prompt = String::new();
    push_section(&mut prompt, "Task", instruction);
    let previous = if state.completed_requirements.trim().is_empty() {
        "Nothing yet."
    } else {
        state.completed_requirements.as_str()
    };
    push_section(&mut prompt, "Completed so far", previous);
    push_section(&mut prompt, "Latest operation", &format!("{}\n{}", summary, script));
    push_section(
        &mut prompt,
        "Output format",
        "### Completed contents ###\nan updated summary of everything completed, including the latest operation",
    );
    vec![ChatMessage::system(PROGRESS_SYSTEM), ChatMessage::user(prompt)]
}

pub fn memory_prompt(instruction: &str, state: &AgentState, sheet: &str) -> Vec<ChatMessage> {
    let mut prompt = String::new();
    push_section(&mut prompt, "Task", instruction);
    push_section(&mut prompt, "Sheet", render_sheet(sheet));
    if !state.memory.trim().is_empty() {
        push_section(&mut prompt, "Already noted", &state.memory);
    }
    push_section(
        &mut prompt,
        "Output format",
        "### Important content ###\nfacts on the sheet the task will need that are not already noted, or None",
    );
    vec![ChatMessage::system(MEMORY_SYSTEM), ChatMessage::user(prompt)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Role;

    #[test]
    fn test_action_prompt_includes_failed_context() {
        let mut state = AgentState::new();
        state.reject("Nothing was highlighted", "Highlight flagged rows", "REGEX ^\\?.*$ | FORMAT style: bold");
        let ctx = ActionContext {
            instruction: "Highlight rows flagged with ?",
            subtask: "Highlight rows flagged with ?",
            sheet: "Name\tFlag\nAda\t?",
            hint: "",
        };
        let messages = action_prompt(&ctx, &state);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        let user = &messages[1].content;
        assert!(user.contains("### Last operation ###"));
        assert!(user.contains("Intended: Highlight flagged rows"));
        assert!(user.contains("REGEX ^\\?.*$ | FORMAT style: bold"));
        assert!(user.contains("Why it failed: Nothing was highlighted"));
        assert!(!user.contains("Current subtask"));
        assert!(!user.contains("### Hint ###"));
    }

    #[test]
    fn test_action_prompt_history_and_hint() {
        let mut state = AgentState::new();
        state.record("t", "Select column C", "REGEX ^.*$ | SELECT C1");
        state.completed_requirements = "Selected column C.".into();
        let ctx = ActionContext {
            instruction: "Clean the sheet",
            subtask: "Bold the header",
            sheet: "",
            hint: "Headers are on row 1.",
        };
        let user = action_prompt(&ctx, &state)[1].content.clone();

        assert!(user.contains("Current subtask: Bold the header"));
        assert!(user.contains("Step 1: Select column C\nREGEX ^.*$ | SELECT C1"));
        assert!(user.contains("### Progress ###\nSelected column C."));
        assert!(user.contains("### Hint ###\nHeaders are on row 1."));
        assert!(user.contains("(the sheet is empty)"));
        assert!(!user.contains("### Last operation ###"));
    }
}
