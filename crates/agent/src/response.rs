//! Splits model replies into their `### Heading ###` sections.

const THOUGHT: &str = "### Thought ###";
const ACTION: &str = "### Action ###";
const OPERATION: &str = "### Operation ###";
const ANSWER: &str = "### Answer ###";
const COMPLETED: &str = "### Completed contents ###";
const IMPORTANT: &str = "### Important content ###";

/// Text between `header` and the next `###` heading (or end of reply).
pub fn section<'a>(text: &'a str, header: &str) -> Option<&'a str> {
    let start = text.find(header)? + header.len();
    let rest = &text[start..];
    let end = rest.find("\n###").map(|i| i + 1).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Text after `header` to the end of the reply, whatever follows.
fn tail<'a>(text: &'a str, header: &str) -> Option<&'a str> {
    let start = text.find(header)? + header.len();
    Some(text[start..].trim())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionReply {
    pub thought: String,
    pub script: String,
    pub summary: String,
}

pub fn parse_action_reply(text: &str) -> ActionReply {
    let script = match section(text, ACTION) {
        Some(script) => strip_code_fence(script),
        None => strip_code_fence(text.trim()),
    };
    ActionReply {
        thought: section(text, THOUGHT).unwrap_or_default().to_string(),
        script: script.to_string(),
        summary: section(text, OPERATION).unwrap_or_default().to_string(),
    }
}

/// Models sometimes wrap the script in a ``` fence.
fn strip_code_fence(script: &str) -> &str {
    let Some(inner) = script.strip_prefix("```") else {
        return script;
    };
    let inner = inner.split_once('\n').map(|(_, body)| body).unwrap_or("");
    inner.trim_end().strip_suffix("```").unwrap_or(inner).trim()
}

/// Reflection outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// A: result matches the expectation
    Matches,
    /// B: result is wrong
    Incorrect,
    /// C: nothing visibly changed
    NoChange,
}

impl Verdict {
    pub fn letter(&self) -> char {
        match self {
            Verdict::Matches => 'A',
            Verdict::Incorrect => 'B',
            Verdict::NoChange => 'C',
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Matches)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectionReply {
    pub thought: String,
    pub verdict: Verdict,
}

/// An answer naming none of A/B/C is accepted.
pub fn parse_reflection_reply(text: &str) -> ReflectionReply {
    let answer = section(text, ANSWER).unwrap_or(text);
    // The first standalone A, B or C decides; explanations may follow it.
    let verdict = answer
        .split(|c: char| !c.is_ascii_alphanumeric())
        .find_map(|token| match token {
            "A" => Some(Verdict::Matches),
            "B" => Some(Verdict::Incorrect),
            "C" => Some(Verdict::NoChange),
            _ => None,
        })
        .unwrap_or(Verdict::Matches);
    ReflectionReply {
        thought: section(text, THOUGHT).unwrap_or_default().to_string(),
        verdict,
    }
}

/// New `completed_requirements` text, if the reply has one.
pub fn parse_progress_reply(text: &str) -> Option<String> {
    tail(text, COMPLETED)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The memory note, up to the first blank line.
pub fn parse_memory_reply(text: &str) -> Option<String> {
    let body = tail(text, IMPORTANT)?;
    let note = body.split("\n\n").next().unwrap_or_default().trim();
    if note.is_empty() || note.contains("None") {
        None
    } else {
        Some(note.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_reply_sections() {
        let reply = "### Thought ###\nColumn C holds the flags.\n\n### Action ###\nREGEX ^.*$ | SELECT C1:C-1\nREGEX ^\\?.*$ | FORMAT style: backgroundcolor, color: yellow\n\n### Operation ###\nHighlight rows flagged with ?\n";
        let parsed = parse_action_reply(reply);
        assert_eq!(parsed.thought, "Column C holds the flags.");
        assert_eq!(
            parsed.script,
            "REGEX ^.*$ | SELECT C1:C-1\nREGEX ^\\?.*$ | FORMAT style: backgroundcolor, color: yellow"
        );
        assert_eq!(parsed.summary, "Highlight rows flagged with ?");
    }

    #[test]
    fn test_bare_reply_is_the_script() {
        let parsed = parse_action_reply("REGEX ^.*$ | TERMINATE\n");
        assert_eq!(parsed.script, "REGEX ^.*$ | TERMINATE");
        assert!(parsed.thought.is_empty());
        assert!(parsed.summary.is_empty());
    }

    #[test]
    fn test_fenced_script() {
        let parsed = parse_action_reply("### Action ###\n```text\nREGEX ^.*$ | SELECT A1\n```\n### Operation ###\nx");
        assert_eq!(parsed.script, "REGEX ^.*$ | SELECT A1");
    }

    #[test]
    fn test_reflection_verdicts() {
        let b = parse_reflection_reply("### Thought ###\nThe fill went to column D.\n### Answer ###\nB\n");
        assert_eq!(b.verdict, Verdict::Incorrect);
        assert_eq!(b.thought, "The fill went to column D.");

        assert_eq!(parse_reflection_reply("### Answer ###\nC").verdict, Verdict::NoChange);
        assert_eq!(parse_reflection_reply("### Answer ###\nA").verdict, Verdict::Matches);
        assert_eq!(parse_reflection_reply("### Answer ###\nunsure").verdict, Verdict::Matches);

        // Explanations after the letter do not change the verdict
        assert_eq!(
            parse_reflection_reply("### Thought ###\nwrong column\n### Answer ###\nB (Applied to the wrong column)").verdict,
            Verdict::Incorrect
        );
        assert_eq!(
            parse_reflection_reply("### Answer ###\nC: After the operation nothing changed").verdict,
            Verdict::NoChange
        );
        assert_eq!(parse_reflection_reply("### Answer ###\nAnswer: B").verdict, Verdict::Incorrect);
    }

    #[test]
    fn test_progress_and_memory() {
        assert_eq!(
            parse_progress_reply("### Completed contents ###\nHighlighted flagged rows."),
            Some("Highlighted flagged rows.".to_string())
        );
        assert_eq!(parse_progress_reply("nothing here"), None);

        assert_eq!(
            parse_memory_reply("### Important content ###\nTotal revenue is 4200\n\nextra chatter"),
            Some("Total revenue is 4200".to_string())
        );
        assert_eq!(parse_memory_reply("### Important content ###\nNone"), None);
    }
}
