//! Text <-> [`Action`] conversion.
//!
//! Parsing is fail-fast: the first bad entry rejects the whole script, so a
//! caller never runs half of what the model meant.

use std::collections::BTreeMap;

use regex::Regex;

use crate::action::{Action, ActionKind, CellRef, FormatSpec, FormatStyle, RangeRef, RowRef, DEFAULT_PATTERN};
use crate::error::ParseError;

/// Parse an action script. Blank entries are skipped.
pub fn parse(text: &str) -> Result<Vec<Action>, ParseError> {
    split_entries(text)
        .iter()
        .enumerate()
        .map(|(i, entry)| parse_entry(i + 1, entry))
        .collect()
}

/// Canonical text, one entry per line.
pub fn serialize(actions: &[Action]) -> String {
    actions.iter().map(Action::to_string).collect::<Vec<_>>().join("\n")
}

/// Split on newlines, and on `;` when the next entry starts with `REGEX`.
/// A `;` anywhere else (inside a formula or a message) stays in the text.
fn split_entries(text: &str) -> Vec<String> {
    let mut entries = Vec::new();
    for line in text.lines() {
        let mut current = String::new();
        let mut rest = line;
        while let Some(pos) = rest.find(';') {
            let (head, tail) = rest.split_at(pos);
            let tail = &tail[1..];
            current.push_str(head);
            if starts_entry(tail) {
                entries.push(std::mem::take(&mut current));
            } else {
                current.push(';');
            }
            rest = tail;
        }
        current.push_str(rest);
        entries.push(current);
    }
    entries.into_iter().filter(|e| !e.trim().is_empty()).collect()
}

/// True when the text after a `;` begins a new entry. An empty tail makes the
/// `;` a line terminator.
fn starts_entry(s: &str) -> bool {
    let s = s.trim_start();
    s.is_empty() || s.get(..5).is_some_and(|w| w.eq_ignore_ascii_case("REGEX"))
}

/// Byte offset of the first `|` not escaped by an odd run of backslashes.
fn find_unescaped_pipe(s: &str) -> Option<usize> {
    let mut backslashes = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '\\' => {
                backslashes += 1;
                continue;
            }
            '|' if backslashes % 2 == 0 => return Some(i),
            _ => {}
        }
        backslashes = 0;
    }
    None
}

fn parse_entry(entry: usize, raw: &str) -> Result<Action, ParseError> {
    let text = raw.trim();
    let malformed = || ParseError::MalformedEntry { entry, text: text.to_string() };

    let keyword = text.get(..5).filter(|w| w.eq_ignore_ascii_case("REGEX")).ok_or_else(malformed)?;
    let after = &text[keyword.len()..];
    if !after.starts_with(|c: char| c.is_whitespace() || c == '|') {
        return Err(malformed());
    }

    let pipe = find_unescaped_pipe(after).ok_or_else(malformed)?;
    let pattern = after[..pipe].trim();
    let command = after[pipe + 1..].trim();

    let (verb, params) = match command.split_once(char::is_whitespace) {
        Some((verb, params)) => (verb, params.trim()),
        None => (command, ""),
    };
    if verb.is_empty() {
        return Err(malformed());
    }

    let filter = if pattern.is_empty() || pattern == DEFAULT_PATTERN {
        None
    } else {
        Regex::new(pattern).map_err(|e| ParseError::InvalidPattern {
            entry,
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Some(pattern.to_string())
    };

    let kind = parse_command(entry, verb, params)?;
    Ok(Action { filter, kind })
}

fn parse_command(entry: usize, verb: &str, params: &str) -> Result<ActionKind, ParseError> {
    let canonical: String = verb.chars().filter(|c| *c != '_').collect::<String>().to_ascii_uppercase();
    let invalid = |verb: &'static str, reason: String| ParseError::InvalidParams { entry, verb, reason };

    let kind = match canonical.as_str() {
        "SELECT" => ActionKind::Select(parse_range(params, true).map_err(|r| invalid("SELECT", r))?),
        "READ" => ActionKind::Read(parse_range(params, true).map_err(|r| invalid("READ", r))?),
        "SELECTANDDRAG" => {
            ActionKind::SelectAndDrag(parse_range(params, false).map_err(|r| invalid("SELECTANDDRAG", r))?)
        }
        "FORMAT" => ActionKind::Format(parse_format(params).map_err(|r| invalid("FORMAT", r))?),
        "SET" => ActionKind::Set(params.to_string()),
        "TOOLACTION" => {
            if params.is_empty() {
                return Err(invalid("TOOLACTION", "missing tool name".into()));
            }
            ActionKind::ToolAction(params.to_string())
        }
        "TELLUSER" => ActionKind::TellUser(params.to_string()),
        "TERMINATE" => {
            if !params.is_empty() {
                return Err(invalid("TERMINATE", format!("takes no parameters, got '{}'", params)));
            }
            ActionKind::Terminate
        }
        _ => return Err(ParseError::UnknownVerb { entry, verb: verb.to_string() }),
    };
    Ok(kind)
}

/// `C1:C-1`, or a single ref (meaning down to the column's last used row).
fn parse_range(params: &str, allow_single: bool) -> Result<RangeRef, String> {
    match params.split_once(':') {
        Some((from, to)) => Ok(RangeRef::new(parse_ref(from)?, parse_ref(to)?)),
        None if allow_single => Ok(RangeRef::column_from(parse_ref(params)?)),
        None => Err(format!("expected '<ref>:<ref>', got '{}'", params)),
    }
}

/// `[A-Z]+-?\d+`
fn parse_ref(s: &str) -> Result<CellRef, String> {
    let s = s.trim();
    let split = s
        .find(|c: char| c == '-' || c.is_ascii_digit())
        .ok_or_else(|| format!("bad cell reference '{}'", s))?;
    let (letters, digits) = s.split_at(split);
    let digits_only = digits.strip_prefix('-').unwrap_or(digits);

    if letters.is_empty()
        || !letters.chars().all(|c| c.is_ascii_alphabetic())
        || digits_only.is_empty()
        || !digits_only.chars().all(|c| c.is_ascii_digit())
    {
        return Err(format!("bad cell reference '{}'", s));
    }

    let row: i64 = digits.parse().map_err(|_| format!("row out of range in '{}'", s))?;
    let row = match row {
        -1 => RowRef::Last,
        r if r >= 0 => RowRef::At(u32::try_from(r).map_err(|_| format!("row out of range in '{}'", s))?),
        _ => return Err(format!("negative row in '{}' (only -1 is allowed)", s)),
    };
    Ok(CellRef { col: letters.to_ascii_uppercase(), row })
}

/// Split on commas outside `{...}`.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

const FORMAT_KEYS: &[&str] = &[
    "style",
    "color",
    "size",
    "alignment",
    "wrap",
    "border",
    "value_format",
    "valueformat",
    "number_format",
];

fn is_value_format_key(key: &str) -> bool {
    matches!(key, "value_format" | "valueformat" | "number_format")
}

fn parse_format(params: &str) -> Result<FormatSpec, String> {
    // A piece that does not start with a known key continues the previous
    // value_format: `#,##0.00` or `#,##0 "h:m"`
    let mut pairs: Vec<(String, String)> = Vec::new();
    for part in split_top_level(params) {
        let pair = part
            .split_once(':')
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value))
            .filter(|(key, _)| FORMAT_KEYS.contains(&key.as_str()));
        match pair {
            Some((key, value)) => pairs.push((key, value.to_string())),
            None => {
                let continued = pairs
                    .last_mut()
                    .filter(|(key, _)| is_value_format_key(key) || !part.contains(':'));
                if let Some((_, value)) = continued {
                    value.push(',');
                    value.push_str(part);
                } else if let Some((key, _)) = part.split_once(':') {
                    return Err(format!("unknown key '{}'", key.trim()));
                } else if !part.trim().is_empty() {
                    return Err(format!("expected 'key: value', got '{}'", part.trim()));
                }
            }
        }
    }

    let mut style = None;
    let mut spec = FormatSpec::new(FormatStyle::None);
    for (key, value) in pairs {
        let value = value.trim();
        match key.as_str() {
            "style" => {
                style = Some(FormatStyle::parse(value).ok_or_else(|| format!("unknown style '{}'", value))?);
            }
            "color" => spec.color = Some(value.to_string()),
            "size" => spec.size = Some(parse_size(value)?),
            "alignment" => spec.alignment = Some(value.to_string()),
            "wrap" => spec.wrap = Some(parse_bool(value).ok_or_else(|| format!("wrap must be True or False, got '{}'", value))?),
            "border" => spec.border = parse_border(value)?,
            key if is_value_format_key(key) => spec.value_format = Some(value.to_string()),
            other => return Err(format!("unknown key '{}'", other)),
        }
    }

    spec.style = style.ok_or_else(|| "missing 'style'".to_string())?;
    Ok(spec)
}

fn parse_size(value: &str) -> Result<u32, String> {
    if let Ok(size) = value.parse::<u32>() {
        return Ok(size);
    }
    match value.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f >= 0.0 && f <= u32::MAX as f64 => Ok(f as u32),
        _ => Err(format!("size must be a whole number, got '{}'", value)),
    }
}

/// `{ top: True, bottom: False }`
fn parse_border(value: &str) -> Result<BTreeMap<String, bool>, String> {
    let inner = value
        .strip_prefix('{')
        .and_then(|v| v.strip_suffix('}'))
        .ok_or_else(|| format!("border must be '{{ side: True|False, ... }}', got '{}'", value))?;

    let mut sides = BTreeMap::new();
    for part in inner.split(',').filter(|p| !p.trim().is_empty()) {
        let (side, on) = part
            .split_once(':')
            .ok_or_else(|| format!("expected 'side: True|False', got '{}'", part.trim()))?;
        let side = side.trim().to_ascii_lowercase();
        if !matches!(side.as_str(), "top" | "bottom" | "left" | "right" | "all") {
            return Err(format!("unknown border side '{}'", side));
        }
        let on = parse_bool(on).ok_or_else(|| format!("border {} must be True or False", side))?;
        sides.insert(side, on);
    }
    Ok(sides)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_select_column_and_format() {
        let actions = parse(r"REGEX ^.*$ | SELECT C1:C-1 ; REGEX ^\?.*$ | FORMAT style: backgroundcolor, color: yellow").unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].filter, None);
        assert_eq!(
            actions[0].kind,
            ActionKind::Select(RangeRef::new(CellRef::new("C", 1), CellRef::last("C")))
        );
        assert_eq!(actions[1].filter.as_deref(), Some(r"^\?.*$"));
        match &actions[1].kind {
            ActionKind::Format(spec) => {
                assert_eq!(spec.style, FormatStyle::BackgroundColor);
                assert_eq!(spec.color.as_deref(), Some("yellow"));
            }
            other => panic!("expected format, got {:?}", other),
        }
    }

    #[test]
    fn test_single_ref_selects_to_last_row() {
        let actions = parse("REGEX ^.*$ | READ B2").unwrap();
        assert_eq!(actions[0].kind, ActionKind::Read(RangeRef::new(CellRef::new("B", 2), CellRef::last("B"))));
    }

    #[test]
    fn test_missing_pipe_is_malformed() {
        let err = parse("REGEX ^.*$ SELECT A1").unwrap_err();
        assert!(matches!(err, ParseError::MalformedEntry { entry: 1, .. }));
    }

    #[test]
    fn test_one_bad_entry_fails_batch() {
        let script = "REGEX ^.*$ | SELECT A1:A3\nREGEX ^.*$ | FLY away\nREGEX ^.*$ | TERMINATE";
        let err = parse(script).unwrap_err();
        assert_eq!(err, ParseError::UnknownVerb { entry: 2, verb: "FLY".into() });
    }

    #[test]
    fn test_verbs_case_insensitive() {
        let actions = parse("regex ^a | selectanddrag a1:a4\nREGEX ^.*$ | Tell_User done").unwrap();
        assert_eq!(
            actions[0].kind,
            ActionKind::SelectAndDrag(RangeRef::new(CellRef::new("A", 1), CellRef::new("A", 4)))
        );
        assert_eq!(actions[1].kind, ActionKind::TellUser("done".into()));
    }

    #[test]
    fn test_drag_requires_two_refs() {
        assert!(matches!(
            parse("REGEX ^.*$ | SELECTANDDRAG A1"),
            Err(ParseError::InvalidParams { verb: "SELECTANDDRAG", .. })
        ));
    }

    #[test]
    fn test_terminate_rejects_params() {
        assert!(parse("REGEX ^.*$ | TERMINATE now").is_err());
        assert_eq!(parse("REGEX ^.*$ | TERMINATE").unwrap()[0].kind, ActionKind::Terminate);
    }

    #[test]
    fn test_bad_refs() {
        assert!(parse("REGEX ^.*$ | SELECT 1A").is_err());
        assert!(parse("REGEX ^.*$ | SELECT A-2").is_err());
        assert!(parse("REGEX ^.*$ | SELECT A1:B").is_err());
    }

    #[test]
    fn test_invalid_regex() {
        assert!(matches!(
            parse("REGEX ([a-z | SET x"),
            Err(ParseError::InvalidPattern { entry: 1, .. })
        ));
    }

    #[test]
    fn test_escaped_pipe_in_pattern() {
        let actions = parse(r"REGEX a\|b | SET x").unwrap();
        assert_eq!(actions[0].filter.as_deref(), Some(r"a\|b"));
        assert_eq!(actions[0].kind, ActionKind::Set("x".into()));
    }

    #[test]
    fn test_semicolon_inside_text_kept() {
        let actions = parse("REGEX ^.*$ | TELLUSER Done; totals are in row 9; REGEX ^.*$ | TERMINATE").unwrap();
        assert_eq!(actions[0].kind, ActionKind::TellUser("Done; totals are in row 9".into()));
        assert!(actions[1].is_terminate());
    }

    #[test]
    fn test_format_border_and_wrap() {
        let actions =
            parse("REGEX ^.*$ | FORMAT style: border, border: { top: True, left: False }, wrap: True").unwrap();
        let ActionKind::Format(spec) = &actions[0].kind else { panic!("expected format") };
        assert_eq!(spec.border.get("top"), Some(&true));
        assert_eq!(spec.border.get("left"), Some(&false));
        assert_eq!(spec.wrap, Some(true));
    }

    #[test]
    fn test_format_value_format_with_comma() {
        let actions = parse("REGEX ^.*$ | FORMAT style: numberformat, value_format: #,##0.00").unwrap();
        let ActionKind::Format(spec) = &actions[0].kind else { panic!("expected format") };
        assert_eq!(spec.value_format.as_deref(), Some("#,##0.00"));
    }

    #[test]
    fn test_format_value_format_with_colon() {
        let spec = FormatSpec {
            value_format: Some(r#"#,##0 "h:m""#.into()),
            ..FormatSpec::new(FormatStyle::NumberFormat)
        };
        let actions = vec![Action::new(ActionKind::Format(spec))];
        assert_eq!(parse(&serialize(&actions)), Ok(actions));

        let err = parse("REGEX ^.*$ | FORMAT style: bold, shade: 0.5, value_format: 0").unwrap_err();
        assert!(err.to_string().contains("unknown key 'shade'"), "got {}", err);
    }

    #[test]
    fn test_trailing_semicolon_in_text_survives() {
        let actions = vec![
            Action::new(ActionKind::TellUser("Is the total in D; or E;".into())),
            Action::new(ActionKind::Set("=A1;".into())),
        ];
        assert_eq!(parse(&serialize(&actions)), Ok(actions));
        // A single trailing `;` is still just a terminator
        assert_eq!(
            parse("REGEX ^.*$ | SET 5;").unwrap(),
            vec![Action::new(ActionKind::Set("5".into()))]
        );
    }

    #[test]
    fn test_format_errors() {
        assert!(parse("REGEX ^.*$ | FORMAT color: red").is_err());
        assert!(parse("REGEX ^.*$ | FORMAT style: bold, wrap: maybe").is_err());
        assert!(parse("REGEX ^.*$ | FORMAT style: bold, glow: 3").is_err());
        assert!(parse("REGEX ^.*$ | FORMAT style: bold, size: 11.5").is_err());
        assert_eq!(parse("REGEX ^.*$ | FORMAT style: fontsize, size: 14.0").map(|a| a.len()), Ok(1));
    }

    #[test]
    fn test_blank_entries_skipped() {
        let actions = parse("\n ; REGEX ^.*$ | SET 5 ;\n\n").unwrap();
        assert_eq!(actions, vec![Action::new(ActionKind::Set("5".into()))]);
    }

    #[test]
    fn test_serialize_reparses() {
        let script = "REGEX ^x | SELECT A1:B-1\nREGEX ^.*$ | TOOLACTION copy\nREGEX ^.*$ | TERMINATE";
        let actions = parse(script).unwrap();
        assert_eq!(serialize(&actions), script);
    }
}
