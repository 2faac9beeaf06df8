//! Errors from parsing scripts and from running single actions.

use std::fmt;

/// A script that cannot be parsed. `entry` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Entry does not have the shape `REGEX <pattern> | <VERB> <params>`.
    MalformedEntry { entry: usize, text: String },
    UnknownVerb { entry: usize, verb: String },
    InvalidParams { entry: usize, verb: &'static str, reason: String },
    InvalidPattern { entry: usize, pattern: String, reason: String },
}

impl ParseError {
    pub fn entry(&self) -> usize {
        match self {
            ParseError::MalformedEntry { entry, .. }
            | ParseError::UnknownVerb { entry, .. }
            | ParseError::InvalidParams { entry, .. }
            | ParseError::InvalidPattern { entry, .. } => *entry,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MalformedEntry { entry, text } => write!(
                f,
                "entry {}: expected 'REGEX <pattern> | <VERB> <params>', got '{}'",
                entry, text
            ),
            ParseError::UnknownVerb { entry, verb } => write!(f, "entry {}: unknown verb '{}'", entry, verb),
            ParseError::InvalidParams { entry, verb, reason } => {
                write!(f, "entry {}: invalid {} parameters: {}", entry, verb, reason)
            }
            ParseError::InvalidPattern { entry, pattern, reason } => {
                write!(f, "entry {}: invalid pattern '{}': {}", entry, pattern, reason)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// A precondition an action needed was not met. Never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    NoSelection { verb: &'static str },
    /// Reference resolved outside the sheet.
    OutOfRange { reference: String, rows: usize, cols: usize },
    UnknownTool(String),
    EmptyClipboard,
    /// Drag source is empty.
    NoSource(String),
    InvalidAttribute { key: &'static str, value: String },
    InvalidPattern { pattern: String, reason: String },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::NoSelection { verb } => write!(f, "{} requires an active selection", verb),
            ExecutionError::OutOfRange { reference, rows, cols } => write!(
                f,
                "{} is outside the sheet ({} rows x {} columns)",
                reference, rows, cols
            ),
            ExecutionError::UnknownTool(tool) => write!(f, "unknown tool '{}'", tool),
            ExecutionError::EmptyClipboard => write!(f, "clipboard is empty; copy something first"),
            ExecutionError::NoSource(cell) => write!(f, "drag source {} is empty", cell),
            ExecutionError::InvalidAttribute { key, value } => write!(f, "invalid {} '{}'", key, value),
            ExecutionError::InvalidPattern { pattern, reason } => {
                write!(f, "invalid pattern '{}': {}", pattern, reason)
            }
        }
    }
}

impl std::error::Error for ExecutionError {}
