use std::collections::BTreeMap;
use std::fmt;

use gridagent_engine::refs::{column_letters, column_number};
use serde::{Deserialize, Serialize};

/// Pattern written when an action carries no filter.
pub const DEFAULT_PATTERN: &str = "^.*$";

/// Row half of a cell reference. Rows are 1-based on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RowRef {
    At(u32),
    /// `-1`: last non-empty row of the column, resolved at execution time.
    Last,
}

/// `C7`, `AA12`, or `C-1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellRef {
    /// Upper-case column letters.
    pub col: String,
    pub row: RowRef,
}

impl CellRef {
    pub fn new(col: &str, row: u32) -> Self {
        Self { col: col.to_ascii_uppercase(), row: RowRef::At(row) }
    }

    pub fn last(col: &str) -> Self {
        Self { col: col.to_ascii_uppercase(), row: RowRef::Last }
    }

    /// 1-based column number, if the letters are valid.
    pub fn column(&self) -> Option<usize> {
        column_number(&self.col)
    }

    pub fn from_column(col: usize, row: RowRef) -> Self {
        Self { col: column_letters(col), row }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            RowRef::At(row) => write!(f, "{}{}", self.col, row),
            RowRef::Last => write!(f, "{}-1", self.col),
        }
    }
}

/// Two corners of a rectangle, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRef {
    pub from: CellRef,
    pub to: CellRef,
}

impl RangeRef {
    pub fn new(from: CellRef, to: CellRef) -> Self {
        Self { from, to }
    }

    /// A single reference selects down its column to the last used row.
    pub fn column_from(from: CellRef) -> Self {
        let to = CellRef::last(&from.col);
        Self { from, to }
    }
}

impl fmt::Display for RangeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.from, self.to)
    }
}

/// The `style` key of a FORMAT action: which attribute the action targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatStyle {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    BackgroundColor,
    FontColor,
    FontSize,
    HorizontalAlignment,
    VerticalAlignment,
    Border,
    WrapText,
    NumberFormat,
    /// Apply only the other keys.
    None,
}

impl FormatStyle {
    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let style = match key.as_str() {
            "bold" => FormatStyle::Bold,
            "italic" => FormatStyle::Italic,
            "underline" => FormatStyle::Underline,
            "strikethrough" | "strike" => FormatStyle::Strikethrough,
            "backgroundcolor" | "background" | "fill" | "fillcolor" => FormatStyle::BackgroundColor,
            "fontcolor" | "textcolor" => FormatStyle::FontColor,
            "fontsize" | "size" => FormatStyle::FontSize,
            "horizontalalignment" | "alignment" | "align" => FormatStyle::HorizontalAlignment,
            "verticalalignment" | "valign" => FormatStyle::VerticalAlignment,
            "border" | "borders" => FormatStyle::Border,
            "wraptext" | "wrap" => FormatStyle::WrapText,
            "numberformat" | "valueformat" => FormatStyle::NumberFormat,
            "none" | "" => FormatStyle::None,
            _ => return None,
        };
        Some(style)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatStyle::Bold => "bold",
            FormatStyle::Italic => "italic",
            FormatStyle::Underline => "underline",
            FormatStyle::Strikethrough => "strikethrough",
            FormatStyle::BackgroundColor => "backgroundcolor",
            FormatStyle::FontColor => "fontcolor",
            FormatStyle::FontSize => "fontsize",
            FormatStyle::HorizontalAlignment => "horizontalalignment",
            FormatStyle::VerticalAlignment => "verticalalignment",
            FormatStyle::Border => "border",
            FormatStyle::WrapText => "wraptext",
            FormatStyle::NumberFormat => "numberformat",
            FormatStyle::None => "none",
        }
    }
}

/// Parameters of a FORMAT action. Value strings (color, alignment) are
/// checked when the action runs, not when it is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub style: FormatStyle,
    pub color: Option<String>,
    pub size: Option<u32>,
    pub alignment: Option<String>,
    pub wrap: Option<bool>,
    pub value_format: Option<String>,
    /// side -> on/off, e.g. `{ top: True, bottom: False }`
    pub border: BTreeMap<String, bool>,
}

impl FormatSpec {
    pub fn new(style: FormatStyle) -> Self {
        Self {
            style,
            color: None,
            size: None,
            alignment: None,
            wrap: None,
            value_format: None,
            border: BTreeMap::new(),
        }
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "style: {}", self.style.as_str())?;
        if let Some(color) = &self.color {
            write!(f, ", color: {}", color)?;
        }
        if let Some(size) = self.size {
            write!(f, ", size: {}", size)?;
        }
        if let Some(alignment) = &self.alignment {
            write!(f, ", alignment: {}", alignment)?;
        }
        if !self.border.is_empty() {
            let sides: Vec<String> = self
                .border
                .iter()
                .map(|(side, on)| format!("{}: {}", side, if *on { "True" } else { "False" }))
                .collect();
            write!(f, ", border: {{ {} }}", sides.join(", "))?;
        }
        if let Some(wrap) = self.wrap {
            write!(f, ", wrap: {}", if wrap { "True" } else { "False" })?;
        }
        if let Some(value_format) = &self.value_format {
            write!(f, ", value_format: {}", value_format)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    Select(RangeRef),
    /// Fill from `from` (the source cell) across the rectangle to `to`.
    SelectAndDrag(RangeRef),
    Format(FormatSpec),
    Set(String),
    /// Tool name plus optional argument, e.g. `conditional_formatting red`.
    ToolAction(String),
    TellUser(String),
    Terminate,
    Read(RangeRef),
}

impl ActionKind {
    pub fn verb(&self) -> &'static str {
        match self {
            ActionKind::Select(_) => "SELECT",
            ActionKind::SelectAndDrag(_) => "SELECTANDDRAG",
            ActionKind::Format(_) => "FORMAT",
            ActionKind::Set(_) => "SET",
            ActionKind::ToolAction(_) => "TOOLACTION",
            ActionKind::TellUser(_) => "TELLUSER",
            ActionKind::Terminate => "TERMINATE",
            ActionKind::Read(_) => "READ",
        }
    }
}

/// One instruction, with an optional regex restricting which cells it touches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// None matches every cell.
    pub filter: Option<String>,
    pub kind: ActionKind,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { filter: None, kind }
    }

    pub fn with_filter(kind: ActionKind, pattern: impl Into<String>) -> Self {
        Self { filter: Some(pattern.into()), kind }
    }

    pub fn pattern(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_PATTERN)
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self.kind, ActionKind::Terminate)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params = match &self.kind {
            ActionKind::Select(range) | ActionKind::SelectAndDrag(range) | ActionKind::Read(range) => {
                format!(" {}", range)
            }
            ActionKind::Format(spec) => format!(" {}", spec),
            ActionKind::Set(text) | ActionKind::ToolAction(text) | ActionKind::TellUser(text) => {
                format!(" {}", text)
            }
            ActionKind::Terminate => String::new(),
        };
        write!(f, "REGEX {} | {}{}", self.pattern(), self.kind.verb(), params)?;
        // A `;` at the end of a line terminates the entry, so a trailing one
        // in the params needs a terminator of its own.
        if params.ends_with(';') {
            f.write_str(";")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern_written() {
        let action = Action::new(ActionKind::Select(RangeRef::column_from(CellRef::new("C", 1))));
        assert_eq!(action.to_string(), "REGEX ^.*$ | SELECT C1:C-1");
    }

    #[test]
    fn test_format_key_order() {
        let mut spec = FormatSpec::new(FormatStyle::BackgroundColor);
        spec.color = Some("yellow".into());
        spec.size = Some(12);
        spec.wrap = Some(true);
        spec.border.insert("top".into(), true);
        spec.value_format = Some("0.00".into());
        let action = Action::with_filter(ActionKind::Format(spec), r"^\?.*$");
        assert_eq!(
            action.to_string(),
            r"REGEX ^\?.*$ | FORMAT style: backgroundcolor, color: yellow, size: 12, border: { top: True }, wrap: True, value_format: 0.00"
        );
    }

    #[test]
    fn test_trailing_semicolon_gets_terminator() {
        let action = Action::new(ActionKind::TellUser("Is the total in D; or E;".into()));
        assert_eq!(action.to_string(), "REGEX ^.*$ | TELLUSER Is the total in D; or E;;");
    }

    #[test]
    fn test_terminate_has_no_params() {
        assert_eq!(Action::new(ActionKind::Terminate).to_string(), "REGEX ^.*$ | TERMINATE");
    }

    #[test]
    fn test_style_aliases() {
        assert_eq!(FormatStyle::parse("Bold"), Some(FormatStyle::Bold));
        assert_eq!(FormatStyle::parse("background color"), Some(FormatStyle::BackgroundColor));
        assert_eq!(FormatStyle::parse("sparkle"), None);
    }
}
