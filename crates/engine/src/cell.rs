use serde::{Deserialize, Serialize};

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    General,
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Some(Alignment::General),
            "left" => Some(Alignment::Left),
            "center" | "centre" => Some(Alignment::Center),
            "right" => Some(Alignment::Right),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::General => "general",
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAlignment {
    Top,
    #[default]
    Middle,
    Bottom,
}

impl VerticalAlignment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Some(VerticalAlignment::Top),
            "middle" | "center" => Some(VerticalAlignment::Middle),
            "bottom" => Some(VerticalAlignment::Bottom),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerticalAlignment::Top => "top",
            VerticalAlignment::Middle => "middle",
            VerticalAlignment::Bottom => "bottom",
        }
    }
}

/// Text overflow behavior
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TextOverflow {
    #[default]
    Clip, // Text is clipped at cell boundary
    Wrap, // Text wraps to multiple lines within the cell
}

/// Number format. `Custom` holds a spreadsheet format code such as `0.00%`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum NumberFormat {
    #[default]
    General,
    Custom(String),
}

impl NumberFormat {
    /// `General` (any case) and the empty string map to `General`.
    pub fn from_code(code: &str) -> Self {
        let code = code.trim();
        if code.is_empty() || code.eq_ignore_ascii_case("general") {
            NumberFormat::General
        } else {
            NumberFormat::Custom(code.to_string())
        }
    }

    pub fn code(&self) -> &str {
        match self {
            NumberFormat::General => "General",
            NumberFormat::Custom(code) => code,
        }
    }
}

/// Per-side border flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Borders {
    pub top: bool,
    pub right: bool,
    pub bottom: bool,
    pub left: bool,
}

impl Borders {
    /// Set one side by name. Returns false for an unknown side.
    pub fn set_side(&mut self, side: &str, on: bool) -> bool {
        match side.trim().to_ascii_lowercase().as_str() {
            "top" => self.top = on,
            "right" => self.right = on,
            "bottom" => self.bottom = on,
            "left" => self.left = on,
            "all" => {
                self.top = on;
                self.right = on;
                self.bottom = on;
                self.left = on;
            }
            _ => return false,
        }
        true
    }

    pub fn any(&self) -> bool {
        self.top || self.right || self.bottom || self.left
    }
}

/// Cell formatting options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CellFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub font_size: Option<f32>,
    /// RGBA; None = automatic (black)
    pub font_color: Option<[u8; 4]>,
    /// RGBA fill; None = no fill
    pub background_color: Option<[u8; 4]>,
    pub alignment: Alignment,
    pub vertical_alignment: VerticalAlignment,
    pub text_overflow: TextOverflow,
    pub number_format: NumberFormat,
    pub borders: Borders,
}

impl CellFormat {
    pub fn is_default(&self) -> bool {
        *self == CellFormat::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Boolean(bool),
    /// Formula source including the leading `=`. Never evaluated here.
    Formula(String),
}

impl CellValue {
    /// Interpret typed input: `=` starts a formula, then numbers, then text.
    pub fn from_input(input: &str) -> Self {
        if input.is_empty() {
            return CellValue::Empty;
        }

        if input.starts_with('=') {
            return CellValue::Formula(input.to_string());
        }

        if let Ok(num) = input.trim().parse::<f64>() {
            // "inf" and "NaN" parse as f64 but are text to a spreadsheet
            if num.is_finite() {
                return CellValue::Number(num);
            }
        }

        CellValue::Text(input.to_string())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The string a filter pattern is matched against, and what Read reports.
    pub fn raw_display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Formula(source) => source.clone(),
        }
    }
}

/// Integral values print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub format: CellFormat,
}

impl Cell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, input: &str) {
        self.value = CellValue::from_input(input);
    }

    /// A cell with no value and default formatting need not be stored.
    pub fn is_blank(&self) -> bool {
        self.value.is_empty() && self.format.is_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_input_formula_kept_verbatim() {
        assert_eq!(CellValue::from_input("=SUM(A1:A3)"), CellValue::Formula("=SUM(A1:A3)".into()));
        assert_eq!(CellValue::from_input("=1+"), CellValue::Formula("=1+".into()));
    }

    #[test]
    fn test_from_input_number_then_text() {
        assert_eq!(CellValue::from_input("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::from_input(" 3.5 "), CellValue::Number(3.5));
        assert_eq!(CellValue::from_input("abc"), CellValue::Text("abc".into()));
        assert_eq!(CellValue::from_input("NaN"), CellValue::Text("NaN".into()));
        assert_eq!(CellValue::from_input("inf"), CellValue::Text("inf".into()));
        assert_eq!(CellValue::from_input(""), CellValue::Empty);
    }

    #[test]
    fn test_raw_display() {
        assert_eq!(CellValue::Number(10.0).raw_display(), "10");
        assert_eq!(CellValue::Number(2.25).raw_display(), "2.25");
        assert_eq!(CellValue::Boolean(true).raw_display(), "TRUE");
        assert_eq!(CellValue::Empty.raw_display(), "");
    }

    #[test]
    fn test_cell_format_defaults() {
        let format = CellFormat::default();
        assert!(!format.bold);
        assert_eq!(format.alignment, Alignment::General);
        assert_eq!(format.number_format, NumberFormat::General);
        assert!(format.is_default());
    }

    #[test]
    fn test_number_format_codes() {
        assert_eq!(NumberFormat::from_code("general"), NumberFormat::General);
        assert_eq!(NumberFormat::from_code("0.00%").code(), "0.00%");
    }

    #[test]
    fn test_border_sides() {
        let mut borders = Borders::default();
        assert!(borders.set_side("Top", true));
        assert!(!borders.set_side("diagonal", true));
        assert!(borders.top && !borders.left);
        assert!(borders.set_side("all", true));
        assert!(borders.left && borders.bottom);
    }
}
