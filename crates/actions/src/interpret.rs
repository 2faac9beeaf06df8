//! Applies one [`Action`] to a [`SpreadsheetModel`].
//!
//! Every failure comes back as an [`ExecutionResult`] with `success == false`;
//! the model is left untouched when an action's arguments don't validate.

use gridagent_engine::cell::{Alignment, CellFormat, CellValue, NumberFormat, TextOverflow, VerticalAlignment};
use gridagent_engine::color::parse_color;
use gridagent_engine::refs::{cell_name, col_to_letter};
use gridagent_engine::{Clipboard, Range, Sheet, SpreadsheetModel};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::action::{Action, ActionKind, CellRef, FormatSpec, FormatStyle, RangeRef, RowRef, DEFAULT_PATTERN};
use crate::error::ExecutionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub message: String,
}

impl ExecutionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into() }
    }

    pub fn failure(err: &ExecutionError) -> Self {
        Self { success: false, message: err.to_string() }
    }
}

/// Run one action against the model.
pub fn interpret(action: &Action, model: &mut SpreadsheetModel) -> ExecutionResult {
    match execute(action, model) {
        Ok(message) => ExecutionResult::ok(message),
        Err(err) => ExecutionResult::failure(&err),
    }
}

fn execute(action: &Action, model: &mut SpreadsheetModel) -> Result<String, ExecutionError> {
    let filter = Filter::compile(action.filter.as_deref())?;
    match &action.kind {
        ActionKind::Select(range) => select(range, model),
        ActionKind::SelectAndDrag(range) => select_and_drag(range, &filter, model),
        ActionKind::Format(spec) => format(spec, &filter, model),
        ActionKind::Set(text) => set(text, &filter, model),
        ActionKind::ToolAction(tool) => tool_action(tool, &filter, model),
        ActionKind::TellUser(message) => Ok(format!("Message for user: {}", message)),
        ActionKind::Terminate => Ok("Terminated".to_string()),
        ActionKind::Read(range) => read(range, &filter, model),
    }
}

/// Compiled filter pattern; `None` matches every cell.
struct Filter(Option<Regex>);

impl Filter {
    fn compile(pattern: Option<&str>) -> Result<Self, ExecutionError> {
        match pattern {
            None | Some("") | Some(DEFAULT_PATTERN) => Ok(Filter(None)),
            Some(p) => Regex::new(p).map(|re| Filter(Some(re))).map_err(|e| ExecutionError::InvalidPattern {
                pattern: p.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    fn matches(&self, sheet: &Sheet, row: usize, col: usize) -> bool {
        match &self.0 {
            None => true,
            Some(re) => re.is_match(&sheet.get_display(row, col)),
        }
    }
}

// =============================================================================
// Reference resolution
// =============================================================================

fn resolve_ref(cell: &CellRef, sheet: &Sheet) -> Result<(usize, usize), ExecutionError> {
    let (rows, cols) = (sheet.row_count(), sheet.col_count());
    let out_of_range = || ExecutionError::OutOfRange { reference: cell.to_string(), rows, cols };

    let col = match cell.column() {
        Some(c) if c <= cols => c - 1,
        _ => return Err(out_of_range()),
    };
    let row = match cell.row {
        // An empty column resolves to the first row
        RowRef::Last => sheet.last_nonempty_row(col).unwrap_or(0),
        RowRef::At(r) if r >= 1 && (r as usize) <= rows => r as usize - 1,
        RowRef::At(_) => return Err(out_of_range()),
    };
    Ok((row, col))
}

fn resolve_range(range: &RangeRef, sheet: &Sheet) -> Result<Range, ExecutionError> {
    let (r1, c1) = resolve_ref(&range.from, sheet)?;
    let (r2, c2) = resolve_ref(&range.to, sheet)?;
    Ok(Range::new(r1, c1, r2, c2))
}

fn require_selection(model: &SpreadsheetModel, verb: &'static str) -> Result<Range, ExecutionError> {
    model.selected_range.ok_or(ExecutionError::NoSelection { verb })
}

// =============================================================================
// Verbs
// =============================================================================

fn select(range_ref: &RangeRef, model: &mut SpreadsheetModel) -> Result<String, ExecutionError> {
    let range = resolve_range(range_ref, &model.sheet)?;
    model.select(range);
    Ok(format!("Selected {}", describe_selection(&range, &model.sheet)))
}

/// Human label only; the classification has no effect on later actions.
fn describe_selection(range: &Range, sheet: &Sheet) -> String {
    let Some(used) = sheet.data_extent() else {
        return format!("range {}", range);
    };

    if range.height() > 1 && range.start_row == 0 && range.end_row >= used.end_row {
        if range.start_col == range.end_col {
            format!("column {} ({})", col_to_letter(range.start_col), range)
        } else {
            format!("columns {} to {} ({})", col_to_letter(range.start_col), col_to_letter(range.end_col), range)
        }
    } else if range.width() > 1 && range.start_col == 0 && range.end_col >= used.end_col {
        if range.start_row == range.end_row {
            format!("row {} ({})", range.start_row + 1, range)
        } else {
            format!("rows {} to {} ({})", range.start_row + 1, range.end_row + 1, range)
        }
    } else {
        format!("range {}", range)
    }
}

fn select_and_drag(range_ref: &RangeRef, filter: &Filter, model: &mut SpreadsheetModel) -> Result<String, ExecutionError> {
    let (src_row, src_col) = resolve_ref(&range_ref.from, &model.sheet)?;
    let (dst_row, dst_col) = resolve_ref(&range_ref.to, &model.sheet)?;

    let source = model.sheet.get_value(src_row, src_col);
    if source.is_empty() {
        return Err(ExecutionError::NoSource(cell_name(src_row, src_col)));
    }

    let target = Range::new(src_row, src_col, dst_row, dst_col);
    // Sequences only along one axis; a 2-D block gets plain copies
    let linear = src_row == dst_row || src_col == dst_col;

    let mut filled = 0;
    for (row, col) in target.cells() {
        if (row, col) == (src_row, src_col) || !filter.matches(&model.sheet, row, col) {
            continue;
        }
        let value = match source.as_number() {
            Some(n) if linear => {
                let offset = (row as i64 - src_row as i64) + (col as i64 - src_col as i64);
                CellValue::Number(n + offset as f64)
            }
            _ => source.clone(),
        };
        model.sheet.set_value(row, col, value);
        filled += 1;
    }

    model.select(target);
    Ok(format!(
        "Filled {} cell(s) in {} from {}",
        filled,
        target,
        cell_name(src_row, src_col)
    ))
}

fn set(text: &str, filter: &Filter, model: &mut SpreadsheetModel) -> Result<String, ExecutionError> {
    let range = require_selection(model, "SET")?;

    // Edits go through the input field
    model.select_input_field();
    model.input_field.content = text.to_string();

    let value = CellValue::from_input(text);
    let mut written = 0;
    for (row, col) in range.cells() {
        if filter.matches(&model.sheet, row, col) {
            model.sheet.set_value(row, col, value.clone());
            written += 1;
        }
    }

    model.input_field.selected = false;
    Ok(format!("Set {} cell(s) in {} to '{}'", written, range, text))
}

fn read(range_ref: &RangeRef, filter: &Filter, model: &SpreadsheetModel) -> Result<String, ExecutionError> {
    let range = resolve_range(range_ref, &model.sheet)?;
    let sheet = &model.sheet;

    let lines: Vec<String> = (range.start_row..=range.end_row)
        .map(|row| {
            (range.start_col..=range.end_col)
                .map(|col| if filter.matches(sheet, row, col) { sheet.get_display(row, col) } else { String::new() })
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect();

    Ok(format!("{}:\n{}", range, lines.join("\n")))
}

// =============================================================================
// FORMAT
// =============================================================================

/// A validated set of format changes, applied cell by cell.
#[derive(Debug, Default)]
struct FormatEdit {
    bold: bool,
    italic: bool,
    underline: bool,
    strikethrough: bool,
    font_color: Option<Option<[u8; 4]>>,
    background_color: Option<Option<[u8; 4]>>,
    font_size: Option<f32>,
    alignment: Option<Alignment>,
    vertical_alignment: Option<VerticalAlignment>,
    wrap: Option<bool>,
    number_format: Option<NumberFormat>,
    borders: Vec<(String, bool)>,
}

impl FormatEdit {
    fn from_spec(spec: &FormatSpec) -> Result<Self, ExecutionError> {
        let mut edit = FormatEdit::default();
        let missing = |key: &'static str| ExecutionError::InvalidAttribute { key, value: String::new() };

        match spec.style {
            FormatStyle::Bold => edit.bold = true,
            FormatStyle::Italic => edit.italic = true,
            FormatStyle::Underline => edit.underline = true,
            FormatStyle::Strikethrough => edit.strikethrough = true,
            FormatStyle::BackgroundColor | FormatStyle::FontColor if spec.color.is_none() => {
                return Err(missing("color"));
            }
            FormatStyle::FontSize if spec.size.is_none() => return Err(missing("size")),
            FormatStyle::HorizontalAlignment | FormatStyle::VerticalAlignment if spec.alignment.is_none() => {
                return Err(missing("alignment"));
            }
            FormatStyle::WrapText => edit.wrap = Some(spec.wrap.unwrap_or(true)),
            FormatStyle::Border if spec.border.is_empty() => edit.borders.push(("all".to_string(), true)),
            FormatStyle::NumberFormat if spec.value_format.is_none() => edit.number_format = Some(NumberFormat::General),
            _ => {}
        }

        if let Some(color) = &spec.color {
            let rgba = parse_color(color).map_err(|_| ExecutionError::InvalidAttribute {
                key: "color",
                value: color.clone(),
            })?;
            if spec.style == FormatStyle::FontColor {
                edit.font_color = Some(rgba);
            } else {
                edit.background_color = Some(rgba);
            }
        }

        if let Some(size) = spec.size {
            edit.font_size = Some(size as f32);
        }

        if let Some(alignment) = &spec.alignment {
            let vertical = VerticalAlignment::parse(alignment);
            match (spec.style, Alignment::parse(alignment), vertical) {
                (FormatStyle::VerticalAlignment, _, Some(v)) => edit.vertical_alignment = Some(v),
                (FormatStyle::VerticalAlignment, _, None) => {
                    return Err(ExecutionError::InvalidAttribute { key: "alignment", value: alignment.clone() });
                }
                (_, Some(h), _) => edit.alignment = Some(h),
                (_, None, Some(v)) => edit.vertical_alignment = Some(v),
                (_, None, None) => {
                    return Err(ExecutionError::InvalidAttribute { key: "alignment", value: alignment.clone() });
                }
            }
        }

        if let Some(wrap) = spec.wrap {
            edit.wrap = Some(wrap);
        }

        if let Some(code) = &spec.value_format {
            edit.number_format = Some(NumberFormat::from_code(code));
        }

        edit.borders.extend(spec.border.iter().map(|(side, on)| (side.clone(), *on)));
        Ok(edit)
    }

    fn apply(&self, format: &mut CellFormat) {
        format.bold |= self.bold;
        format.italic |= self.italic;
        format.underline |= self.underline;
        format.strikethrough |= self.strikethrough;
        if let Some(color) = self.font_color {
            format.font_color = color;
        }
        if let Some(color) = self.background_color {
            format.background_color = color;
        }
        if let Some(size) = self.font_size {
            format.font_size = Some(size);
        }
        if let Some(alignment) = self.alignment {
            format.alignment = alignment;
        }
        if let Some(v) = self.vertical_alignment {
            format.vertical_alignment = v;
        }
        if let Some(wrap) = self.wrap {
            format.text_overflow = if wrap { TextOverflow::Wrap } else { TextOverflow::Clip };
        }
        if let Some(number_format) = &self.number_format {
            format.number_format = number_format.clone();
        }
        for (side, on) in &self.borders {
            format.borders.set_side(side, *on);
        }
    }
}

fn format(spec: &FormatSpec, filter: &Filter, model: &mut SpreadsheetModel) -> Result<String, ExecutionError> {
    let range = require_selection(model, "FORMAT")?;
    let edit = FormatEdit::from_spec(spec)?;
    let touched = apply_to_matching(&range, filter, model, |sheet, row, col| {
        sheet.update_format(row, col, |f| edit.apply(f));
    });
    Ok(format!(
        "Formatted {} of {} cell(s) in {} ({})",
        touched,
        range.cell_count(),
        range,
        spec.style.as_str()
    ))
}

/// Run `f` on every cell of `range` the filter accepts. Returns how many.
fn apply_to_matching(
    range: &Range,
    filter: &Filter,
    model: &mut SpreadsheetModel,
    mut f: impl FnMut(&mut Sheet, usize, usize),
) -> usize {
    let mut count = 0;
    for (row, col) in range.cells() {
        if filter.matches(&model.sheet, row, col) {
            f(&mut model.sheet, row, col);
            count += 1;
        }
    }
    count
}

// =============================================================================
// TOOLACTION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tool {
    Copy,
    Cut,
    Paste,
    Delete,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    ClearFormatting,
    ConditionalFormatting,
    NumberFormat,
}

impl Tool {
    /// Names are compared lower-case with spaces, `_` and `-` removed.
    fn lookup(name: &str) -> Option<Self> {
        let compact: String = name
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();
        let tool = match compact.as_str() {
            "copy" => Tool::Copy,
            "cut" => Tool::Cut,
            "paste" | "pasteasvalues" | "pastevalues" => Tool::Paste,
            "delete" | "clearcontents" => Tool::Delete,
            "bold" => Tool::Bold,
            "italic" => Tool::Italic,
            "underline" => Tool::Underline,
            "strikethrough" => Tool::Strikethrough,
            "clearformatting" | "clearformat" => Tool::ClearFormatting,
            "conditionalformatting" => Tool::ConditionalFormatting,
            "numberformat" => Tool::NumberFormat,
            _ => return None,
        };
        Some(tool)
    }

    fn name(&self) -> &'static str {
        match self {
            Tool::Copy => "copy",
            Tool::Cut => "cut",
            Tool::Paste => "paste",
            Tool::Delete => "delete",
            Tool::Bold => "bold",
            Tool::Italic => "italic",
            Tool::Underline => "underline",
            Tool::Strikethrough => "strikethrough",
            Tool::ClearFormatting => "clear_formatting",
            Tool::ConditionalFormatting => "conditional_formatting",
            Tool::NumberFormat => "number_format",
        }
    }

    /// `paste as values` is one tool; `number_format 0.00%` is a tool and an
    /// argument. The longest run of leading words that names a tool wins, so
    /// `conditional formatting red` reads as a tool and `red`.
    fn parse(text: &str) -> Result<(Self, Option<&str>), ExecutionError> {
        let text = text.trim();
        let word_ends: Vec<usize> = text
            .char_indices()
            .filter(|&(i, c)| !c.is_whitespace() && text[i + c.len_utf8()..].starts_with(char::is_whitespace))
            .map(|(i, c)| i + c.len_utf8())
            .chain(std::iter::once(text.len()))
            .collect();
        word_ends
            .iter()
            .rev()
            .find_map(|&end| {
                let arg = Some(text[end..].trim()).filter(|a| !a.is_empty());
                Tool::lookup(&text[..end]).map(|tool| (tool, arg))
            })
            .ok_or_else(|| ExecutionError::UnknownTool(text.to_string()))
    }
}

fn tool_action(text: &str, filter: &Filter, model: &mut SpreadsheetModel) -> Result<String, ExecutionError> {
    let (tool, arg) = Tool::parse(text)?;
    let range = require_selection(model, "TOOLACTION")?;

    match tool {
        Tool::Copy => {
            let clipboard = copy_block(&range, filter, &model.sheet);
            let copied = clipboard.rows.iter().flatten().filter(|v| v.is_some()).count();
            model.clipboard = Some(clipboard);
            Ok(format!("Copied {} cell(s) from {}", copied, range))
        }
        Tool::Cut => {
            model.clipboard = Some(copy_block(&range, filter, &model.sheet));
            let n = apply_to_matching(&range, filter, model, |sheet, row, col| sheet.clear_value(row, col));
            Ok(format!("Cut {} cell(s) from {}", n, range))
        }
        Tool::Paste => paste(&range, filter, model),
        Tool::Delete => {
            let n = apply_to_matching(&range, filter, model, |sheet, row, col| sheet.clear_value(row, col));
            Ok(format!("Deleted values in {} cell(s) of {}", n, range))
        }
        Tool::Bold | Tool::Italic | Tool::Underline | Tool::Strikethrough => {
            let apply: fn(&mut CellFormat) = match tool {
                Tool::Bold => |f: &mut CellFormat| f.bold = true,
                Tool::Italic => |f: &mut CellFormat| f.italic = true,
                Tool::Underline => |f: &mut CellFormat| f.underline = true,
                _ => |f: &mut CellFormat| f.strikethrough = true,
            };
            let n = apply_to_matching(&range, filter, model, |sheet, row, col| sheet.update_format(row, col, apply));
            Ok(format!("Applied {} to {} cell(s) of {}", tool.name(), n, range))
        }
        Tool::ClearFormatting => {
            let n = apply_to_matching(&range, filter, model, |sheet, row, col| sheet.clear_format(row, col));
            Ok(format!("Cleared formatting on {} cell(s) of {}", n, range))
        }
        Tool::ConditionalFormatting => {
            let color_name = arg.unwrap_or("yellow");
            let color = parse_color(color_name).map_err(|_| ExecutionError::InvalidAttribute {
                key: "color",
                value: color_name.to_string(),
            })?;
            let n = apply_to_matching(&range, filter, model, |sheet, row, col| {
                sheet.update_format(row, col, |f| f.background_color = color)
            });
            Ok(format!("Highlighted {} matching cell(s) of {} in {}", n, range, color_name))
        }
        Tool::NumberFormat => {
            let number_format = NumberFormat::from_code(arg.unwrap_or("General"));
            let label = number_format.code().to_string();
            let n = apply_to_matching(&range, filter, model, |sheet, row, col| {
                let nf = number_format.clone();
                sheet.update_format(row, col, move |f| f.number_format = nf)
            });
            Ok(format!("Set number format '{}' on {} cell(s) of {}", label, n, range))
        }
    }
}

/// Values only. Cells the filter rejects become holes.
fn copy_block(range: &Range, filter: &Filter, sheet: &Sheet) -> Clipboard {
    let rows: Vec<Vec<Option<CellValue>>> = (range.start_row..=range.end_row)
        .map(|row| {
            (range.start_col..=range.end_col)
                .map(|col| filter.matches(sheet, row, col).then(|| sheet.get_value(row, col)))
                .collect::<Vec<_>>()
        })
        .collect();
    Clipboard { rows }
}

/// Writes the clipboard at the selection's top-left, at the clipboard's own size.
fn paste(range: &Range, filter: &Filter, model: &mut SpreadsheetModel) -> Result<String, ExecutionError> {
    let clipboard = match &model.clipboard {
        Some(clip) if !clip.is_empty() => clip.clone(),
        _ => return Err(ExecutionError::EmptyClipboard),
    };

    let target = Range::new(
        range.start_row,
        range.start_col,
        range.start_row + clipboard.height() - 1,
        range.start_col + clipboard.width() - 1,
    );
    if !model.sheet.range_in_bounds(&target) {
        return Err(ExecutionError::OutOfRange {
            reference: target.to_string(),
            rows: model.sheet.row_count(),
            cols: model.sheet.col_count(),
        });
    }

    let mut pasted = 0;
    for (i, row_values) in clipboard.rows.iter().enumerate() {
        for (j, value) in row_values.iter().enumerate() {
            let (row, col) = (target.start_row + i, target.start_col + j);
            if let Some(value) = value {
                if filter.matches(&model.sheet, row, col) {
                    model.sheet.set_value(row, col, value.clone());
                    pasted += 1;
                }
            }
        }
    }

    model.select(target);
    Ok(format!("Pasted {} cell(s) into {}", pasted, target))
}
