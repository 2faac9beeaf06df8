use serde::{Deserialize, Serialize};

use crate::cell::CellValue;
use crate::selection::Range;
use crate::sheet::Sheet;

/// A copied block of values. `None` marks a hole that paste skips.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clipboard {
    pub rows: Vec<Vec<Option<CellValue>>>,
}

impl Clipboard {
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|row| row.iter().all(Option::is_none))
    }
}

/// The formula-bar buffer that edits go through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    pub selected: bool,
    pub content: String,
}

/// Everything an action can observe or change. One model per session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpreadsheetModel {
    pub sheet: Sheet,
    pub selected_range: Option<Range>,
    pub clipboard: Option<Clipboard>,
    pub input_field: InputField,
}

impl SpreadsheetModel {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_sheet(Sheet::new(rows, cols))
    }

    pub fn from_sheet(sheet: Sheet) -> Self {
        Self {
            sheet,
            selected_range: None,
            clipboard: None,
            input_field: InputField::default(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.sheet.row_count()
    }

    pub fn col_count(&self) -> usize {
        self.sheet.col_count()
    }

    pub fn select(&mut self, range: Range) {
        self.selected_range = Some(range);
        // A new selection deselects the input field
        self.input_field.selected = false;
    }

    /// Focus the input field, loading the top-left selected cell into it.
    /// Returns false when nothing is selected.
    pub fn select_input_field(&mut self) -> bool {
        let Some(range) = self.selected_range else {
            return false;
        };
        self.input_field.selected = true;
        self.input_field.content = self.sheet.get_display(range.start_row, range.start_col);
        true
    }

    /// TSV of the used range, used as before/after context.
    pub fn snapshot(&self) -> String {
        match self.sheet.data_extent() {
            Some(extent) => {
                let from_origin = Range::new(0, 0, extent.end_row, extent.end_col);
                self.sheet.to_tsv(&from_origin)
            }
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_input_field_loads_top_left() {
        let mut model = SpreadsheetModel::new(10, 5);
        assert!(!model.select_input_field());
        model.sheet.set_input(1, 1, "hello");
        model.select(Range::new(1, 1, 3, 3));
        assert!(model.select_input_field());
        assert!(model.input_field.selected);
        assert_eq!(model.input_field.content, "hello");
    }

    #[test]
    fn test_clipboard_dimensions() {
        let clip = Clipboard {
            rows: vec![vec![Some(CellValue::Number(1.0)), None], vec![None, None]],
        };
        assert_eq!((clip.height(), clip.width()), (2, 2));
        assert!(!clip.is_empty());
        assert!(Clipboard { rows: vec![vec![None]] }.is_empty());
    }

    #[test]
    fn test_snapshot_from_origin() {
        let mut model = SpreadsheetModel::new(10, 5);
        model.sheet.set_input(1, 1, "x");
        assert_eq!(model.snapshot(), "\t\n\tx");
    }
}
