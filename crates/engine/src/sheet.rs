use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cell::{Cell, CellFormat, CellValue};
use crate::selection::Range;

pub const DEFAULT_ROWS: usize = 1000;
pub const DEFAULT_COLS: usize = 26;

/// A fixed-size grid of sparse cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    cells: FxHashMap<(usize, usize), Cell>,
    rows: usize,
    cols: usize,
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new(DEFAULT_ROWS, DEFAULT_COLS)
    }
}

impl Sheet {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            name: "Sheet1".to_string(),
            cells: FxHashMap::default(),
            rows,
            cols,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn col_count(&self) -> usize {
        self.cols
    }

    /// Grow the grid so that (row, col) fits. Never shrinks.
    pub fn ensure_size(&mut self, rows: usize, cols: usize) {
        self.rows = self.rows.max(rows);
        self.cols = self.cols.max(cols);
    }

    pub fn in_bounds(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    pub fn range_in_bounds(&self, range: &Range) -> bool {
        self.in_bounds(range.end_row, range.end_col)
    }

    pub fn get_cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn get_value(&self, row: usize, col: usize) -> CellValue {
        self.cells.get(&(row, col)).map(|c| c.value.clone()).unwrap_or_default()
    }

    /// Stringified value: what filter patterns and reads see.
    pub fn get_display(&self, row: usize, col: usize) -> String {
        self.cells
            .get(&(row, col))
            .map(|c| c.value.raw_display())
            .unwrap_or_default()
    }

    pub fn get_format(&self, row: usize, col: usize) -> CellFormat {
        self.cells.get(&(row, col)).map(|c| c.format.clone()).unwrap_or_default()
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: CellValue) {
        let cell = self.cells.entry((row, col)).or_insert_with(Cell::new);
        cell.value = value;
        self.prune(row, col);
    }

    pub fn set_input(&mut self, row: usize, col: usize, input: &str) {
        self.set_value(row, col, CellValue::from_input(input));
    }

    /// Clear the value but keep formatting.
    pub fn clear_value(&mut self, row: usize, col: usize) {
        if let Some(cell) = self.cells.get_mut(&(row, col)) {
            cell.value = CellValue::Empty;
        }
        self.prune(row, col);
    }

    pub fn set_format(&mut self, row: usize, col: usize, format: CellFormat) {
        self.cells.entry((row, col)).or_insert_with(Cell::new).format = format;
        self.prune(row, col);
    }

    /// Mutate a cell's format in place.
    pub fn update_format(&mut self, row: usize, col: usize, f: impl FnOnce(&mut CellFormat)) {
        f(&mut self.cells.entry((row, col)).or_insert_with(Cell::new).format);
        self.prune(row, col);
    }

    pub fn clear_format(&mut self, row: usize, col: usize) {
        self.set_format(row, col, CellFormat::default());
    }

    fn prune(&mut self, row: usize, col: usize) {
        if self.cells.get(&(row, col)).is_some_and(Cell::is_blank) {
            self.cells.remove(&(row, col));
        }
    }

    pub fn cells_iter(&self) -> impl Iterator<Item = (&(usize, usize), &Cell)> {
        self.cells.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|c| c.value.is_empty())
    }

    /// Index of the last row in `col` holding a non-empty value.
    pub fn last_nonempty_row(&self, col: usize) -> Option<usize> {
        self.cells
            .iter()
            .filter(|((_, c), cell)| *c == col && !cell.value.is_empty())
            .map(|((r, _), _)| *r)
            .max()
    }

    /// Bounding box of all non-empty values.
    pub fn data_extent(&self) -> Option<Range> {
        let mut extent: Option<Range> = None;
        for (&(row, col), cell) in &self.cells {
            if cell.value.is_empty() {
                continue;
            }
            extent = Some(match extent {
                None => Range::single(row, col),
                Some(r) => Range {
                    start_row: r.start_row.min(row),
                    start_col: r.start_col.min(col),
                    end_row: r.end_row.max(row),
                    end_col: r.end_col.max(col),
                },
            });
        }
        extent
    }

    /// Tab-separated values of a range, one line per row.
    pub fn to_tsv(&self, range: &Range) -> String {
        (range.start_row..=range.end_row)
            .map(|row| {
                (range.start_col..=range.end_col)
                    .map(|col| self.get_display(row, col))
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
