// Excel import (calamine + styles.xml) and XLSX export (rust_xlsxwriter).
// A workbook maps onto one sheet: the first worksheet on import.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, FormatUnderline, Workbook as XlsxWorkbook};

use gridagent_engine::cell::{Alignment, CellFormat, CellValue, NumberFormat, TextOverflow, VerticalAlignment};
use gridagent_engine::sheet::{Sheet, DEFAULT_COLS, DEFAULT_ROWS};

use crate::xlsx_styles;

/// Hard limits matching the XLSX grid.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// Date serials without an explicit number format get this one.
const DATE_FORMAT: &str = "m/d/yyyy";

/// Import the first worksheet of an Excel file (xlsx, xls, xlsb, ods).
pub fn import(path: &Path) -> Result<Sheet, String> {
    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| format!("Failed to open Excel file: {}", e))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "Excel file contains no sheets".to_string())?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{}': {}", sheet_name, e))?;

    let (start_row, start_col) = range.start().map_or((0, 0), |(r, c)| (r as usize, c as usize));
    let (height, width) = range.get_size();
    let rows = (start_row + height).clamp(DEFAULT_ROWS, MAX_ROWS);
    let cols = (start_col + width).clamp(DEFAULT_COLS, MAX_COLS);

    let mut sheet = Sheet::new(rows, cols);
    sheet.name = sheet_name.clone();
    let mut dates = Vec::new();

    for (row_idx, row) in range.rows().enumerate() {
        for (col_idx, data) in row.iter().enumerate() {
            let (r, c) = (start_row + row_idx, start_col + col_idx);
            if !sheet.in_bounds(r, c) {
                continue;
            }
            let value = match data {
                Data::Empty => continue,
                Data::String(s) if s.is_empty() => continue,
                Data::String(s) => CellValue::Text(s.clone()),
                Data::Float(n) => CellValue::Number(*n),
                Data::Int(n) => CellValue::Number(*n as f64),
                Data::Bool(b) => CellValue::Boolean(*b),
                Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
                Data::DateTime(dt) => {
                    dates.push((r, c));
                    CellValue::Number(dt.as_f64())
                }
                Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            };
            sheet.set_value(r, c, value);
        }
    }

    // Formulas replace the cached values at the same position
    if let Ok(formulas) = workbook.worksheet_formula(&sheet_name) {
        let (f_row, f_col) = formulas.start().map_or((0, 0), |(r, c)| (r as usize, c as usize));
        for (row_idx, row) in formulas.rows().enumerate() {
            for (col_idx, source) in row.iter().enumerate() {
                let (r, c) = (f_row + row_idx, f_col + col_idx);
                if source.is_empty() || !sheet.in_bounds(r, c) {
                    continue;
                }
                let source = if source.starts_with('=') { source.clone() } else { format!("={}", source) };
                sheet.set_value(r, c, CellValue::Formula(source));
            }
        }
    }

    if is_xlsx(path) {
        match xlsx_styles::read_sheet_formats(path, &sheet_name) {
            Ok(formats) => {
                for (r, c, format) in formats {
                    if sheet.in_bounds(r, c) {
                        sheet.set_format(r, c, format);
                    }
                }
            }
            Err(e) => log::warn!("xlsx styles skipped: {}", e),
        }
    }

    for (r, c) in dates {
        sheet.update_format(r, c, |f| {
            if f.number_format == NumberFormat::General {
                f.number_format = NumberFormat::Custom(DATE_FORMAT.to_string());
            }
        });
    }

    Ok(sheet)
}

fn is_xlsx(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx") || e.eq_ignore_ascii_case("xlsm"))
}

/// Export a sheet to XLSX with values, formulas and the supported style subset.
pub fn export(sheet: &Sheet, path: &Path) -> Result<(), String> {
    let mut workbook = XlsxWorkbook::new();
    let worksheet = workbook
        .add_worksheet()
        .set_name(&sheet.name)
        .map_err(|e| format!("Failed to create sheet '{}': {}", sheet.name, e))?;

    for (&(row, col), cell) in sheet.cells_iter() {
        let (row32, col16) = (row as u32, col as u16);
        let format = build_excel_format(&cell.format);
        let write_err = |e: rust_xlsxwriter::XlsxError| format!("Failed to write cell ({}, {}): {}", row, col, e);

        match &cell.value {
            CellValue::Empty => {
                if !cell.format.is_default() {
                    worksheet.write_blank(row32, col16, &format).map_err(write_err)?;
                }
            }
            CellValue::Text(s) => {
                worksheet.write_string_with_format(row32, col16, s, &format).map_err(write_err)?;
            }
            CellValue::Number(n) => {
                worksheet.write_number_with_format(row32, col16, *n, &format).map_err(write_err)?;
            }
            CellValue::Boolean(b) => {
                worksheet.write_boolean_with_format(row32, col16, *b, &format).map_err(write_err)?;
            }
            CellValue::Formula(source) => {
                let formula = source.strip_prefix('=').unwrap_or(source);
                worksheet.write_formula_with_format(row32, col16, formula, &format).map_err(write_err)?;
            }
        }
    }

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {}", e))
}

fn rgb(rgba: [u8; 4]) -> Color {
    let [r, g, b, _] = rgba;
    Color::RGB(((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
}

fn build_excel_format(cell_format: &CellFormat) -> Format {
    let mut format = Format::new();

    if cell_format.bold {
        format = format.set_bold();
    }
    if cell_format.italic {
        format = format.set_italic();
    }
    if cell_format.underline {
        format = format.set_underline(FormatUnderline::Single);
    }
    if cell_format.strikethrough {
        format = format.set_font_strikethrough();
    }
    if let Some(size) = cell_format.font_size {
        format = format.set_font_size(size as f64);
    }
    if let Some(color) = cell_format.font_color {
        format = format.set_font_color(rgb(color));
    }
    if let Some(color) = cell_format.background_color {
        format = format.set_background_color(rgb(color));
    }

    format = match cell_format.alignment {
        Alignment::General => format,
        Alignment::Left => format.set_align(FormatAlign::Left),
        Alignment::Center => format.set_align(FormatAlign::Center),
        Alignment::Right => format.set_align(FormatAlign::Right),
    };
    format = match cell_format.vertical_alignment {
        VerticalAlignment::Top => format.set_align(FormatAlign::Top),
        VerticalAlignment::Middle => format.set_align(FormatAlign::VerticalCenter),
        VerticalAlignment::Bottom => format.set_align(FormatAlign::Bottom),
    };
    if cell_format.text_overflow == TextOverflow::Wrap {
        format = format.set_text_wrap();
    }

    if let NumberFormat::Custom(code) = &cell_format.number_format {
        format = format.set_num_format(code);
    }

    let borders = cell_format.borders;
    if borders.top {
        format = format.set_border_top(FormatBorder::Thin);
    }
    if borders.right {
        format = format.set_border_right(FormatBorder::Thin);
    }
    if borders.bottom {
        format = format.set_border_bottom(FormatBorder::Thin);
    }
    if borders.left {
        format = format.set_border_left(FormatBorder::Thin);
    }

    format
}
