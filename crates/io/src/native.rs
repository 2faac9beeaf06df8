// Native .sheet format using SQLite

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};

use gridagent_engine::cell::{Alignment, Borders, CellFormat, CellValue, NumberFormat, TextOverflow, VerticalAlignment};
use gridagent_engine::sheet::{Sheet, DEFAULT_COLS, DEFAULT_ROWS};

use crate::NATIVE_FORMAT_VERSION;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cells (
    row INTEGER NOT NULL,
    col INTEGER NOT NULL,
    value_type INTEGER NOT NULL,  -- 0=empty, 1=number, 2=text, 3=formula, 4=boolean
    value_num REAL,
    value_text TEXT,
    fmt_bold INTEGER DEFAULT 0,
    fmt_italic INTEGER DEFAULT 0,
    fmt_underline INTEGER DEFAULT 0,
    fmt_strikethrough INTEGER DEFAULT 0,
    fmt_font_size REAL,                  -- NULL = default size
    fmt_font_color INTEGER,              -- packed RGBA, NULL = automatic
    fmt_background INTEGER,              -- packed RGBA, NULL = no fill
    fmt_alignment INTEGER DEFAULT 0,     -- 0=general, 1=left, 2=center, 3=right
    fmt_valign INTEGER DEFAULT 1,        -- 0=top, 1=middle, 2=bottom
    fmt_wrap INTEGER DEFAULT 0,
    fmt_number_format TEXT,              -- NULL = General
    fmt_borders INTEGER DEFAULT 0,       -- bits: 1=top, 2=right, 4=bottom, 8=left
    PRIMARY KEY (row, col)
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

// Value type constants
const TYPE_EMPTY: i32 = 0;
const TYPE_NUMBER: i32 = 1;
const TYPE_TEXT: i32 = 2;
const TYPE_FORMULA: i32 = 3;
const TYPE_BOOLEAN: i32 = 4;

fn pack_rgba(c: [u8; 4]) -> i64 {
    u32::from_be_bytes(c) as i64
}

fn unpack_rgba(v: i64) -> [u8; 4] {
    (v as u32).to_be_bytes()
}

fn pack_borders(b: &Borders) -> i32 {
    (b.top as i32) | (b.right as i32) << 1 | (b.bottom as i32) << 2 | (b.left as i32) << 3
}

fn unpack_borders(bits: i32) -> Borders {
    Borders {
        top: bits & 1 != 0,
        right: bits & 2 != 0,
        bottom: bits & 4 != 0,
        left: bits & 8 != 0,
    }
}

/// Write to a sibling temp file, then rename over `path`.
/// On failure the destination is untouched.
pub fn save(sheet: &Sheet, path: &Path) -> Result<(), String> {
    let tmp = temp_sibling(path);
    let result = write_db(sheet, &tmp).and_then(|()| std::fs::rename(&tmp, path).map_err(|e| e.to_string()));
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

fn write_db(sheet: &Sheet, path: &Path) -> Result<(), String> {
    let mut conn = Connection::open(path).map_err(|e| e.to_string())?;
    conn.execute_batch(SCHEMA).map_err(|e| e.to_string())?;

    let tx = conn.transaction().map_err(|e| e.to_string())?;
    {
        let mut meta = tx
            .prepare("INSERT INTO meta (key, value) VALUES (?1, ?2)")
            .map_err(|e| e.to_string())?;
        for (key, value) in [
            ("format_version", NATIVE_FORMAT_VERSION.to_string()),
            ("sheet_name", sheet.name.clone()),
            ("rows", sheet.row_count().to_string()),
            ("cols", sheet.col_count().to_string()),
            ("saved_at", chrono::Utc::now().to_rfc3339()),
        ] {
            meta.execute(params![key, value]).map_err(|e| e.to_string())?;
        }

        let mut stmt = tx.prepare(
            "INSERT INTO cells (row, col, value_type, value_num, value_text, fmt_bold, fmt_italic, fmt_underline, fmt_strikethrough, fmt_font_size, fmt_font_color, fmt_background, fmt_alignment, fmt_valign, fmt_wrap, fmt_number_format, fmt_borders) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ).map_err(|e| e.to_string())?;

        for (&(row, col), cell) in sheet.cells_iter() {
            let (value_type, value_num, value_text): (i32, Option<f64>, Option<&str>) = match &cell.value {
                CellValue::Empty => (TYPE_EMPTY, None, None),
                CellValue::Number(n) => (TYPE_NUMBER, Some(*n), None),
                CellValue::Text(s) => (TYPE_TEXT, None, Some(s.as_str())),
                CellValue::Formula(src) => (TYPE_FORMULA, None, Some(src.as_str())),
                CellValue::Boolean(b) => (TYPE_BOOLEAN, Some(if *b { 1.0 } else { 0.0 }), None),
            };

            let f = &cell.format;
            let alignment = match f.alignment {
                Alignment::General => 0,
                Alignment::Left => 1,
                Alignment::Center => 2,
                Alignment::Right => 3,
            };
            let valign = match f.vertical_alignment {
                VerticalAlignment::Top => 0,
                VerticalAlignment::Middle => 1,
                VerticalAlignment::Bottom => 2,
            };
            let number_format = match &f.number_format {
                NumberFormat::General => None,
                NumberFormat::Custom(code) => Some(code.as_str()),
            };

            stmt.execute(params![
                row as i64,
                col as i64,
                value_type,
                value_num,
                value_text,
                f.bold as i32,
                f.italic as i32,
                f.underline as i32,
                f.strikethrough as i32,
                f.font_size.map(|s| s as f64),
                f.font_color.map(pack_rgba),
                f.background_color.map(pack_rgba),
                alignment,
                valign,
                (f.text_overflow == TextOverflow::Wrap) as i32,
                number_format,
                pack_borders(&f.borders),
            ])
            .map_err(|e| e.to_string())?;
        }
    }
    tx.commit().map_err(|e| e.to_string())
}

fn meta_value(conn: &Connection, key: &str) -> Option<String> {
    conn.query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
        .ok()
}

pub fn load(path: &Path) -> Result<Sheet, String> {
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()));
    }
    let conn = Connection::open(path).map_err(|e| e.to_string())?;

    if let Some(version) = meta_value(&conn, "format_version").and_then(|v| v.parse::<u32>().ok()) {
        if version > NATIVE_FORMAT_VERSION {
            return Err(format!(
                "File was written by a newer version (format {}, this build reads {})",
                version, NATIVE_FORMAT_VERSION
            ));
        }
    }

    let rows = meta_value(&conn, "rows").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_ROWS);
    let cols = meta_value(&conn, "cols").and_then(|v| v.parse().ok()).unwrap_or(DEFAULT_COLS);
    let mut sheet = Sheet::new(rows, cols);
    if let Some(name) = meta_value(&conn, "sheet_name") {
        sheet.name = name;
    }

    let mut stmt = conn
        .prepare("SELECT row, col, value_type, value_num, value_text, fmt_bold, fmt_italic, fmt_underline, fmt_strikethrough, fmt_font_size, fmt_font_color, fmt_background, fmt_alignment, fmt_valign, fmt_wrap, fmt_number_format, fmt_borders FROM cells")
        .map_err(|e| e.to_string())?;

    let cell_iter = stmt
        .query_map([], |r| {
            let row: i64 = r.get(0)?;
            let col: i64 = r.get(1)?;
            let value_type: i32 = r.get(2)?;
            let value_num: Option<f64> = r.get(3)?;
            let value_text: Option<String> = r.get(4)?;

            let value = match value_type {
                TYPE_NUMBER => value_num.map(CellValue::Number).unwrap_or_default(),
                TYPE_TEXT => value_text.map(CellValue::Text).unwrap_or_default(),
                TYPE_FORMULA => value_text.map(CellValue::Formula).unwrap_or_default(),
                TYPE_BOOLEAN => CellValue::Boolean(value_num.unwrap_or(0.0) != 0.0),
                _ => CellValue::Empty,
            };

            let alignment = match r.get::<_, i32>(12)? {
                1 => Alignment::Left,
                2 => Alignment::Center,
                3 => Alignment::Right,
                _ => Alignment::General,
            };
            let vertical_alignment = match r.get::<_, i32>(13)? {
                0 => VerticalAlignment::Top,
                2 => VerticalAlignment::Bottom,
                _ => VerticalAlignment::Middle,
            };
            let format = CellFormat {
                bold: r.get::<_, i32>(5)? != 0,
                italic: r.get::<_, i32>(6)? != 0,
                underline: r.get::<_, i32>(7)? != 0,
                strikethrough: r.get::<_, i32>(8)? != 0,
                font_size: r.get::<_, Option<f64>>(9)?.map(|s| s as f32),
                font_color: r.get::<_, Option<i64>>(10)?.map(unpack_rgba),
                background_color: r.get::<_, Option<i64>>(11)?.map(unpack_rgba),
                alignment,
                vertical_alignment,
                text_overflow: if r.get::<_, i32>(14)? != 0 { TextOverflow::Wrap } else { TextOverflow::Clip },
                number_format: r
                    .get::<_, Option<String>>(15)?
                    .map(|code| NumberFormat::from_code(&code))
                    .unwrap_or_default(),
                borders: unpack_borders(r.get(16)?),
            };
            Ok((row as usize, col as usize, value, format))
        })
        .map_err(|e| e.to_string())?;

    for cell in cell_iter {
        let (row, col, value, format) = cell.map_err(|e| e.to_string())?;
        sheet.ensure_size(row + 1, col + 1);
        sheet.set_value(row, col, value);
        sheet.set_format(row, col, format);
    }

    Ok(sheet)
}
