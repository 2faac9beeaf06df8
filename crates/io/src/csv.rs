// CSV/TSV import/export. Values only; styles are not representable.

use std::io::Read;
use std::path::Path;

use gridagent_engine::sheet::{Sheet, DEFAULT_COLS, DEFAULT_ROWS};

pub fn import(path: &Path) -> Result<Sheet, String> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&content, delimiter)
}

pub fn import_tsv(path: &Path) -> Result<Sheet, String> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&content, b'\t')
}

/// Pick the delimiter giving the most consistent field count (>1) over the
/// first lines. Candidates: tab, semicolon, comma, pipe.
fn sniff_delimiter(content: &str) -> u8 {
    let sample: Vec<&str> = content.lines().take(10).collect();
    let fields_in = |line: &str, delim: u8| {
        csv::ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes())
            .records()
            .next()
            .and_then(|r| r.ok())
            .map_or(1, |r| r.len())
    };

    [b'\t', b';', b',', b'|']
        .into_iter()
        .filter_map(|delim| {
            let counts: Vec<usize> = sample.iter().map(|line| fields_in(line, delim)).collect();
            let first = *counts.first()?;
            if first <= 1 {
                return None;
            }
            let consistent = counts.iter().filter(|&&c| c == first).count();
            Some((consistent * first, delim))
        })
        // Earlier candidates win ties
        .fold(None, |best: Option<(usize, u8)>, (score, delim)| match best {
            Some((best_score, _)) if best_score >= score => best,
            _ => Some((score, delim)),
        })
        .map_or(b',', |(_, delim)| delim)
}

/// Read file and convert to UTF-8 if needed (Windows-1252 fallback for Excel exports)
pub fn read_file_as_utf8(path: &Path) -> Result<String, String> {
    let mut bytes = Vec::new();
    std::fs::File::open(path)
        .and_then(|mut f| f.read_to_end(&mut bytes))
        .map_err(|e| format!("{}: {}", path.display(), e))?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
            Ok(decoded.into_owned())
        }
    }
}

fn import_from_string(content: &str, delimiter: u8) -> Result<Sheet, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())?;

    let width = records.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut sheet = Sheet::new(records.len().max(DEFAULT_ROWS), width.max(DEFAULT_COLS));

    for (row, record) in records.iter().enumerate() {
        for (col, field) in record.iter().enumerate() {
            if !field.is_empty() {
                sheet.set_input(row, col, field);
            }
        }
    }
    Ok(sheet)
}

pub fn export(sheet: &Sheet, path: &Path) -> Result<(), String> {
    export_with_delimiter(sheet, path, b',')
}

pub fn export_tsv(sheet: &Sheet, path: &Path) -> Result<(), String> {
    export_with_delimiter(sheet, path, b'\t')
}

fn export_with_delimiter(sheet: &Sheet, path: &Path, delimiter: u8) -> Result<(), String> {
    // Trailing empties are dropped, so rows can differ in width
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(|e| e.to_string())?;

    if let Some(extent) = sheet.data_extent() {
        for row in 0..=extent.end_row {
            let mut record: Vec<String> = (0..=extent.end_col).map(|col| sheet.get_display(row, col)).collect();
            while record.last().is_some_and(|v| v.is_empty()) {
                record.pop();
            }
            // Blank rows stay as blank lines so row numbers survive
            if record.is_empty() {
                record.push(String::new());
            }
            writer.write_record(&record).map_err(|e| e.to_string())?;
        }
    }

    writer.flush().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use gridagent_engine::CellValue;

    #[test]
    fn test_sniff_delimiters() {
        assert_eq!(sniff_delimiter("Name;Age;City\nAlice;30;Paris\n"), b';');
        assert_eq!(sniff_delimiter("Name,Age,City\nAlice,30,Paris\n"), b',');
        assert_eq!(sniff_delimiter("Name\tAge\nAlice\t30\n"), b'\t');
        assert_eq!(sniff_delimiter("Name|Age\nAlice|30\n"), b'|');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        let content = "Name;Address;City\n\"Doe, Jane\";\"123 Main St, Apt 4\";Paris\nBob;\"456 Elm\";London\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_import_types_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.csv");
        fs::write(&path, "Name,Qty,Total\nPear,4,=B2*2\n").unwrap();

        let sheet = import(&path).unwrap();
        assert_eq!(sheet.get_display(0, 0), "Name");
        assert_eq!(sheet.get_value(1, 1), CellValue::Number(4.0));
        assert_eq!(sheet.get_value(1, 2), CellValue::Formula("=B2*2".into()));
    }

    #[test]
    fn test_windows_1252_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Café" with 0xE9
        fs::write(&path, b"Caf\xe9,1\n").unwrap();
        let sheet = import(&path).unwrap();
        assert_eq!(sheet.get_display(0, 0), "Café");
    }

    #[test]
    fn test_tsv_roundtrip_keeps_blank_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.tsv");

        let mut sheet = Sheet::new(100, 10);
        sheet.set_input(0, 0, "Name");
        sheet.set_input(0, 1, "Value");
        sheet.set_input(2, 0, "Bob");
        sheet.set_input(2, 1, "17");
        export_tsv(&sheet, &path).unwrap();

        let imported = import_tsv(&path).unwrap();
        assert_eq!(imported.get_display(0, 1), "Value");
        assert_eq!(imported.get_display(1, 0), "");
        assert_eq!(imported.get_display(2, 0), "Bob");
        assert_eq!(imported.get_value(2, 1), CellValue::Number(17.0));
    }
}
