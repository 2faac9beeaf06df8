// File I/O operations

use std::path::Path;

use gridagent_engine::Sheet;

pub mod csv;
pub mod native;
pub mod xlsx;
pub mod xlsx_styles;

/// Native .sheet format version
/// Increment when schema changes in a way that old versions can't read
pub const NATIVE_FORMAT_VERSION: u32 = 1;

/// File formats recognized by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Native,
    Csv,
    Tsv,
    Excel,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "sheet" => Some(FileFormat::Native),
            "csv" => Some(FileFormat::Csv),
            "tsv" | "tab" => Some(FileFormat::Tsv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(FileFormat::Excel),
            _ => None,
        }
    }
}

/// Load a sheet, dispatching on the file extension.
pub fn load(path: &Path) -> Result<Sheet, String> {
    let format = FileFormat::from_path(path)
        .ok_or_else(|| format!("{}: unsupported file type", path.display()))?;
    log::debug!("loading {} as {:?}", path.display(), format);
    match format {
        FileFormat::Native => native::load(path),
        FileFormat::Csv => csv::import(path),
        FileFormat::Tsv => csv::import_tsv(path),
        FileFormat::Excel => xlsx::import(path),
    }
}

/// Save a sheet, dispatching on the file extension. Only `.xlsx` is written
/// for Excel formats.
pub fn save(sheet: &Sheet, path: &Path) -> Result<(), String> {
    let format = FileFormat::from_path(path)
        .ok_or_else(|| format!("{}: unsupported file type", path.display()))?;
    log::debug!("saving {} as {:?}", path.display(), format);
    match format {
        FileFormat::Native => native::save(sheet, path),
        FileFormat::Csv => csv::export(sheet, path),
        FileFormat::Tsv => csv::export_tsv(sheet, path),
        FileFormat::Excel => {
            let is_xlsx = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
            if !is_xlsx {
                return Err(format!("{}: only .xlsx can be written", path.display()));
            }
            xlsx::export(sheet, path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_format_from_path() {
        assert_eq!(FileFormat::from_path(&PathBuf::from("a.SHEET")), Some(FileFormat::Native));
        assert_eq!(FileFormat::from_path(&PathBuf::from("a.csv")), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_path(&PathBuf::from("a.tsv")), Some(FileFormat::Tsv));
        assert_eq!(FileFormat::from_path(&PathBuf::from("a.ods")), Some(FileFormat::Excel));
        assert_eq!(FileFormat::from_path(&PathBuf::from("a.txt")), None);
        assert_eq!(FileFormat::from_path(&PathBuf::from("noext")), None);
    }

    #[test]
    fn test_save_load_dispatch() {
        let dir = tempdir().unwrap();
        let mut sheet = Sheet::default();
        sheet.set_input(0, 0, "Total");
        sheet.set_input(0, 1, "42");

        for name in ["book.sheet", "book.csv", "book.tsv", "book.xlsx"] {
            let path = dir.path().join(name);
            save(&sheet, &path).unwrap();
            let loaded = load(&path).unwrap();
            assert_eq!(loaded.get_display(0, 0), "Total", "{}", name);
            assert_eq!(loaded.get_display(0, 1), "42", "{}", name);
        }
    }

    #[test]
    fn test_rejects_unknown_and_legacy_excel() {
        let dir = tempdir().unwrap();
        let sheet = Sheet::default();
        assert!(save(&sheet, &dir.path().join("a.txt")).is_err());
        assert!(save(&sheet, &dir.path().join("a.xls")).is_err());
        assert!(load(&dir.path().join("a.txt")).is_err());
    }
}
