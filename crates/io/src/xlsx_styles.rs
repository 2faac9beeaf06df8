//! XLSX style reader: resolves styles.xml into `CellFormat`s and maps the
//! per-cell `s="N"` references of a worksheet onto them.
//!
//! calamine only exposes values and formulas, so formatting is read straight
//! from the ZIP archive with quick-xml.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

use gridagent_engine::cell::{Alignment, Borders, CellFormat, NumberFormat, TextOverflow, VerticalAlignment};
use gridagent_engine::refs::parse_cell_name;

/// Resolved `cellXfs` table: style index → format.
#[derive(Debug, Default)]
pub struct StyleTable {
    pub styles: Vec<CellFormat>,
}

impl StyleTable {
    pub fn get(&self, id: usize) -> Option<&CellFormat> {
        self.styles.get(id)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct ParsedFont {
    bold: bool,
    italic: bool,
    underline: bool,
    strikethrough: bool,
    size: Option<f32>,
    color: Option<[u8; 4]>,
}

#[derive(Debug, Default)]
struct XfEntry {
    num_fmt_id: Option<u16>,
    font_id: Option<usize>,
    fill_id: Option<usize>,
    border_id: Option<usize>,
    h_align: Option<String>,
    v_align: Option<String>,
    wrap_text: bool,
}

/// Unescape the predefined XML entities found in format codes.
fn unescape_xml(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn attr_str(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn attr_num<T: std::str::FromStr>(e: &BytesStart, key: &[u8]) -> Option<T> {
    attr_str(e, key).and_then(|s| s.trim().parse().ok())
}

fn attr_flag(e: &BytesStart, key: &[u8]) -> bool {
    matches!(attr_str(e, key).as_deref(), Some("1") | Some("true"))
}

/// `AARRGGBB` or `RRGGBB` → RGBA. Fully transparent ARGB values are kept as
/// opaque since Excel writes `00` alpha for ordinary colors too.
fn parse_argb_hex(hex: &str) -> Option<[u8; 4]> {
    let s = hex.trim_start_matches('#');
    let byte = |i: usize| u8::from_str_radix(s.get(i..i + 2)?, 16).ok();
    match s.len() {
        8 => Some([byte(2)?, byte(4)?, byte(6)?, 255]),
        6 => Some([byte(0)?, byte(2)?, byte(4)?, 255]),
        _ => None,
    }
}

/// Built-in number format ids that carry a code worth keeping.
fn builtin_number_format(id: u16) -> NumberFormat {
    let code = match id {
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        14 => "m/d/yyyy",
        18 => "h:mm AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yyyy h:mm",
        49 => "@",
        _ => return NumberFormat::General,
    };
    NumberFormat::Custom(code.to_string())
}

/// Parse styles.xml content into a StyleTable.
pub fn parse_styles_xml(xml: &str) -> StyleTable {
    let num_fmts = parse_num_fmts(xml);
    let fonts = parse_fonts(xml);
    let fills = parse_fills(xml);
    let borders = parse_borders(xml);
    let styles = parse_cell_xfs(xml)
        .iter()
        .map(|xf| resolve_xf(xf, &num_fmts, &fonts, &fills, &borders))
        .collect();
    StyleTable { styles }
}

fn parse_num_fmts(xml: &str) -> HashMap<u16, String> {
    let mut map = HashMap::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_num_fmts = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"numFmts" => in_num_fmts = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"numFmts" => break,
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if in_num_fmts && e.name().as_ref() == b"numFmt" => {
                if let (Some(id), Some(code)) = (attr_num(e, b"numFmtId"), attr_str(e, b"formatCode")) {
                    map.insert(id, unescape_xml(&code));
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    map
}

fn parse_fonts(xml: &str) -> Vec<ParsedFont> {
    let mut fonts = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 1 = <fonts>, 2 = <font>
    let mut current = ParsedFont::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fonts" if depth == 0 => depth = 1,
                b"font" if depth == 1 => {
                    depth = 2;
                    current = ParsedFont::default();
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) if depth == 2 => match e.name().as_ref() {
                b"b" => current.bold = attr_str(e, b"val").as_deref() != Some("0"),
                b"i" => current.italic = attr_str(e, b"val").as_deref() != Some("0"),
                b"u" => current.underline = attr_str(e, b"val").as_deref() != Some("none"),
                b"strike" => current.strikethrough = attr_str(e, b"val").as_deref() != Some("0"),
                b"sz" => current.size = attr_num(e, b"val"),
                b"color" => current.color = attr_str(e, b"rgb").and_then(|c| parse_argb_hex(&c)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) if depth == 1 && e.name().as_ref() == b"font" => {
                fonts.push(ParsedFont::default());
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"font" if depth == 2 => {
                    fonts.push(std::mem::take(&mut current));
                    depth = 1;
                }
                b"fonts" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    fonts
}

/// Solid pattern fills only; gradients resolve to no background.
fn parse_fills(xml: &str) -> Vec<Option<[u8; 4]>> {
    let mut fills = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 1 = <fills>, 2 = <fill>
    let mut solid = false;
    let mut current: Option<[u8; 4]> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"fills" if depth == 0 => depth = 1,
                b"fill" if depth == 1 => {
                    depth = 2;
                    current = None;
                    solid = false;
                }
                b"patternFill" if depth == 2 => {
                    solid = attr_str(e, b"patternType").as_deref() == Some("solid");
                }
                b"fgColor" if depth == 2 && solid => {
                    current = attr_str(e, b"rgb").and_then(|c| parse_argb_hex(&c));
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"fill" if depth == 2 => {
                    fills.push(current.take());
                    depth = 1;
                }
                b"fills" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    fills
}

/// A side counts as drawn when it carries any style other than `none`.
fn parse_borders(xml: &str) -> Vec<Borders> {
    let mut borders = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut depth = 0; // 1 = <borders>, 2 = <border>
    let mut current = Borders::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) if depth == 1 && e.name().as_ref() == b"border" => {
                borders.push(Borders::default());
            }
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                let name = e.name();
                match name.as_ref() {
                    b"borders" if depth == 0 => depth = 1,
                    b"border" if depth == 1 => {
                        depth = 2;
                        current = Borders::default();
                    }
                    side @ (b"top" | b"right" | b"bottom" | b"left") if depth == 2 => {
                        let drawn = attr_str(e, b"style").is_some_and(|s| s != "none");
                        current.set_side(&String::from_utf8_lossy(side), drawn);
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"border" if depth == 2 => {
                    borders.push(current);
                    depth = 1;
                }
                b"borders" if depth == 1 => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    borders
}

fn parse_cell_xfs(xml: &str) -> Vec<XfEntry> {
    let mut entries = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    let mut current: Option<XfEntry> = None;

    let read_xf = |e: &BytesStart| XfEntry {
        num_fmt_id: attr_num(e, b"numFmtId"),
        font_id: attr_num(e, b"fontId"),
        fill_id: attr_num(e, b"fillId"),
        border_id: attr_num(e, b"borderId"),
        ..XfEntry::default()
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => current = Some(read_xf(e)),
                b"alignment" => {
                    if let Some(xf) = current.as_mut() {
                        read_alignment(e, xf);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"xf" if in_cell_xfs => entries.push(read_xf(e)),
                b"alignment" => {
                    if let Some(xf) = current.as_mut() {
                        read_alignment(e, xf);
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"xf" => {
                    if let Some(xf) = current.take() {
                        entries.push(xf);
                    }
                }
                b"cellXfs" => break,
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    entries
}

fn read_alignment(e: &BytesStart, xf: &mut XfEntry) {
    xf.h_align = attr_str(e, b"horizontal");
    xf.v_align = attr_str(e, b"vertical");
    xf.wrap_text = attr_flag(e, b"wrapText");
}

fn resolve_xf(
    xf: &XfEntry,
    num_fmts: &HashMap<u16, String>,
    fonts: &[ParsedFont],
    fills: &[Option<[u8; 4]>],
    borders: &[Borders],
) -> CellFormat {
    let mut format = CellFormat::default();

    if let Some(font) = xf.font_id.and_then(|id| fonts.get(id)) {
        format.bold = font.bold;
        format.italic = font.italic;
        format.underline = font.underline;
        format.strikethrough = font.strikethrough;
        format.font_size = font.size;
        format.font_color = font.color;
    }

    if let Some(fill) = xf.fill_id.and_then(|id| fills.get(id)) {
        format.background_color = *fill;
    }

    if let Some(border) = xf.border_id.and_then(|id| borders.get(id)) {
        format.borders = *border;
    }

    if let Some(id) = xf.num_fmt_id {
        format.number_format = match num_fmts.get(&id) {
            Some(code) => NumberFormat::from_code(code),
            None => builtin_number_format(id),
        };
    }

    if let Some(h) = &xf.h_align {
        format.alignment = Alignment::parse(h).unwrap_or_default();
    }
    if let Some(v) = &xf.v_align {
        // Excel spells the middle position "center"
        format.vertical_alignment = match v.as_str() {
            "top" => VerticalAlignment::Top,
            "bottom" => VerticalAlignment::Bottom,
            _ => VerticalAlignment::Middle,
        };
    }
    if xf.wrap_text {
        format.text_overflow = TextOverflow::Wrap;
    }

    format
}

/// Extract `(row, col, style_id)` for every styled cell in a worksheet.
/// Style 0 is the workbook default and is skipped.
pub fn parse_cell_styles(xml: &str) -> Vec<(usize, usize, usize)> {
    let mut cell_styles = Vec::new();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) if e.name().as_ref() == b"c" => {
                let style_id: Option<usize> = attr_num(e, b"s");
                let position = attr_str(e, b"r").and_then(|r| parse_cell_name(&r));
                if let (Some(style_id), Some((row, col))) = (style_id, position) {
                    if style_id > 0 {
                        cell_styles.push((row, col, style_id));
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    cell_styles
}

/// Read the formatting of one sheet from an XLSX file.
/// Returns resolved `(row, col, format)` entries; default-formatted cells are omitted.
pub fn read_sheet_formats(path: &Path, sheet_name: &str) -> Result<Vec<(usize, usize, CellFormat)>, String> {
    let file = std::fs::File::open(path).map_err(|e| format!("Failed to open XLSX file for styles: {}", e))?;
    let mut archive = ZipArchive::new(file).map_err(|e| format!("Failed to read XLSX as ZIP for styles: {}", e))?;

    let Ok(styles_xml) = read_zip_file(&mut archive, "xl/styles.xml") else {
        return Ok(Vec::new());
    };
    let table = parse_styles_xml(&styles_xml);

    let workbook_xml = read_zip_file(&mut archive, "xl/workbook.xml").unwrap_or_default();
    let rels_xml = read_zip_file(&mut archive, "xl/_rels/workbook.xml.rels").unwrap_or_default();
    let Some(sheet_path) = resolve_worksheet_path(&workbook_xml, &rels_xml, sheet_name) else {
        return Ok(Vec::new());
    };
    let sheet_xml = read_zip_file(&mut archive, &sheet_path)?;

    Ok(parse_cell_styles(&sheet_xml)
        .into_iter()
        .filter_map(|(row, col, id)| {
            let format = table.get(id)?;
            (!format.is_default()).then(|| (row, col, format.clone()))
        })
        .collect())
}

fn read_zip_file<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &str) -> Result<String, String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| format!("File '{}' not found in XLSX: {}", path, e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    Ok(content)
}

/// Follow workbook.xml `<sheet name r:id>` through the relationships file.
fn resolve_worksheet_path(workbook_xml: &str, rels_xml: &str, sheet_name: &str) -> Option<String> {
    let rid = find_element_attr(workbook_xml, b"sheet", |e| {
        (attr_str(e, b"name").as_deref() == Some(sheet_name)).then(|| attr_str(e, b"r:id")).flatten()
    })?;
    let target = find_element_attr(rels_xml, b"Relationship", |e| {
        (attr_str(e, b"Id").as_deref() == Some(rid.as_str())).then(|| attr_str(e, b"Target")).flatten()
    })?;
    // Targets are relative to xl/ unless absolute
    Some(match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    })
}

fn find_element_attr(xml: &str, element: &[u8], pick: impl Fn(&BytesStart) -> Option<String>) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == element => {
                if let Some(found) = pick(e) {
                    return Some(found);
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet>
  <numFmts count="1"><numFmt numFmtId="164" formatCode="&quot;$&quot;#,##0.00"/></numFmts>
  <fonts count="2">
    <font><sz val="11"/><name val="Calibri"/></font>
    <font><b/><i/><sz val="14"/><color rgb="FFFF0000"/></font>
  </fonts>
  <fills count="3">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/></patternFill></fill>
  </fills>
  <borders count="2">
    <border/>
    <border><left style="thin"/><right/><top style="thin"/><bottom style="none"/></border>
  </borders>
  <cellXfs count="4">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
    <xf numFmtId="164" fontId="1" fillId="2" borderId="1"/>
    <xf numFmtId="10" fontId="0" fillId="0" borderId="0">
      <alignment horizontal="center" vertical="top" wrapText="1"/>
    </xf>
    <xf numFmtId="0" fontId="0" fillId="1" borderId="0"/>
  </cellXfs>
</styleSheet>"#;

    #[test]
    fn test_parse_styles_resolves_components() {
        let table = parse_styles_xml(STYLES);
        assert_eq!(table.len(), 4);
        assert_eq!(table.get(0).unwrap().font_size, Some(11.0));

        let rich = table.get(1).unwrap();
        assert!(rich.bold && rich.italic);
        assert_eq!(rich.font_size, Some(14.0));
        assert_eq!(rich.font_color, Some([255, 0, 0, 255]));
        assert_eq!(rich.background_color, Some([255, 255, 0, 255]));
        assert_eq!(rich.number_format, NumberFormat::Custom("\"$\"#,##0.00".into()));
        assert!(rich.borders.left && rich.borders.top);
        assert!(!rich.borders.right && !rich.borders.bottom);

        let aligned = table.get(2).unwrap();
        assert_eq!(aligned.alignment, Alignment::Center);
        assert_eq!(aligned.vertical_alignment, VerticalAlignment::Top);
        assert_eq!(aligned.text_overflow, TextOverflow::Wrap);
        assert_eq!(aligned.number_format, NumberFormat::Custom("0.00%".into()));

        // Non-solid patterns carry no background
        assert_eq!(table.get(3).unwrap().background_color, None);
    }

    #[test]
    fn test_parse_cell_styles_skips_default() {
        let xml = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" s="1"><v>1</v></c><c r="B1" s="0"><v>2</v></c></row>
            <row r="3"><c r="AA3" s="2"/></row>
        </sheetData></worksheet>"#;
        assert_eq!(parse_cell_styles(xml), vec![(0, 0, 1), (2, 26, 2)]);
    }

    #[test]
    fn test_resolve_worksheet_path() {
        let workbook = r#"<workbook><sheets>
            <sheet name="Data" sheetId="1" r:id="rId1"/>
            <sheet name="Other" sheetId="2" r:id="rId2"/>
        </sheets></workbook>"#;
        let rels = r#"<Relationships>
            <Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
            <Relationship Id="rId2" Target="/xl/worksheets/sheet2.xml"/>
        </Relationships>"#;
        assert_eq!(resolve_worksheet_path(workbook, rels, "Data").as_deref(), Some("xl/worksheets/sheet1.xml"));
        assert_eq!(resolve_worksheet_path(workbook, rels, "Other").as_deref(), Some("xl/worksheets/sheet2.xml"));
        assert_eq!(resolve_worksheet_path(workbook, rels, "Missing"), None);
    }

    #[test]
    fn test_parse_argb_hex() {
        assert_eq!(parse_argb_hex("FF00FF00"), Some([0, 255, 0, 255]));
        assert_eq!(parse_argb_hex("#123456"), Some([0x12, 0x34, 0x56, 255]));
        assert_eq!(parse_argb_hex("XYZ"), None);
    }
}
