#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Readers for the OOXML parts the cell-value parser does not expose: fill
//! colors, number formats, cell protection, notes and sheet visibility.

use std::{
    collections::HashMap,
    io::{Read, Seek},
};

use quick_xml::{Reader, events::Event};
use zip::ZipArchive;

use super::Annotation;
use crate::types::CellRef;

/// A `<sheet>` entry of `xl/workbook.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SheetEntry {
    /// Sheet name.
    pub name:   String,
    /// Relationship id pointing at the worksheet part.
    pub rid:    String,
    /// `state="hidden"` or `state="veryHidden"`.
    pub hidden: bool,
}

/// The parts of a cell format the grader cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct CellStyle {
    /// Pattern fill foreground color, ARGB hex.
    pub fill:       Option<String>,
    /// Number format code; `None` for General.
    pub num_format: Option<String>,
    /// `<protection locked="0"/>`
    pub unlocked:   bool,
}

impl CellStyle {
    /// Whether the style carries nothing beyond the defaults.
    pub fn is_plain(&self) -> bool {
        self.fill.is_none() && self.num_format.is_none() && !self.unlocked
    }
}

/// Per-cell details collected from a worksheet part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SheetDetails {
    /// Style index (`s` attribute) of each cell that has one.
    pub styles:    Vec<(CellRef, usize)>,
    /// Whether `<sheetProtection>` is present.
    pub protected: bool,
}

/// Reads a text part out of the zip container.
pub(crate) fn read_zip_file<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> std::io::Result<String> {
    let mut file = archive
        .by_name(path)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, format!("{path}: {e}")))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// Reads a part that may legitimately be missing.
pub(crate) fn read_optional_zip_file<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    path: &str,
) -> Option<String> {
    read_zip_file(archive, path).ok()
}

/// Unescapes a general entity reference (`amp`, `#10`, `#x41`, ...).
fn resolve_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = name.strip_prefix('#')?;
            let value = match code.strip_prefix('x').or_else(|| code.strip_prefix('X')) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => code.parse().ok()?,
            };
            char::from_u32(value)
        }
    }
}

/// Unescapes the predefined XML entities inside attribute values.
fn unescape_xml(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Reads one attribute of an element as an owned string.
fn attr_value(e: &quick_xml::events::BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| unescape_xml(&String::from_utf8_lossy(&attr.value)))
}

/// Lists the sheets declared in `xl/workbook.xml`, in tab order.
pub(crate) fn parse_workbook_sheets(workbook_xml: &str) -> Vec<SheetEntry> {
    let mut entries = Vec::new();
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) if e.name().as_ref() == b"sheet" => {
                let name = attr_value(e, b"name");
                let rid = attr_value(e, b"r:id");
                let hidden = attr_value(e, b"state").is_some_and(|s| s != "visible");
                if let (Some(name), Some(rid)) = (name, rid) {
                    entries.push(SheetEntry { name, rid, hidden });
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    entries
}

/// Maps relationship ids to `(type, target)` for a `.rels` part.
fn parse_relationships(rels_xml: &str) -> HashMap<String, (String, String)> {
    let mut rels = HashMap::new();
    let mut reader = Reader::from_str(rels_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.name().as_ref() == b"Relationship" =>
            {
                let id = attr_value(e, b"Id");
                let target = attr_value(e, b"Target");
                let kind = attr_value(e, b"Type").unwrap_or_default();
                if let (Some(id), Some(target)) = (id, target) {
                    rels.insert(id, (kind, target));
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    rels
}

/// Resolves a relationship target against the folder of its source part.
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "." | "" => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Folder containing a part, e.g. `xl/worksheets` for
/// `xl/worksheets/sheet1.xml`.
fn part_dir(part: &str) -> &str {
    part.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Path of a part's relationship file, e.g.
/// `xl/worksheets/_rels/sheet1.xml.rels`.
pub(crate) fn rels_path_for(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Finds the worksheet part behind a sheet's relationship id.
pub(crate) fn worksheet_path(workbook_rels_xml: &str, rid: &str) -> Option<String> {
    let rels = parse_relationships(workbook_rels_xml);
    rels.get(rid).map(|(_, target)| resolve_target("xl", target))
}

/// Finds the comments part linked from a worksheet's relationships.
pub(crate) fn comments_path(sheet_part: &str, sheet_rels_xml: &str) -> Option<String> {
    parse_relationships(sheet_rels_xml)
        .into_values()
        .find(|(kind, _)| kind.ends_with("/comments"))
        .map(|(_, target)| resolve_target(part_dir(sheet_part), &target))
}

/// Format code of a built-in number format id; `None` for General and ids
/// Excel does not predefine.
fn builtin_num_format(id: u16) -> Option<&'static str> {
    let code = match id {
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        5 => "$#,##0_);($#,##0)",
        6 => "$#,##0_);[Red]($#,##0)",
        7 => "$#,##0.00_);($#,##0.00)",
        8 => "$#,##0.00_);[Red]($#,##0.00)",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "m/d/yyyy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yyyy h:mm",
        37 => "#,##0_);(#,##0)",
        38 => "#,##0_);[Red](#,##0)",
        39 => "#,##0.00_);(#,##0.00)",
        40 => "#,##0.00_);[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mm:ss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    };
    Some(code)
}

/// Collects the custom `<numFmt>` codes of `xl/styles.xml` by id.
fn parse_num_formats(styles_xml: &str) -> HashMap<u16, String> {
    let mut formats = HashMap::new();
    let mut reader = Reader::from_str(styles_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_num_fmts = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"numFmts" => in_num_fmts = true,
            Ok(Event::End(ref e)) if e.name().as_ref() == b"numFmts" => break,
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if in_num_fmts && e.name().as_ref() == b"numFmt" =>
            {
                let id = attr_value(e, b"numFmtId").and_then(|id| id.parse::<u16>().ok());
                if let (Some(id), Some(code)) = (id, attr_value(e, b"formatCode")) {
                    formats.insert(id, code);
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    formats
}

/// Resolves every `cellXfs` entry of `xl/styles.xml` to its fill color,
/// number format and lock state.
pub(crate) fn parse_cell_styles(styles_xml: &str) -> Vec<CellStyle> {
    let fills = parse_fills(styles_xml);
    let num_formats = parse_num_formats(styles_xml);
    let mut styles = Vec::new();
    let mut reader = Reader::from_str(styles_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_cell_xfs = false;
    let mut current: Option<CellStyle> = None;

    /// Builds the style for an `<xf>` element from its `fillId` and
    /// `numFmtId`.
    fn start_xf(
        e: &quick_xml::events::BytesStart,
        fills: &[Option<String>],
        num_formats: &HashMap<u16, String>,
    ) -> CellStyle {
        let fill = attr_value(e, b"fillId")
            .and_then(|id| id.parse::<usize>().ok())
            .and_then(|id| fills.get(id).cloned().flatten());
        let num_format = attr_value(e, b"numFmtId")
            .and_then(|id| id.parse::<u16>().ok())
            .and_then(|id| {
                num_formats
                    .get(&id)
                    .cloned()
                    .or_else(|| builtin_num_format(id).map(str::to_string))
            });
        CellStyle {
            fill,
            num_format,
            unlocked: false,
        }
    }

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => current = Some(start_xf(e, &fills, &num_formats)),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"xf" if in_cell_xfs => styles.push(start_xf(e, &fills, &num_formats)),
                b"protection" => {
                    if let Some(style) = current.as_mut() {
                        style.unlocked = attr_value(e, b"locked")
                            .is_some_and(|v| v == "0" || v.eq_ignore_ascii_case("false"));
                    }
                }
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"xf" if in_cell_xfs => {
                    if let Some(style) = current.take() {
                        styles.push(style);
                    }
                }
                b"cellXfs" => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    styles
}

/// Lists the foreground color of every `<fill>` (None for non-RGB or empty
/// fills).
fn parse_fills(styles_xml: &str) -> Vec<Option<String>> {
    let mut fills = Vec::new();
    let mut reader = Reader::from_str(styles_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_fills = false;
    let mut in_fill = false;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"fills" => in_fills = true,
                b"fill" if in_fills => {
                    in_fill = true;
                    current = None;
                }
                b"fgColor" if in_fill => current = attr_value(e, b"rgb"),
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"fill" if in_fills => fills.push(None),
                b"fgColor" if in_fill => current = attr_value(e, b"rgb"),
                _ => {}
            },
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"fill" if in_fill => {
                    fills.push(current.take());
                    in_fill = false;
                }
                b"fills" => break,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    fills
}

/// Collects cell style indices and the protection flag from a worksheet part.
pub(crate) fn parse_sheet_details(sheet_xml: &str) -> SheetDetails {
    let mut details = SheetDetails::default();
    let mut reader = Reader::from_str(sheet_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"c" => {
                    let cell = attr_value(e, b"r").and_then(|r| CellRef::parse_a1(&r));
                    let style = attr_value(e, b"s").and_then(|s| s.parse::<usize>().ok());
                    if let (Some(cell), Some(style)) = (cell, style) {
                        details.styles.push((cell, style));
                    }
                }
                b"sheetProtection" => {
                    details.protected = attr_value(e, b"sheet")
                        .is_none_or(|v| v == "1" || v.eq_ignore_ascii_case("true"));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    details
}

/// Parses a comments part into per-cell notes.
pub(crate) fn parse_comments(comments_xml: &str) -> Vec<(CellRef, Annotation)> {
    let mut notes = Vec::new();
    let mut authors: Vec<String> = Vec::new();
    let mut reader = Reader::from_str(comments_xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut in_author = false;
    let mut in_text = false;
    let mut author_text = String::new();
    let mut current: Option<(CellRef, Option<usize>)> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"author" => {
                    in_author = true;
                    author_text.clear();
                }
                b"comment" => {
                    let cell = attr_value(e, b"ref").and_then(|r| CellRef::parse_a1(&r));
                    let author = attr_value(e, b"authorId").and_then(|a| a.parse().ok());
                    current = cell.map(|cell| (cell, author));
                    text.clear();
                }
                b"t" if current.is_some() => in_text = true,
                _ => {}
            },
            Ok(Event::Text(ref e)) => {
                let chunk = String::from_utf8_lossy(e.as_ref());
                if in_author {
                    author_text.push_str(&chunk);
                } else if in_text {
                    text.push_str(&chunk);
                }
            }
            Ok(Event::GeneralRef(ref e)) => {
                let name = String::from_utf8_lossy(e.as_ref());
                if let Some(c) = resolve_entity(&name) {
                    if in_author {
                        author_text.push(c);
                    } else if in_text {
                        text.push(c);
                    }
                }
            }
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"author" => {
                    authors.push(author_text.clone());
                    in_author = false;
                }
                b"t" => in_text = false,
                b"comment" => {
                    if let Some((cell, author)) = current.take() {
                        let author = author.and_then(|i| authors.get(i).cloned());
                        notes.push((
                            cell,
                            Annotation {
                                text: text.clone(),
                                author,
                            },
                        ));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    notes
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fills count="3">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor rgb="FFD9E1F2"/><bgColor indexed="64"/></patternFill></fill>
  </fills>
  <numFmts count="1">
    <numFmt numFmtId="164" formatCode="&quot;$&quot;#,##0.00"/>
  </numFmts>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="5">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="0" fontId="0" fillId="2" borderId="0" xfId="0" applyFill="1"/>
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0" applyProtection="1"><protection locked="0"/></xf>
    <xf numFmtId="10" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
    <xf numFmtId="164" fontId="0" fillId="2" borderId="0" xfId="0" applyNumberFormat="1"/>
  </cellXfs>
</styleSheet>"#;

    #[test]
    fn cell_styles_resolve_fill_and_lock() {
        let styles = parse_cell_styles(STYLES);
        assert_eq!(styles.len(), 5);
        assert_eq!(styles[0], CellStyle::default());
        assert!(styles[0].is_plain());
        assert_eq!(styles[1].fill.as_deref(), Some("FFD9E1F2"));
        assert!(!styles[1].unlocked);
        assert!(styles[2].unlocked);
    }

    #[test]
    fn cell_styles_resolve_number_formats() {
        let styles = parse_cell_styles(STYLES);
        assert_eq!(styles[1].num_format, None);
        assert_eq!(styles[3].num_format.as_deref(), Some("0.00%"));
        assert_eq!(styles[4].num_format.as_deref(), Some("\"$\"#,##0.00"));
        assert_eq!(styles[4].fill.as_deref(), Some("FFD9E1F2"));
    }

    #[test]
    fn workbook_sheets_and_worksheet_targets() {
        let workbook = r#"<workbook><sheets>
            <sheet name="Sheet1" sheetId="1" r:id="rId1"/>
            <sheet name="KeyData" sheetId="2" state="hidden" r:id="rId2"/>
        </sheets></workbook>"#;
        let rels = r#"<Relationships>
            <Relationship Id="rId1" Type="x/worksheet" Target="worksheets/sheet1.xml"/>
            <Relationship Id="rId2" Type="x/worksheet" Target="/xl/worksheets/sheet2.xml"/>
        </Relationships>"#;

        let sheets = parse_workbook_sheets(workbook);
        assert_eq!(sheets.len(), 2);
        assert!(!sheets[0].hidden);
        assert!(sheets[1].hidden);
        assert_eq!(worksheet_path(rels, "rId1").as_deref(), Some("xl/worksheets/sheet1.xml"));
        assert_eq!(worksheet_path(rels, "rId2").as_deref(), Some("xl/worksheets/sheet2.xml"));
    }

    #[test]
    fn comments_part_is_resolved_relative_to_the_sheet() {
        let rels = r#"<Relationships>
            <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/vmlDrawing" Target="../drawings/vmlDrawing1.vml"/>
            <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments" Target="../comments1.xml"/>
        </Relationships>"#;
        assert_eq!(
            comments_path("xl/worksheets/sheet1.xml", rels).as_deref(),
            Some("xl/comments1.xml")
        );
        assert_eq!(rels_path_for("xl/worksheets/sheet1.xml"), "xl/worksheets/_rels/sheet1.xml.rels");
    }

    #[test]
    fn sheet_details_collect_styles_and_protection() {
        let sheet = r#"<worksheet><sheetData>
            <row r="1"><c r="A1" s="1" t="n"><v>1</v></c><c r="B1"><v>2</v></c></row>
            <row r="2"><c r="A2" s="2"/></row>
        </sheetData><sheetProtection sheet="1" objects="1"/></worksheet>"#;
        let details = parse_sheet_details(sheet);
        assert_eq!(details.styles, vec![(CellRef::new(0, 0), 1), (CellRef::new(1, 0), 2)]);
        assert!(details.protected);
    }

    #[test]
    fn comments_keep_text_and_author() {
        let xml = r#"<comments><authors><author>Dr. Smith</author></authors>
            <commentList>
              <comment ref="B3" authorId="0"><text><r><t xml:space="preserve">Paris,</t></r><r><t xml:space="preserve"> paris &amp; PARIS</t></r></text></comment>
            </commentList></comments>"#;
        let notes = parse_comments(xml);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].0, CellRef::new(2, 1));
        assert_eq!(notes[0].1.text, "Paris, paris & PARIS");
        assert_eq!(notes[0].1.author.as_deref(), Some("Dr. Smith"));
    }
}
