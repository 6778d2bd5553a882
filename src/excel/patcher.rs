//! Workbook patcher - writes numbers into an existing .xlsx package
//!
//! Only the `<c>` elements being changed are rewritten. The target worksheet
//! part is streamed through quick-xml and every other zip entry is copied
//! as raw compressed bytes, so styles, number formats, defined names, merged
//! cells and all other sheets stay exactly as they were.

use crate::error::{PriceEditorError, PriceEditorResult};
use crate::layout::CellRef;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{Cursor, Read, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

/// Cell attributes that describe the old value, not the cell
const VALUE_TYPE_ATTRS: &[&[u8]] = &[b"t", b"cm", b"vm"];

/// A number to store in one cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellPatch {
    pub cell: CellRef,
    pub value: f64,
}

impl CellPatch {
    pub fn new(cell: CellRef, value: f64) -> Self {
        Self { cell, value }
    }
}

/// True when `bytes` is an OOXML spreadsheet package (.xlsx / .xlsm)
pub fn is_xlsx_package(bytes: &[u8]) -> bool {
    let Ok(mut archive) = ZipArchive::new(Cursor::new(bytes)) else {
        return false;
    };
    let found = archive.by_name(WORKBOOK_PART).is_ok();
    found
}

/// Return a copy of the package in `bytes` with `patches` applied to the
/// worksheet named `sheet_name`.
///
/// Patched cells become plain numbers: any formula, shared-string type or
/// inline string they held is dropped, their style index is kept. Missing
/// cells and rows are inserted in order. When a formula is replaced the
/// calculation chain is removed so the spreadsheet app rebuilds it.
pub fn patch_numbers(
    bytes: &[u8],
    sheet_name: &str,
    patches: &[CellPatch],
) -> PriceEditorResult<Vec<u8>> {
    if !is_xlsx_package(bytes) {
        return Err(PriceEditorError::Save(
            "Saving is only supported for .xlsx and .xlsm workbooks".to_string(),
        ));
    }

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(package_error)?;
    let part = worksheet_part(&mut archive, sheet_name)?;
    let sheet_xml = read_part(&mut archive, &part)?;
    let patched = patch_sheet_xml(&sheet_xml, patches)?;

    let options = FileOptions::<()>::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    let drop_calc_chain = patched.removed_formula;

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(package_error)?;
        let name = file.name().to_string();

        if name == part {
            zip.start_file(name, options).map_err(package_error)?;
            zip.write_all(&patched.xml).map_err(package_error)?;
        } else if drop_calc_chain && name == CALC_CHAIN_PART {
            continue;
        } else if drop_calc_chain && (name == WORKBOOK_RELS_PART || name == CONTENT_TYPES_PART)
        {
            let mut xml = Vec::new();
            file.read_to_end(&mut xml).map_err(package_error)?;
            let stripped = strip_calc_chain_refs(&xml)?;
            zip.start_file(name, options).map_err(package_error)?;
            zip.write_all(&stripped).map_err(package_error)?;
        } else {
            zip.raw_copy_file(file).map_err(package_error)?;
        }
    }

    let cursor = zip.finish().map_err(package_error)?;
    debug!(
        sheet = sheet_name,
        part = %part,
        cells = patches.len(),
        dropped_calc_chain = drop_calc_chain,
        "patched worksheet"
    );
    Ok(cursor.into_inner())
}

fn package_error(e: impl fmt::Display) -> PriceEditorError {
    PriceEditorError::Save(format!("Invalid workbook package: {}", e))
}

fn xml_error(e: impl fmt::Display) -> PriceEditorError {
    PriceEditorError::Save(format!("Invalid worksheet XML: {}", e))
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> PriceEditorResult<Vec<u8>> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| PriceEditorError::Save(format!("Missing '{}' in workbook: {}", name, e)))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).map_err(package_error)?;
    Ok(buf)
}

// ─────────────────────────────────────────────────────────────────────────────
// Sheet name → worksheet part
// ─────────────────────────────────────────────────────────────────────────────

fn worksheet_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    sheet_name: &str,
) -> PriceEditorResult<String> {
    let workbook = read_part(archive, WORKBOOK_PART)?;
    let sheets = element_attributes(&workbook, b"sheet")?;
    let rel_id = sheets
        .iter()
        .find(|attrs| attrs.get("name").map(String::as_str) == Some(sheet_name))
        .and_then(|attrs| attrs.get("id"))
        .ok_or_else(|| {
            PriceEditorError::Save(format!("'{}' sheet not found in the package", sheet_name))
        })?;

    let rels = read_part(archive, WORKBOOK_RELS_PART)?;
    let relationships = element_attributes(&rels, b"Relationship")?;
    let target = relationships
        .iter()
        .find(|attrs| attrs.get("Id") == Some(rel_id))
        .and_then(|attrs| attrs.get("Target"))
        .ok_or_else(|| {
            PriceEditorError::Save(format!(
                "No worksheet part for '{}' (relationship {})",
                sheet_name, rel_id
            ))
        })?;

    Ok(resolve_target(target))
}

/// Attributes (keyed by local name) of every element called `local`
fn element_attributes(
    xml: &[u8],
    local: &[u8],
) -> PriceEditorResult<Vec<HashMap<String, String>>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut found = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Eof => break,
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == local => {
                let mut attrs = HashMap::new();
                for attr in e.attributes() {
                    let attr = attr.map_err(xml_error)?;
                    let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
                    let value = attr.unescape_value().map_err(xml_error)?.into_owned();
                    attrs.insert(key, value);
                }
                found.push(attrs);
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(found)
}

/// Relationship targets are relative to `xl/` unless they start with `/`
fn resolve_target(target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    parts.join("/")
}

/// Drop the calcChain relationship and content-type override
fn strip_calc_chain_refs(xml: &[u8]) -> PriceEditorResult<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Eof => break,
            Event::Empty(e) if references_calc_chain(&e) => {}
            Event::Start(e) if references_calc_chain(&e) => {
                let mut skipped = Vec::new();
                reader
                    .read_to_end_into(e.name(), &mut skipped)
                    .map_err(xml_error)?;
            }
            event => writer.write_event(event).map_err(xml_error)?,
        }
        buf.clear();
    }

    Ok(writer.into_inner())
}

fn references_calc_chain(e: &BytesStart) -> bool {
    let local = e.local_name();
    if local.as_ref() != b"Relationship" && local.as_ref() != b"Override" {
        return false;
    }
    e.attributes().filter_map(Result::ok).any(|attr| {
        matches!(attr.key.local_name().as_ref(), b"Target" | b"PartName")
            && attr.value.ends_with(b"calcChain.xml")
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Worksheet XML
// ─────────────────────────────────────────────────────────────────────────────

struct PatchedSheet {
    xml: Vec<u8>,
    removed_formula: bool,
}

/// Patches still to be written into the row currently open
struct OpenRow {
    pending: Vec<CellPatch>,
    next: usize,
    last_col: Option<u16>,
}

impl OpenRow {
    fn remaining(&self) -> &[CellPatch] {
        &self.pending[self.next..]
    }

    fn take_before(&mut self, col: u16) -> &[CellPatch] {
        let start = self.next;
        while self.next < self.pending.len() && self.pending[self.next].cell.col < col {
            self.next += 1;
        }
        &self.pending[start..self.next]
    }

    fn take_at(&mut self, col: u16) -> Option<CellPatch> {
        let patch = *self.pending.get(self.next)?;
        if patch.cell.col != col {
            return None;
        }
        self.next += 1;
        Some(patch)
    }
}

fn patch_sheet_xml(xml: &[u8], patches: &[CellPatch]) -> PriceEditorResult<PatchedSheet> {
    let mut by_row: BTreeMap<u32, Vec<CellPatch>> = BTreeMap::new();
    for patch in patches {
        by_row.entry(patch.cell.row).or_default().push(*patch);
    }
    for row in by_row.values_mut() {
        row.sort_by_key(|p| p.cell.col);
        row.dedup_by_key(|p| p.cell.col);
    }
    let bounds = patch_bounds(patches);

    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut writer = Writer::new(Vec::new());
    let mut buf = Vec::new();

    let mut prefix: Option<String> = None;
    let mut saw_sheet_data = false;
    let mut in_sheet_data = false;
    let mut last_row: Option<u32> = None;
    let mut open_row: Option<OpenRow> = None;
    let mut in_cell = false;
    let mut removed_formula = false;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_error)?;
        match event {
            Event::Eof => break,

            Event::Start(e) if e.local_name().as_ref() == b"dimension" => {
                let widened = widen_dimension(&e, bounds)?;
                write(&mut writer, Event::Start(widened))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"dimension" => {
                let widened = widen_dimension(&e, bounds)?;
                write(&mut writer, Event::Empty(widened))?;
            }

            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                saw_sheet_data = true;
                in_sheet_data = true;
                prefix = name_prefix(&e);
                write(&mut writer, Event::Start(e))?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                saw_sheet_data = true;
                prefix = name_prefix(&e);
                if by_row.is_empty() {
                    write(&mut writer, Event::Empty(e))?;
                } else {
                    let tag = qualified_name(&e);
                    write(&mut writer, Event::Start(e))?;
                    write_rows_before(&mut writer, &mut by_row, u32::MAX, prefix.as_deref())?;
                    write(&mut writer, Event::End(BytesEnd::new(tag)))?;
                }
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"sheetData" => {
                write_rows_before(&mut writer, &mut by_row, u32::MAX, prefix.as_deref())?;
                in_sheet_data = false;
                write(&mut writer, Event::End(e))?;
            }

            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let row = row_number(&e, last_row)?;
                last_row = Some(row);
                write_rows_before(&mut writer, &mut by_row, row, prefix.as_deref())?;
                match by_row.remove(&row) {
                    Some(pending) => {
                        write(&mut writer, Event::Start(copy_without(&e, &[b"spans"])?))?;
                        open_row = Some(OpenRow {
                            pending,
                            next: 0,
                            last_col: None,
                        });
                    }
                    None => write(&mut writer, Event::Start(e))?,
                }
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                let row = row_number(&e, last_row)?;
                last_row = Some(row);
                write_rows_before(&mut writer, &mut by_row, row, prefix.as_deref())?;
                match by_row.remove(&row) {
                    Some(pending) => {
                        let tag = qualified_name(&e);
                        write(&mut writer, Event::Start(copy_without(&e, &[b"spans"])?))?;
                        write_new_cells(&mut writer, &pending, prefix.as_deref())?;
                        write(&mut writer, Event::End(BytesEnd::new(tag)))?;
                    }
                    None => write(&mut writer, Event::Empty(e))?,
                }
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"row" => {
                if let Some(state) = open_row.take() {
                    write_new_cells(&mut writer, state.remaining(), prefix.as_deref())?;
                }
                in_cell = false;
                write(&mut writer, Event::End(e))?;
            }

            Event::Start(e)
                if !in_cell && open_row.is_some() && e.local_name().as_ref() == b"c" =>
            {
                if let Some(state) = open_row.as_mut() {
                    let col = cell_column(&e, state.last_col)?;
                    state.last_col = Some(col);
                    write_new_cells(&mut writer, state.take_before(col), prefix.as_deref())?;
                    match state.take_at(col) {
                        Some(patch) => {
                            let kept = copy_without(&e, VALUE_TYPE_ATTRS)?;
                            write_number_cell(&mut writer, &kept, patch.value)?;
                            removed_formula |= skip_cell_body(&mut reader)?;
                        }
                        None => {
                            in_cell = true;
                            write(&mut writer, Event::Start(e))?;
                        }
                    }
                }
            }
            Event::Empty(e)
                if !in_cell && open_row.is_some() && e.local_name().as_ref() == b"c" =>
            {
                if let Some(state) = open_row.as_mut() {
                    let col = cell_column(&e, state.last_col)?;
                    state.last_col = Some(col);
                    write_new_cells(&mut writer, state.take_before(col), prefix.as_deref())?;
                    match state.take_at(col) {
                        Some(patch) => {
                            let kept = copy_without(&e, VALUE_TYPE_ATTRS)?;
                            write_number_cell(&mut writer, &kept, patch.value)?;
                        }
                        None => write(&mut writer, Event::Empty(e))?,
                    }
                }
            }
            Event::End(e) if in_cell && e.local_name().as_ref() == b"c" => {
                in_cell = false;
                write(&mut writer, Event::End(e))?;
            }

            // Anything after the cells of a row (extLst) goes after the new cells
            Event::Start(e) if !in_cell && open_row.is_some() => {
                flush_open_row(&mut writer, &mut open_row, prefix.as_deref())?;
                write(&mut writer, Event::Start(e))?;
            }
            Event::Empty(e) if !in_cell && open_row.is_some() => {
                flush_open_row(&mut writer, &mut open_row, prefix.as_deref())?;
                write(&mut writer, Event::Empty(e))?;
            }

            event => write(&mut writer, event)?,
        }
        buf.clear();
    }

    if !saw_sheet_data {
        return Err(PriceEditorError::Save(
            "Worksheet has no <sheetData> element".to_string(),
        ));
    }

    Ok(PatchedSheet {
        xml: writer.into_inner(),
        removed_formula,
    })
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event) -> PriceEditorResult<()> {
    writer.write_event(event).map_err(xml_error)
}

fn flush_open_row(
    writer: &mut Writer<Vec<u8>>,
    open_row: &mut Option<OpenRow>,
    prefix: Option<&str>,
) -> PriceEditorResult<()> {
    if let Some(state) = open_row.as_mut() {
        write_new_cells(writer, state.remaining(), prefix)?;
        state.next = state.pending.len();
    }
    Ok(())
}

/// Emit whole new rows for every pending row before `row`
fn write_rows_before(
    writer: &mut Writer<Vec<u8>>,
    by_row: &mut BTreeMap<u32, Vec<CellPatch>>,
    row: u32,
    prefix: Option<&str>,
) -> PriceEditorResult<()> {
    while let Some(entry) = by_row.first_entry() {
        if *entry.key() >= row {
            break;
        }
        let (number, cells) = entry.remove_entry();
        let tag = qualified(prefix, "row");
        let mut start = BytesStart::new(tag.as_str());
        start.push_attribute(("r", (number + 1).to_string().as_str()));
        write(writer, Event::Start(start))?;
        write_new_cells(writer, &cells, prefix)?;
        write(writer, Event::End(BytesEnd::new(tag.as_str())))?;
    }
    Ok(())
}

fn write_new_cells(
    writer: &mut Writer<Vec<u8>>,
    patches: &[CellPatch],
    prefix: Option<&str>,
) -> PriceEditorResult<()> {
    for patch in patches {
        let mut start = BytesStart::new(qualified(prefix, "c"));
        start.push_attribute(("r", patch.cell.a1().as_str()));
        write_number_cell(writer, &start, patch.value)?;
    }
    Ok(())
}

/// `<c ...><v>value</v></c>` using the element name and attributes of `start`
fn write_number_cell(
    writer: &mut Writer<Vec<u8>>,
    start: &BytesStart,
    value: f64,
) -> PriceEditorResult<()> {
    let cell_tag = qualified_name(start);
    let value_tag = qualified(name_prefix(start).as_deref(), "v");
    let text = number_text(value);

    write(writer, Event::Start(start.borrow()))?;
    write(writer, Event::Start(BytesStart::new(value_tag.as_str())))?;
    write(writer, Event::Text(BytesText::new(&text)))?;
    write(writer, Event::End(BytesEnd::new(value_tag.as_str())))?;
    write(writer, Event::End(BytesEnd::new(cell_tag)))
}

/// Consume a replaced cell's children; true when one of them was a formula
fn skip_cell_body(reader: &mut Reader<&[u8]>) -> PriceEditorResult<bool> {
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut had_formula = false;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) => {
                had_formula |= e.local_name().as_ref() == b"f";
                depth += 1;
            }
            Event::Empty(e) => had_formula |= e.local_name().as_ref() == b"f",
            Event::End(_) if depth == 0 => return Ok(had_formula),
            Event::End(_) => depth -= 1,
            Event::Eof => {
                return Err(PriceEditorError::Save(
                    "Worksheet XML ends inside a cell".to_string(),
                ))
            }
            _ => {}
        }
        buf.clear();
    }
}

/// Copy of `e` with the named attributes left out
fn copy_without(e: &BytesStart, dropped: &[&[u8]]) -> PriceEditorResult<BytesStart<'static>> {
    let mut copy = BytesStart::new(qualified_name(e));
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        if dropped.contains(&attr.key.as_ref()) {
            continue;
        }
        copy.push_attribute(attr);
    }
    Ok(copy)
}

fn widen_dimension(
    e: &BytesStart,
    bounds: Option<(CellRef, CellRef)>,
) -> PriceEditorResult<BytesStart<'static>> {
    let mut copy = BytesStart::new(qualified_name(e));
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        match (attr.key.as_ref(), bounds) {
            (b"ref", Some(bounds)) => {
                let current = attr.unescape_value().map_err(xml_error)?;
                copy.push_attribute(("ref", widened_range(&current, bounds).as_str()));
            }
            _ => copy.push_attribute(attr),
        }
    }
    Ok(copy)
}

fn widened_range(current: &str, (low, high): (CellRef, CellRef)) -> String {
    let mut ends = current.split(':').map(str::parse::<CellRef>);
    let (start, end) = match (ends.next(), ends.next(), ends.next()) {
        (Some(Ok(start)), Some(Ok(end)), None) => (start, end),
        (Some(Ok(single)), None, None) => (single, single),
        _ => return current.to_string(),
    };

    let min = CellRef::new(start.row.min(low.row), start.col.min(low.col));
    let max = CellRef::new(end.row.max(high.row), end.col.max(high.col));
    if min == max {
        min.a1()
    } else {
        format!("{}:{}", min, max)
    }
}

fn patch_bounds(patches: &[CellPatch]) -> Option<(CellRef, CellRef)> {
    let first = patches.first()?.cell;
    let (mut min, mut max) = (first, first);
    for patch in patches {
        min.row = min.row.min(patch.cell.row);
        min.col = min.col.min(patch.cell.col);
        max.row = max.row.max(patch.cell.row);
        max.col = max.col.max(patch.cell.col);
    }
    Some((min, max))
}

/// Zero-based row of a `<row>`; rows without `r` follow the previous one
fn row_number(e: &BytesStart, last_row: Option<u32>) -> PriceEditorResult<u32> {
    match attribute(e, b"r")? {
        Some(r) => r
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .map(|n| n - 1)
            .ok_or_else(|| PriceEditorError::Save(format!("Invalid row number '{}'", r))),
        None => Ok(last_row.map_or(0, |r| r + 1)),
    }
}

/// Zero-based column of a `<c>`; cells without `r` follow the previous one
fn cell_column(e: &BytesStart, last_col: Option<u16>) -> PriceEditorResult<u16> {
    match attribute(e, b"r")? {
        Some(r) => r
            .parse::<CellRef>()
            .map(|cell| cell.col)
            .map_err(|_| PriceEditorError::Save(format!("Invalid cell reference '{}'", r))),
        None => Ok(last_col.map_or(0, |c| c + 1)),
    }
}

fn attribute(e: &BytesStart, key: &[u8]) -> PriceEditorResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

fn qualified_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn name_prefix(e: &BytesStart) -> Option<String> {
    e.name()
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned())
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

/// Shortest text that reads back as the same f64
fn number_text(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patch(addr: &str, value: f64) -> CellPatch {
        CellPatch::new(addr.parse().unwrap(), value)
    }

    fn patched(xml: &str, patches: &[CellPatch]) -> (String, bool) {
        let result = patch_sheet_xml(xml.as_bytes(), patches).unwrap();
        (String::from_utf8(result.xml).unwrap(), result.removed_formula)
    }

    #[test]
    fn test_replaces_value_and_keeps_style() {
        let xml = r#"<worksheet><sheetData><row r="4" spans="3:4"><c r="C4" t="s"><v>0</v></c><c r="D4" s="3" t="str"><f>B4*2</f><v>8</v></c></row></sheetData></worksheet>"#;
        let (out, removed) = patched(xml, &[patch("D4", 12.5)]);

        assert_eq!(
            out,
            r#"<worksheet><sheetData><row r="4"><c r="C4" t="s"><v>0</v></c><c r="D4" s="3"><v>12.5</v></c></row></sheetData></worksheet>"#
        );
        assert!(removed);
    }

    #[test]
    fn test_inserts_missing_cells_and_rows() {
        let xml = r#"<worksheet><sheetData><row r="4"><c r="C4"><v>1</v></c><c r="F4"><v>2</v></c></row><row r="9"><c r="A9"><v>3</v></c></row></sheetData></worksheet>"#;
        let (out, removed) = patched(
            xml,
            &[patch("D4", 10.0), patch("D5", 20.0), patch("D12", -0.5)],
        );

        assert_eq!(
            out,
            concat!(
                r#"<worksheet><sheetData>"#,
                r#"<row r="4"><c r="C4"><v>1</v></c><c r="D4"><v>10</v></c><c r="F4"><v>2</v></c></row>"#,
                r#"<row r="5"><c r="D5"><v>20</v></c></row>"#,
                r#"<row r="9"><c r="A9"><v>3</v></c></row>"#,
                r#"<row r="12"><c r="D12"><v>-0.5</v></c></row>"#,
                r#"</sheetData></worksheet>"#
            )
        );
        assert!(!removed);
    }

    #[test]
    fn test_expands_empty_sheet_data() {
        let xml = r#"<worksheet><dimension ref="A1"/><sheetData/></worksheet>"#;
        let (out, _) = patched(xml, &[patch("D4", 1.0), patch("D5", 2.0)]);

        assert_eq!(
            out,
            r#"<worksheet><dimension ref="A1:D5"/><sheetData><row r="4"><c r="D4"><v>1</v></c></row><row r="5"><c r="D5"><v>2</v></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_leaves_other_cells_untouched() {
        let xml = r#"<worksheet><sheetData><row r="4"><c r="D4"><v>1</v></c><c r="E4" t="e"><v>#DIV/0!</v></c><c r="F4" s="2"><v>45306</v></c></row></sheetData></worksheet>"#;
        let (out, _) = patched(xml, &[patch("D4", 7.0)]);

        assert_eq!(
            out,
            r#"<worksheet><sheetData><row r="4"><c r="D4"><v>7</v></c><c r="E4" t="e"><v>#DIV/0!</v></c><c r="F4" s="2"><v>45306</v></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_cells_without_references() {
        let xml = r#"<worksheet><sheetData><row><c><v>1</v></c></row><row><c/><c/><c/><c t="inlineStr"><is><t>x</t></is></c></row></sheetData></worksheet>"#;
        let (out, _) = patched(xml, &[patch("D2", 4.0)]);

        assert_eq!(
            out,
            r#"<worksheet><sheetData><row><c><v>1</v></c></row><row><c/><c/><c/><c><v>4</v></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_keeps_namespace_prefix() {
        let xml = r#"<x:worksheet xmlns:x="urn:x"><x:sheetData><x:row r="1"><x:c r="A1"><x:v>1</x:v></x:c></x:row></x:sheetData></x:worksheet>"#;
        let (out, _) = patched(xml, &[patch("B1", 2.0), patch("A3", 3.0)]);

        assert_eq!(
            out,
            r#"<x:worksheet xmlns:x="urn:x"><x:sheetData><x:row r="1"><x:c r="A1"><x:v>1</x:v></x:c><x:c r="B1"><x:v>2</x:v></x:c></x:row><x:row r="3"><x:c r="A3"><x:v>3</x:v></x:c></x:row></x:sheetData></x:worksheet>"#
        );
    }

    #[test]
    fn test_missing_sheet_data_is_save_error() {
        let result = patch_sheet_xml(b"<worksheet/>", &[patch("D4", 1.0)]);
        assert!(matches!(result, Err(PriceEditorError::Save(_))));
    }

    #[test]
    fn test_widened_range() {
        let d4_d7 = (CellRef::new(3, 3), CellRef::new(6, 3));
        assert_eq!(widened_range("A1:C3", d4_d7), "A1:D7");
        assert_eq!(widened_range("A1:Z100", d4_d7), "A1:Z100");
        assert_eq!(widened_range("D4", (CellRef::new(3, 3), CellRef::new(3, 3))), "D4");
        assert_eq!(widened_range("garbage", d4_d7), "garbage");
    }

    #[test]
    fn test_resolve_target() {
        assert_eq!(resolve_target("worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("/xl/worksheets/sheet2.xml"), "xl/worksheets/sheet2.xml");
        assert_eq!(resolve_target("../xl/worksheets/./sheet3.xml"), "xl/worksheets/sheet3.xml");
    }

    #[test]
    fn test_strip_calc_chain_refs() {
        let rels = r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/><Relationship Id="rId9" Target="calcChain.xml"/></Relationships>"#;
        let out = strip_calc_chain_refs(rels.as_bytes()).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            r#"<Relationships><Relationship Id="rId1" Target="worksheets/sheet1.xml"/></Relationships>"#
        );
    }

    #[test]
    fn test_number_text() {
        assert_eq!(number_text(-0.0), "0");
        assert_eq!(number_text(20.0), "20");
        assert_eq!(number_text(0.1 + 0.2), "0.30000000000000004");
    }

    #[test]
    fn test_non_package_is_save_error() {
        assert!(!is_xlsx_package(b"not a zip"));
        match patch_numbers(b"not a zip", "Prices", &[patch("D4", 1.0)]) {
            Err(PriceEditorError::Save(msg)) => assert!(msg.contains(".xlsx")),
            other => panic!("expected save error, got {:?}", other),
        }
    }
}
