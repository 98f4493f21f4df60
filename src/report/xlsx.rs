//! Minimal SpreadsheetML (.xlsx) writer: one worksheet, inline strings,
//! a fixed style sheet.

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;
use crate::model::AttendanceStatus;
use crate::report::{Cell, CellValue, ReportBuilder, RowStyle, Tone};

pub const MAX_COLUMN_WIDTH: usize = 50;
const COLUMN_PADDING: usize = 2;

const STATUS_COLORS: [(AttendanceStatus, &str); 4] = [
    (AttendanceStatus::Present, "FF15803D"),
    (AttendanceStatus::Absent, "FFB91C1C"),
    (AttendanceStatus::Late, "FFB45309"),
    (AttendanceStatus::Excused, "FF1D4ED8"),
];

// cellXfs indexes in styles.xml.
const XF_TITLE: usize = 1;
const XF_SUBTITLE: usize = 2;
const XF_HEADER: usize = 3;
const XF_DATA: usize = 4;
const XF_DATA_SHADED: usize = 5;
const XF_SUMMARY: usize = 6;
const XF_STATUS_BASE: usize = 7;

#[derive(Debug, Clone, PartialEq)]
enum RowKind {
    Title,
    Subtitle,
    Header,
    Data(RowStyle),
    Blank,
    Summary,
}

#[derive(Debug, Clone)]
struct SheetRow {
    kind: RowKind,
    cells: Vec<Cell>,
}

#[derive(Debug)]
pub struct XlsxReport {
    sheet_name: String,
    rows: Vec<SheetRow>,
    columns: usize,
    summary_started: bool,
}

impl XlsxReport {
    pub fn new(sheet_name: &str) -> Self {
        // Sheet names are limited to 31 characters.
        let sheet_name: String = sheet_name.chars().take(31).collect();
        Self {
            sheet_name,
            rows: Vec::new(),
            columns: 0,
            summary_started: false,
        }
    }

    fn push(&mut self, kind: RowKind, cells: Vec<Cell>) {
        self.columns = self.columns.max(cells.len());
        self.rows.push(SheetRow { kind, cells });
    }

    /// Longest display value per column, ignoring merged title rows.
    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.columns];
        for row in &self.rows {
            if matches!(row.kind, RowKind::Title | RowKind::Subtitle) {
                continue;
            }
            for (i, cell) in row.cells.iter().enumerate() {
                let len = cell.value.display().chars().count();
                widths[i] = widths[i].max(len);
            }
        }
        widths
            .into_iter()
            .map(|w| (w + COLUMN_PADDING).min(MAX_COLUMN_WIDTH))
            .collect()
    }

    fn style_index(kind: &RowKind, tone: Tone) -> usize {
        match kind {
            RowKind::Title => XF_TITLE,
            RowKind::Subtitle => XF_SUBTITLE,
            RowKind::Header => XF_HEADER,
            RowKind::Summary => XF_SUMMARY,
            RowKind::Blank => 0,
            RowKind::Data(style) => match tone {
                Tone::Plain if style.shaded => XF_DATA_SHADED,
                Tone::Plain => XF_DATA,
                Tone::Status(status) => {
                    let pos = STATUS_COLORS
                        .iter()
                        .position(|(s, _)| *s == status)
                        .unwrap_or(0);
                    XF_STATUS_BASE + pos * 2 + usize::from(style.shaded)
                }
            },
        }
    }

    fn sheet_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#,
        );

        let widths = self.column_widths();
        if !widths.is_empty() {
            xml.push_str("<cols>");
            for (i, w) in widths.iter().enumerate() {
                xml.push_str(&format!(
                    r#"<col min="{n}" max="{n}" width="{w}" customWidth="1"/>"#,
                    n = i + 1,
                    w = w
                ));
            }
            xml.push_str("</cols>");
        }

        xml.push_str("<sheetData>");
        let mut merges: Vec<String> = Vec::new();
        for (r, row) in self.rows.iter().enumerate() {
            let rnum = r + 1;
            xml.push_str(&format!(r#"<row r="{}">"#, rnum));
            for (c, cell) in row.cells.iter().enumerate() {
                let cref = format!("{}{}", column_name(c), rnum);
                let s = Self::style_index(&row.kind, cell.tone);
                match &cell.value {
                    CellValue::Text(t) => xml.push_str(&format!(
                        r#"<c r="{}" s="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                        cref,
                        s,
                        escape(t)
                    )),
                    CellValue::Number(n) => {
                        xml.push_str(&format!(r#"<c r="{}" s="{}"><v>{}</v></c>"#, cref, s, n))
                    }
                }
            }
            xml.push_str("</row>");
            if matches!(row.kind, RowKind::Title | RowKind::Subtitle) && self.columns > 1 {
                merges.push(format!(
                    "A{r}:{c}{r}",
                    r = rnum,
                    c = column_name(self.columns - 1)
                ));
            }
        }
        xml.push_str("</sheetData>");

        if !merges.is_empty() {
            xml.push_str(&format!(r#"<mergeCells count="{}">"#, merges.len()));
            for m in &merges {
                xml.push_str(&format!(r#"<mergeCell ref="{}"/>"#, m));
            }
            xml.push_str("</mergeCells>");
        }
        xml.push_str("</worksheet>");
        xml
    }

    fn workbook_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            escape(&self.sheet_name)
        )
    }
}

impl ReportBuilder for XlsxReport {
    fn add_title(&mut self, text: &str) {
        self.push(RowKind::Title, vec![Cell::text(text)]);
    }

    fn add_subtitle(&mut self, text: &str) {
        self.push(RowKind::Subtitle, vec![Cell::text(text)]);
    }

    fn add_header(&mut self, columns: &[&str]) {
        let cells = columns.iter().map(|c| Cell::text(*c)).collect();
        self.push(RowKind::Header, cells);
    }

    fn add_row(&mut self, cells: Vec<Cell>, style: RowStyle) {
        self.push(RowKind::Data(style), cells);
    }

    fn add_summary(&mut self, label: &str, value: i64) {
        if !self.summary_started {
            self.summary_started = true;
            self.push(RowKind::Blank, Vec::new());
        }
        self.push(RowKind::Summary, vec![Cell::text(label), Cell::number(value)]);
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let parts: [(&str, String); 6] = [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", ROOT_RELS.to_string()),
            ("xl/workbook.xml", self.workbook_xml()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
            ("xl/styles.xml", styles_xml()),
            ("xl/worksheets/sheet1.xml", self.sheet_xml()),
        ];
        for (name, body) in parts {
            zip.start_file(name, opts)?;
            zip.write_all(body.as_bytes())?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

/// Zero-based column index to spreadsheet letters (0 → A, 26 → AA).
pub fn column_name(mut idx: usize) -> String {
    let mut out = Vec::new();
    loop {
        out.push(b'A' + (idx % 26) as u8);
        if idx < 26 {
            break;
        }
        idx = idx / 26 - 1;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

fn styles_xml() -> String {
    let border = r#"borderId="1" applyBorder="1""#;
    let mut fonts = String::from(concat!(
        r#"<font><sz val="11"/><name val="Calibri"/></font>"#,
        r#"<font><b/><sz val="14"/><name val="Calibri"/></font>"#,
        r#"<font><i/><sz val="11"/><color rgb="FF595959"/><name val="Calibri"/></font>"#,
        r#"<font><b/><sz val="11"/><color rgb="FFFFFFFF"/><name val="Calibri"/></font>"#,
        r#"<font><b/><sz val="11"/><name val="Calibri"/></font>"#,
    ));
    for (_, rgb) in STATUS_COLORS {
        fonts.push_str(&format!(
            r#"<font><b/><sz val="11"/><color rgb="{}"/><name val="Calibri"/></font>"#,
            rgb
        ));
    }

    let mut xfs = vec![
        r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>"#.to_string(),
        r#"<xf numFmtId="0" fontId="1" fillId="0" borderId="0" applyFont="1"/>"#.to_string(),
        r#"<xf numFmtId="0" fontId="2" fillId="0" borderId="0" applyFont="1"/>"#.to_string(),
        format!(r#"<xf numFmtId="0" fontId="3" fillId="2" {} applyFont="1" applyFill="1"/>"#, border),
        format!(r#"<xf numFmtId="0" fontId="0" fillId="0" {}/>"#, border),
        format!(r#"<xf numFmtId="0" fontId="0" fillId="3" {} applyFill="1"/>"#, border),
        r#"<xf numFmtId="0" fontId="4" fillId="0" borderId="0" applyFont="1"/>"#.to_string(),
    ];
    for i in 0..STATUS_COLORS.len() {
        let font = 5 + i;
        xfs.push(format!(
            r#"<xf numFmtId="0" fontId="{}" fillId="0" {} applyFont="1"/>"#,
            font, border
        ));
        xfs.push(format!(
            r#"<xf numFmtId="0" fontId="{}" fillId="3" {} applyFont="1" applyFill="1"/>"#,
            font, border
        ));
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
            r#"<fonts count="{}">{}</fonts>"#,
            r#"<fills count="4"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill>"#,
            r#"<fill><patternFill patternType="solid"><fgColor rgb="FF4472C4"/><bgColor indexed="64"/></patternFill></fill>"#,
            r#"<fill><patternFill patternType="solid"><fgColor rgb="FFF2F2F2"/><bgColor indexed="64"/></patternFill></fill></fills>"#,
            r#"<borders count="2"><border><left/><right/><top/><bottom/><diagonal/></border>"#,
            r#"<border><left style="thin"><color auto="1"/></left><right style="thin"><color auto="1"/></right>"#,
            r#"<top style="thin"><color auto="1"/></top><bottom style="thin"><color auto="1"/></bottom><diagonal/></border></borders>"#,
            r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
            r#"<cellXfs count="{}">{}</cellXfs>"#,
            r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
            "</styleSheet>"
        ),
        5 + STATUS_COLORS.len(),
        fonts,
        xfs.len(),
        xfs.concat()
    )
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;
