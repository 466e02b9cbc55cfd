//! XLSX extraction adapter via `calamine`.

use std::io::Cursor;

use async_trait::async_trait;
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use tracing::warn;

use lumen_core::{DocumentFormat, Error, ExtractionAdapter, ExtractionResult, Result};

/// Adapter for Excel workbooks.
///
/// Each sheet becomes a block headed by its name; rows are lines with cells
/// separated by tabs. Empty cells and empty rows are dropped.
pub struct XlsxAdapter;

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        other => Some(other.to_string()),
    }
}

fn parse_workbook(data: Vec<u8>) -> Result<ExtractionResult> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))
        .map_err(|e| Error::Extraction(format!("Failed to open workbook: {}", e)))?;

    let sheet_names = workbook.sheet_names();
    let mut blocks = Vec::with_capacity(sheet_names.len());
    let mut row_count = 0usize;

    for name in &sheet_names {
        let range = match workbook.worksheet_range(name) {
            Ok(range) => range,
            Err(e) => {
                warn!(sheet = %name, error = %e, "Skipping unreadable worksheet");
                continue;
            }
        };

        let rows: Vec<String> = range
            .rows()
            .map(|row| row.iter().filter_map(cell_text).collect::<Vec<_>>().join("\t"))
            .filter(|line| !line.is_empty())
            .collect();
        if rows.is_empty() {
            continue;
        }
        row_count += rows.len();
        blocks.push(format!("{}\n{}", name, rows.join("\n")));
    }

    let text = blocks.join("\n\n");
    Ok(ExtractionResult {
        metadata: serde_json::json!({
            "sheets": sheet_names.len(),
            "rows": row_count,
            "char_count": text.chars().count(),
        }),
        text,
    })
}

#[async_trait]
impl ExtractionAdapter for XlsxAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Xlsx
    }

    async fn extract(&self, data: &[u8]) -> Result<ExtractionResult> {
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || parse_workbook(data))
            .await
            .map_err(|e| Error::Extraction(format!("Workbook extraction task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "xlsx"
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::adapters::ooxml::build_zip;

    /// Minimal single-sheet workbook using inline strings.
    pub(crate) fn sample_xlsx() -> Vec<u8> {
        build_zip(&[
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#,
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#,
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Budget" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
            ),
            (
                "xl/worksheets/sheet1.xml",
                r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1"><c r="A1" t="inlineStr"><is><t>Item</t></is></c><c r="B1" t="inlineStr"><is><t>Cost</t></is></c></row><row r="2"><c r="A2" t="inlineStr"><is><t>Telescope</t></is></c><c r="B2"><v>420</v></c></row></sheetData></worksheet>"#,
            ),
        ])
    }
}
