//! DOCX extraction adapter via `docx-rust`.

use std::io::Cursor;

use async_trait::async_trait;
use docx_rust::DocxFile;

use lumen_core::{DocumentFormat, Error, ExtractionAdapter, ExtractionResult, Result};

use super::ooxml::open_checked;

/// Adapter for Word documents: body text, one line per paragraph.
pub struct DocxAdapter;

fn parse_document(data: Vec<u8>) -> Result<ExtractionResult> {
    open_checked(&data)?;

    let file = DocxFile::from_reader(Cursor::new(data))
        .map_err(|e| Error::Extraction(format!("Failed to open document: {}", e)))?;
    let docx = file
        .parse()
        .map_err(|e| Error::Extraction(format!("Failed to parse document: {}", e)))?;

    let text = docx
        .document
        .body
        .text()
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ExtractionResult {
        metadata: serde_json::json!({
            "paragraphs": text.lines().count(),
            "char_count": text.chars().count(),
        }),
        text,
    })
}

#[async_trait]
impl ExtractionAdapter for DocxAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    async fn extract(&self, data: &[u8]) -> Result<ExtractionResult> {
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || parse_document(data))
            .await
            .map_err(|e| Error::Extraction(format!("Document extraction task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "docx"
    }
}
