//! PdfText extraction adapter: text layer of a PDF via `lopdf`.

use async_trait::async_trait;
use lopdf::Document;
use tracing::{debug, warn};

use lumen_core::{DocumentFormat, Error, ExtractionAdapter, ExtractionResult, Result};

/// Adapter for extracting the embedded text layer of PDF files.
///
/// Pages are extracted one at a time so a page with an unsupported font
/// encoding is skipped instead of failing the document. Scanned PDFs with
/// no text layer yield empty text and `metadata["needs_ocr"] = true`.
pub struct PdfTextAdapter;

fn parse_pdf(data: &[u8]) -> Result<ExtractionResult> {
    if data.len() < 4 || &data[0..4] != b"%PDF" {
        return Err(Error::Extraction(
            "Not a valid PDF (missing %PDF header)".to_string(),
        ));
    }

    let doc = Document::load_mem(data)
        .map_err(|e| Error::Extraction(format!("Failed to parse PDF: {}", e)))?;

    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    let mut text = String::new();
    let mut failed_pages = 0usize;

    for page in &pages {
        match doc.extract_text(&[*page]) {
            Ok(page_text) => {
                let page_text = page_text.trim();
                if !page_text.is_empty() {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(page_text);
                }
            }
            Err(e) => {
                failed_pages += 1;
                debug!(page, error = %e, "Skipping unreadable PDF page");
            }
        }
    }

    if failed_pages > 0 {
        warn!(
            failed_pages,
            page_count = pages.len(),
            "Some PDF pages could not be extracted"
        );
    }

    let needs_ocr = text.trim().len() < 10;
    Ok(ExtractionResult {
        metadata: serde_json::json!({
            "pages": pages.len(),
            "failed_pages": failed_pages,
            "needs_ocr": needs_ocr,
            "char_count": text.chars().count(),
        }),
        text,
    })
}

#[async_trait]
impl ExtractionAdapter for PdfTextAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    async fn extract(&self, data: &[u8]) -> Result<ExtractionResult> {
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || parse_pdf(&data))
            .await
            .map_err(|e| Error::Extraction(format!("PDF extraction task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}
