//! Content-sniffing document extractor.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use lumen_core::{DocumentFormat, ExtractionAdapter, ExtractionResult, Result};

use crate::adapters::{
    zip_has_entry, DocxAdapter, HtmlAdapter, PdfTextAdapter, PptxAdapter, TextNativeAdapter,
    XlsxAdapter,
};

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Classify-then-extract over a registry of format adapters.
///
/// The format is detected from the bytes alone. Anything unrecognized, or a
/// recognized format with no registered adapter, goes through the plain text
/// fallback.
pub struct DocumentExtractor {
    adapters: HashMap<DocumentFormat, Arc<dyn ExtractionAdapter>>,
    fallback: Arc<dyn ExtractionAdapter>,
}

impl DocumentExtractor {
    /// Extractor with no format adapters; everything decodes as text.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            fallback: Arc::new(TextNativeAdapter),
        }
    }

    /// Extractor with every built-in adapter registered.
    pub fn with_default_adapters() -> Self {
        let mut extractor = Self::new();
        extractor.register(Arc::new(PdfTextAdapter));
        extractor.register(Arc::new(DocxAdapter));
        extractor.register(Arc::new(XlsxAdapter));
        extractor.register(Arc::new(PptxAdapter));
        extractor.register(Arc::new(HtmlAdapter));
        extractor.register(Arc::new(TextNativeAdapter));
        extractor
    }

    /// Register an adapter. Replaces any existing adapter for the same format.
    pub fn register(&mut self, adapter: Arc<dyn ExtractionAdapter>) {
        self.adapters.insert(adapter.format(), adapter);
    }

    pub fn has_adapter(&self, format: DocumentFormat) -> bool {
        self.adapters.contains_key(&format)
    }

    /// Detect the document format from content. `None` means unrecognized.
    pub fn detect_format(data: &[u8]) -> Option<DocumentFormat> {
        if let Some(kind) = infer::get(data) {
            match kind.mime_type() {
                "application/pdf" => return Some(DocumentFormat::Pdf),
                DOCX_MIME => return Some(DocumentFormat::Docx),
                XLSX_MIME => return Some(DocumentFormat::Xlsx),
                PPTX_MIME => return Some(DocumentFormat::Pptx),
                "text/html" => return Some(DocumentFormat::Html),
                "application/zip" => return detect_ooxml(data),
                _ => {}
            }
        }
        if data.starts_with(b"%PDF") {
            return Some(DocumentFormat::Pdf);
        }
        if data.starts_with(b"PK\x03\x04") {
            return detect_ooxml(data);
        }
        if looks_like_html(data) {
            return Some(DocumentFormat::Html);
        }
        None
    }

    /// Detect the format and extract text with the matching adapter.
    pub async fn extract(&self, data: &[u8]) -> Result<ExtractionResult> {
        let detected = Self::detect_format(data);
        let adapter = detected
            .and_then(|format| self.adapters.get(&format))
            .unwrap_or(&self.fallback);

        debug!(
            format = detected.map(|f| f.as_str()).unwrap_or("unknown"),
            adapter = adapter.name(),
            bytes = data.len(),
            "Extracting document"
        );
        let result = adapter.extract(data).await?;
        trace!(char_count = result.text.len(), "Extraction complete");
        Ok(result)
    }
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::with_default_adapters()
    }
}

/// Tell DOCX, XLSX and PPTX apart by their main part.
fn detect_ooxml(data: &[u8]) -> Option<DocumentFormat> {
    if zip_has_entry(data, "word/document.xml") {
        Some(DocumentFormat::Docx)
    } else if zip_has_entry(data, "xl/workbook.xml") {
        Some(DocumentFormat::Xlsx)
    } else if zip_has_entry(data, "ppt/presentation.xml") {
        Some(DocumentFormat::Pptx)
    } else {
        None
    }
}

fn looks_like_html(data: &[u8]) -> bool {
    let head = &data[..data.len().min(1024)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    let head = head.trim_start_matches('\u{feff}').trim_start();
    head.starts_with("<!doctype html")
        || head.starts_with("<html")
        || (head.starts_with('<') && (head.contains("<body") || head.contains("<head")))
}
