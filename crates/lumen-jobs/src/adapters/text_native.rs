//! TextNative extraction adapter: best-effort UTF-8 decoding.

use async_trait::async_trait;

use lumen_core::{DocumentFormat, ExtractionAdapter, ExtractionResult, Result};

/// Adapter for plain text and for any content no other adapter recognizes.
///
/// Bytes are decoded as UTF-8; invalid sequences are dropped rather than
/// replaced.
pub struct TextNativeAdapter;

/// Decode UTF-8, skipping undecodable bytes.
pub fn decode_utf8_dropping_invalid(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(data)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER)
            .collect(),
    }
}

#[async_trait]
impl ExtractionAdapter for TextNativeAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::PlainText
    }

    async fn extract(&self, data: &[u8]) -> Result<ExtractionResult> {
        let text = decode_utf8_dropping_invalid(data);
        let char_count = text.chars().count();
        let line_count = text.lines().count();

        Ok(ExtractionResult {
            text,
            metadata: serde_json::json!({
                "char_count": char_count,
                "line_count": line_count,
            }),
        })
    }

    fn name(&self) -> &str {
        "text_native"
    }
}
