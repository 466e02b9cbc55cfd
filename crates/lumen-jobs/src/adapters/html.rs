//! HTML extraction adapter: strips markup down to visible text.

use std::borrow::Cow;
use std::sync::OnceLock;

use async_trait::async_trait;
use quick_xml::escape::unescape;
use regex::Regex;

use lumen_core::{DocumentFormat, ExtractionAdapter, ExtractionResult, Result};

use super::text_native::decode_utf8_dropping_invalid;

/// Adapter for HTML documents.
///
/// Script, style and comment blocks are removed, block-level closing tags
/// become line breaks, remaining tags are dropped and entities decoded.
pub struct HtmlAdapter;

struct Patterns {
    hidden: Regex,
    block_end: Regex,
    tag: Regex,
    title: Regex,
    spaces: Regex,
    blank_lines: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        hidden: Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<!--.*?-->")
            .expect("valid regex"),
        block_end: Regex::new(r"(?i)</(?:p|div|h[1-6]|li|tr|section|article|title)\s*>|<br\s*/?>")
            .expect("valid regex"),
        tag: Regex::new(r"<[^>]*>").expect("valid regex"),
        title: Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("valid regex"),
        spaces: Regex::new(r"[ \t\r\f]+").expect("valid regex"),
        blank_lines: Regex::new(r"\n\s*\n+").expect("valid regex"),
    })
}

/// Decode character references. Text with a stray `&` is kept as written.
fn decode_entities(text: &str) -> String {
    unescape(text)
        .unwrap_or(Cow::Borrowed(text))
        .replace('\u{a0}', " ")
}

/// Visible text of an HTML document.
pub fn html_to_text(html: &str) -> String {
    let p = patterns();
    let text = p.hidden.replace_all(html, " ");
    let text = p.block_end.replace_all(&text, "\n");
    let text = p.tag.replace_all(&text, " ");
    let text = decode_entities(&text);
    let text = p.spaces.replace_all(&text, " ");
    let text = p.blank_lines.replace_all(&text, "\n");
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ExtractionAdapter for HtmlAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Html
    }

    async fn extract(&self, data: &[u8]) -> Result<ExtractionResult> {
        let html = decode_utf8_dropping_invalid(data);
        let title = patterns()
            .title
            .captures(&html)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(m.as_str().trim()));
        let text = html_to_text(&html);

        Ok(ExtractionResult {
            metadata: serde_json::json!({
                "title": title,
                "char_count": text.chars().count(),
            }),
            text,
        })
    }

    fn name(&self) -> &str {
        "html"
    }
}
