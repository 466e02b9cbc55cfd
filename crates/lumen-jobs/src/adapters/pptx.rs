//! PPTX extraction adapter.

use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::Reader;

use lumen_core::{defaults, DocumentFormat, Error, ExtractionAdapter, ExtractionResult, Result};

use super::ooxml::{open_checked, read_entry};

/// Adapter for PowerPoint decks: text of each slide in slide order.
pub struct PptxAdapter;

/// Slide number of a `ppt/slides/slideN.xml` member.
fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix("ppt/slides/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// Text runs (`a:t`) of a slide, one line per paragraph (`a:p`).
fn slide_text(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut in_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_run = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_run = false,
                b"p" => {
                    if !line.trim().is_empty() {
                        lines.push(std::mem::take(&mut line));
                    }
                    line.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_run => {
                let text = t
                    .unescape()
                    .map_err(|e| Error::Extraction(format!("Bad slide text: {}", e)))?;
                line.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Extraction(format!("Malformed slide XML: {}", e))),
            _ => {}
        }
    }
    if !line.trim().is_empty() {
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

fn parse_deck(data: Vec<u8>) -> Result<ExtractionResult> {
    let mut archive = open_checked(&data)?;
    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort_by_key(|(n, _)| *n);

    let mut sections = Vec::with_capacity(slides.len());
    for (_, name) in &slides {
        let xml = read_entry(&mut archive, name, defaults::MAX_ARCHIVE_ENTRY_BYTES)?;
        let text = slide_text(&xml)?;
        if !text.is_empty() {
            sections.push(text);
        }
    }
    let text = sections.join("\n\n");

    Ok(ExtractionResult {
        metadata: serde_json::json!({
            "slides": slides.len(),
            "char_count": text.chars().count(),
        }),
        text,
    })
}

#[async_trait]
impl ExtractionAdapter for PptxAdapter {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pptx
    }

    async fn extract(&self, data: &[u8]) -> Result<ExtractionResult> {
        let data = data.to_vec();
        tokio::task::spawn_blocking(move || parse_deck(data))
            .await
            .map_err(|e| Error::Extraction(format!("Slide extraction task failed: {}", e)))?
    }

    fn name(&self) -> &str {
        "pptx"
    }
}
