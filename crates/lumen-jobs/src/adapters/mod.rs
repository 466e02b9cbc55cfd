//! Extraction adapter implementations.

pub mod docx;
pub mod html;
mod ooxml;
pub mod pdf_text;
pub mod pptx;
pub mod text_native;
pub mod xlsx;

pub use docx::DocxAdapter;
pub use html::HtmlAdapter;
pub use pdf_text::PdfTextAdapter;
pub use pptx::PptxAdapter;
pub use text_native::TextNativeAdapter;
pub use xlsx::XlsxAdapter;

pub(crate) use ooxml::has_entry as zip_has_entry;
#[cfg(test)]
pub(crate) use ooxml::build_zip;
