use crate::reader::{DocumentDecoder, DocumentInfo, DocumentKind};
use anyhow::{Context, Result};
use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Kerning inside a `TJ` array, in thousandths of an em, wide enough to be
/// read as a word gap.
const KERN_WORD_GAP: f32 = 100.0;

/// An opened PDF whose units are its pages, visited from page 1 upwards.
pub struct PdfDocument {
    doc: Document,
    /// Page numbers and page objects in increasing page order.
    pages: Vec<(u32, ObjectId)>,
}

impl PdfDocument {
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).context("Failed to parse PDF")?;
        // get_pages is keyed by page number, so iteration order is reading order
        let pages = doc.get_pages().into_iter().collect();
        Ok(Self { doc, pages })
    }

    fn info_string(&self, key: &[u8]) -> Option<String> {
        let info = self.doc.trailer.get(b"Info").ok()?;
        let info = match info {
            Object::Reference(id) => self.doc.get_dictionary(*id).ok()?,
            Object::Dictionary(dict) => dict,
            _ => return None,
        };
        match info.get(key).ok()? {
            Object::String(bytes, _) => {
                let value = String::from_utf8_lossy(bytes).trim().to_string();
                (!value.is_empty()).then_some(value)
            }
            _ => None,
        }
    }

    /// Walk the page's content stream and collect every shown string.
    ///
    /// Each show operation becomes its own item and items are joined with
    /// spaces, so positioned fragments never run together. Wide negative
    /// kerning inside a `TJ` array also counts as a gap.
    fn page_text(&self, page_id: ObjectId) -> Result<String> {
        let encodings: BTreeMap<Vec<u8>, _> = self
            .doc
            .get_page_fonts(page_id)?
            .into_iter()
            .filter_map(|(name, font)| match font.get_font_encoding(&self.doc) {
                Ok(encoding) => Some((name, encoding)),
                Err(err) => {
                    log::debug!(
                        "no encoding for font {}: {err}",
                        String::from_utf8_lossy(&name)
                    );
                    None
                }
            })
            .collect();
        let content = Content::decode(&self.doc.get_page_content(page_id)?)?;

        let mut current = None;
        let mut items = Vec::new();
        for op in &content.operations {
            let shown: Vec<&Object> = match op.operator.as_str() {
                "Tf" => {
                    current = op
                        .operands
                        .first()
                        .and_then(|name| name.as_name().ok())
                        .and_then(|name| encodings.get(name));
                    continue;
                }
                "Tj" | "'" => op.operands.first().into_iter().collect(),
                "\"" => op.operands.get(2).into_iter().collect(),
                "TJ" => match op.operands.first() {
                    Some(Object::Array(parts)) => parts.iter().collect(),
                    _ => continue,
                },
                _ => continue,
            };

            let mut item = String::new();
            for part in shown {
                match part {
                    Object::String(bytes, _) => match current {
                        Some(encoding) => item.push_str(&Document::decode_text(encoding, bytes)?),
                        None => item.push_str(&String::from_utf8_lossy(bytes)),
                    },
                    other => {
                        if other.as_float().is_ok_and(|kern| kern < -KERN_WORD_GAP) {
                            item.push(' ');
                        }
                    }
                }
            }
            if !item.trim().is_empty() {
                items.push(item);
            }
        }
        Ok(items.join(" "))
    }
}

impl DocumentDecoder for PdfDocument {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pdf
    }

    fn unit_count(&self) -> usize {
        self.pages.len()
    }

    fn decode_unit(&mut self, index: usize) -> Result<String> {
        let (page, page_id) = *self
            .pages
            .get(index)
            .with_context(|| format!("PDF has no page at index {index}"))?;
        self.page_text(page_id)
            .with_context(|| format!("Failed to extract text from page {page}"))
    }

    fn info(&self) -> DocumentInfo {
        DocumentInfo {
            title: self.info_string(b"Title"),
            authors: self.info_string(b"Author").into_iter().collect(),
        }
    }
}
