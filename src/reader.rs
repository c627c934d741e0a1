use crate::epub_reader::EpubDocument;
use crate::error::ExtractionError;
use crate::pdf_reader::PdfDocument;
use anyhow::Result;
use std::fmt;
use std::path::Path;

/// Documents larger than this are rejected before extraction starts.
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 100 * 1024 * 1024;

/// How far into a PDF the `%PDF-` header may appear.
const PDF_HEADER_WINDOW: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    Epub,
}

impl DocumentKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "epub" => Some(Self::Epub),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ExtractionError> {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::from_extension(&ext).ok_or(ExtractionError::Unsupported(ext))
    }

    /// Cheap magic-number check so a mislabelled file fails before decoding.
    pub fn sniff(self, bytes: &[u8]) -> bool {
        match self {
            Self::Pdf => {
                let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
                window.windows(5).any(|w| w == b"%PDF-")
            }
            Self::Epub => bytes.starts_with(b"PK\x03\x04"),
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pdf => f.write_str("pdf"),
            Self::Epub => f.write_str("epub"),
        }
    }
}

/// Descriptive metadata, when the container carries any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub authors: Vec<String>,
}

/// Access to the structural units of one opened document container.
///
/// Units (PDF pages, EPUB spine chapters) are discovered when the container is
/// opened, so `unit_count` is known before the first unit is decoded.
pub trait DocumentDecoder {
    fn kind(&self) -> DocumentKind;

    fn unit_count(&self) -> usize;

    /// Raw text of the 0-indexed unit. Errors here are per-unit failures.
    fn decode_unit(&mut self, index: usize) -> Result<String>;

    fn info(&self) -> DocumentInfo {
        DocumentInfo::default()
    }
}

/// Open a container with the decoder for its kind.
pub fn open_decoder(
    bytes: Vec<u8>,
    kind: DocumentKind,
) -> Result<Box<dyn DocumentDecoder>, ExtractionError> {
    if !kind.sniff(&bytes) {
        return Err(ExtractionError::KindMismatch { expected: kind });
    }

    let opened: Result<Box<dyn DocumentDecoder>> = match kind {
        DocumentKind::Pdf => PdfDocument::open(&bytes).map(|doc| Box::new(doc) as Box<_>),
        DocumentKind::Epub => EpubDocument::open(bytes).map(|doc| Box::new(doc) as Box<_>),
    };

    opened.map_err(|err| ExtractionError::Open {
        kind,
        message: format!("{err:#}"),
    })
}

pub fn check_document_size(size: u64, limit: u64) -> Result<(), ExtractionError> {
    if size > limit {
        return Err(ExtractionError::TooLarge { size, limit });
    }
    Ok(())
}
