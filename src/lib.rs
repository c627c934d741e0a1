//! Core of a rapid serial visual presentation reader.
//!
//! Documents (PDF or EPUB) are decoded unit by unit into plain text, split
//! into word tokens, and presented one token at a time by a drift-corrected
//! pace engine. The reading position, pace, and a short history of documents
//! survive restarts through a small key-value store.

pub mod config;
pub mod epub_reader;
pub mod error;
pub mod extractor;
pub mod history;
pub mod markup;
pub mod pace;
pub mod pdf_reader;
pub mod position;
pub mod reader;
pub mod session;
pub mod storage;
pub mod tokenizer;

pub use config::ReaderConfig;
pub use error::{ConfigError, ExtractionError, StorageError};
pub use extractor::{extract, ExtractOptions, Extraction, ExtractionProgress, ExtractionSummary};
pub use history::{HistoryLedger, ReadingRecord};
pub use pace::{Clock, MonotonicClock, PaceEngine, Scheduler, TickHandle, TickOutcome, TimerQueue};
pub use position::{PlaybackState, ReadingPosition, TokenSequence};
pub use reader::{DocumentDecoder, DocumentInfo, DocumentKind};
pub use session::{LoadReport, ReaderSession};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
