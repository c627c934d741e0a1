//! The reader's explicit state container.
//!
//! A [`ReaderSession`] owns everything about the currently loaded document:
//! its tokens and position, the pace engine, and the reading history. Every
//! state change goes through one of its operations; the surrounding UI only
//! drives it and renders what it exposes.

use crate::config::ReaderConfig;
use crate::error::ExtractionError;
use crate::extractor::{ExtractOptions, Extraction, ExtractionProgress, ExtractionSummary};
use crate::history::{HistoryLedger, ReadingRecord};
use crate::pace::{Clock, PaceEngine, Scheduler, TickHandle, TickOutcome};
use crate::position::{PlaybackState, ReadingPosition, TokenSequence};
use crate::reader::{self, DocumentDecoder, DocumentInfo, DocumentKind};
use crate::storage::{self, KeyValueStore, KEY_CURRENT_DOCUMENT};
use crate::tokenizer;
use chrono::Utc;
use std::ops::Range;
use std::rc::Rc;

/// What a completed load produced.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub document_name: String,
    pub info: DocumentInfo,
    pub summary: ExtractionSummary,
    pub token_count: usize,
    pub restored_index: usize,
}

impl LoadReport {
    /// Extraction succeeded but found nothing to read.
    pub fn is_empty(&self) -> bool {
        self.token_count == 0
    }

    /// Some units failed to decode and were left out.
    pub fn is_degraded(&self) -> bool {
        self.summary.is_degraded()
    }
}

pub struct ReaderSession<S: Scheduler, C: Clock> {
    position: ReadingPosition,
    engine: PaceEngine,
    ledger: HistoryLedger,
    scheduler: S,
    clock: C,
    store: Rc<dyn KeyValueStore>,
    document: Option<String>,
    /// Position left behind by the previous process, usable once.
    resume: Option<(String, usize)>,
    extract_options: ExtractOptions,
    max_document_bytes: u64,
    preview_half_window: usize,
}

impl<S: Scheduler, C: Clock> ReaderSession<S, C> {
    pub fn new(store: Rc<dyn KeyValueStore>, scheduler: S, clock: C, config: &ReaderConfig) -> Self {
        let position = ReadingPosition::new(store.clone(), config.playback.default_pace);
        let ledger = HistoryLedger::load(store.clone(), config.history.capacity);
        let resume = storage::read_or_warn(store.as_ref(), KEY_CURRENT_DOCUMENT)
            .filter(|name| !name.is_empty())
            .zip(position.persisted_index());

        Self {
            position,
            engine: PaceEngine::new(),
            ledger,
            scheduler,
            clock,
            store,
            document: None,
            resume,
            extract_options: config.extraction.options(),
            max_document_bytes: config.extraction.max_document_bytes,
            preview_half_window: config.preview.half_window,
        }
    }

    /// Replace the current document with the one in `bytes`.
    ///
    /// Playback stops and the previous tokens are discarded before extraction
    /// starts. Only a container that cannot be opened at all, or one that
    /// exceeds the skip threshold, is an error.
    pub fn load_document(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
        kind: DocumentKind,
        on_progress: impl FnMut(ExtractionProgress),
    ) -> Result<LoadReport, ExtractionError> {
        self.unload();
        reader::check_document_size(bytes.len() as u64, self.max_document_bytes)?;
        let decoder = reader::open_decoder(bytes, kind)?;
        self.load_from_decoder(name, decoder, on_progress)
    }

    /// Load from an already opened decoder.
    pub fn load_from_decoder(
        &mut self,
        name: &str,
        decoder: Box<dyn DocumentDecoder>,
        on_progress: impl FnMut(ExtractionProgress),
    ) -> Result<LoadReport, ExtractionError> {
        self.unload();

        let mut extraction = Extraction::new(decoder, self.extract_options).on_progress(on_progress);
        let mut builder = TokenSequence::builder();
        for unit in extraction.by_ref() {
            builder.push_unit(tokenizer::tokenize_block(&unit?.text));
        }
        let summary = extraction.summary();
        let info = extraction.info().clone();
        drop(extraction);

        let sequence = builder.build();
        let restore = self.restore_index_for(name);
        self.position.load(sequence, restore);
        self.document = Some(name.to_string());
        storage::write_or_warn(self.store.as_ref(), KEY_CURRENT_DOCUMENT, name);

        if !self.position.is_empty() {
            self.save_record();
        }

        let report = LoadReport {
            document_name: name.to_string(),
            info,
            summary,
            token_count: self.position.len(),
            restored_index: self.position.current_index(),
        };
        log::info!(
            "loaded {name}: {} tokens from {}/{} units ({} skipped), resuming at {}",
            report.token_count,
            summary.units_processed - summary.units_skipped,
            summary.total_units,
            summary.units_skipped,
            report.restored_index
        );
        Ok(report)
    }

    pub fn play(&mut self) {
        let now = self.clock.now_ms();
        self.engine
            .play(&mut self.position, &mut self.scheduler, now);
    }

    pub fn pause(&mut self) {
        self.engine.pause(&mut self.position, &mut self.scheduler);
        self.save_record();
    }

    pub fn reset(&mut self) {
        self.halt_then(ReadingPosition::reset);
    }

    pub fn faster(&mut self) {
        let now = self.clock.now_ms();
        self.engine
            .faster(&mut self.position, &mut self.scheduler, now);
    }

    pub fn slower(&mut self) {
        let now = self.clock.now_ms();
        self.engine
            .slower(&mut self.position, &mut self.scheduler, now);
    }

    pub fn set_pace(&mut self, pace: u32) {
        let now = self.clock.now_ms();
        self.engine
            .change_pace(pace, &mut self.position, &mut self.scheduler, now);
    }

    pub fn seek_token(&mut self, index: usize) {
        self.halt_then(|position| position.seek_token(index));
    }

    pub fn seek_unit(&mut self, unit: usize) {
        self.halt_then(|position| position.seek_unit(unit));
    }

    pub fn step_forward(&mut self) {
        self.halt_then(ReadingPosition::step_forward);
    }

    pub fn step_back(&mut self) {
        self.halt_then(ReadingPosition::step_back);
    }

    /// Deliver a tick that the event loop's scheduler fired.
    pub fn on_tick(&mut self, handle: TickHandle) -> TickOutcome {
        let now = self.clock.now_ms();
        let outcome = self
            .engine
            .tick(handle, now, &mut self.position, &mut self.scheduler);
        if outcome == TickOutcome::Finished {
            self.save_record();
        }
        outcome
    }

    pub fn current_unit(&self) -> usize {
        self.position.current_unit()
    }

    pub fn total_units(&self) -> usize {
        self.position.total_units()
    }

    pub fn current_token(&self) -> Option<&str> {
        self.position.current_token()
    }

    pub fn state(&self) -> PlaybackState {
        self.position.state()
    }

    pub fn position(&self) -> &ReadingPosition {
        &self.position
    }

    pub fn document_name(&self) -> Option<&str> {
        self.document.as_deref()
    }

    /// Tokens surrounding the current one, with the index of the first.
    pub fn context(&self) -> (usize, &[String]) {
        let Range { start, end } = self.position.context_range(self.preview_half_window);
        (start, &self.position.sequence().tokens()[start..end])
    }

    pub fn history_list(&self) -> &[ReadingRecord] {
        self.ledger.list()
    }

    pub fn history_upsert(&mut self, record: ReadingRecord) {
        self.ledger.upsert(record);
    }

    pub fn history_delete(&mut self, document_name: &str) {
        self.ledger.delete(document_name);
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    fn unload(&mut self) {
        self.engine.cancel(&mut self.scheduler);
        self.position.clear();
        self.document = None;
    }

    /// Stop the engine, apply a position change, and record the stopping
    /// point if playback was interrupted.
    fn halt_then(&mut self, change: impl FnOnce(&mut ReadingPosition)) {
        let was_playing = self.position.is_playing();
        self.engine.cancel(&mut self.scheduler);
        change(&mut self.position);
        self.position.set_playing(false);
        if was_playing {
            self.save_record();
        }
    }

    fn restore_index_for(&mut self, name: &str) -> Option<usize> {
        let resume = self.resume.take();
        self.ledger
            .find(name)
            .map(|record| record.last_index)
            .or_else(|| resume.filter(|(doc, _)| doc == name).map(|(_, index)| index))
    }

    fn save_record(&mut self) {
        let Some(name) = self.document.clone() else {
            return;
        };
        if self.position.is_empty() {
            return;
        }
        self.ledger.upsert(ReadingRecord {
            document_name: name,
            token_count: self.position.len(),
            last_index: self.position.current_index(),
            last_access_time: Utc::now(),
            pace_tokens_per_minute: self.position.pace(),
        });
    }
}

impl<S: Scheduler, C: Clock> Drop for ReaderSession<S, C> {
    fn drop(&mut self) {
        self.engine.cancel(&mut self.scheduler);
    }
}
