use crate::error::ExtractionError;
use crate::reader::{self, DocumentDecoder, DocumentInfo, DocumentKind};

/// Progress after one more unit has been processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionProgress {
    pub units_processed: usize,
    pub total_units: usize,
    /// 0-100
    pub percent: u8,
}

impl ExtractionProgress {
    fn new(units_processed: usize, total_units: usize) -> Self {
        let percent = if total_units == 0 {
            100
        } else {
            (units_processed as f64 / total_units as f64 * 100.0).round() as u8
        };
        Self {
            units_processed,
            total_units,
            percent,
        }
    }
}

/// Raw text of one unit that decoded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitText {
    /// 1-indexed position of the unit in the document.
    pub number: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub units_processed: usize,
    pub total_units: usize,
    pub units_skipped: usize,
}

impl ExtractionSummary {
    /// True when some units were dropped because they failed to decode.
    pub fn is_degraded(&self) -> bool {
        self.units_skipped > 0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExtractOptions {
    /// Abort the run once more than this fraction of all units failed.
    /// `None` skips failed units without limit.
    pub max_skipped_ratio: Option<f64>,
}

/// A single, non-restartable pass over the units of one document.
///
/// Units are decoded lazily, one per call to `next`. A unit that fails to
/// decode is skipped and still counts towards progress. The decoder is
/// released as soon as the run is exhausted, aborted or closed.
pub struct Extraction<'p> {
    decoder: Option<Box<dyn DocumentDecoder>>,
    info: DocumentInfo,
    options: ExtractOptions,
    total: usize,
    processed: usize,
    skipped: usize,
    on_progress: Option<Box<dyn FnMut(ExtractionProgress) + 'p>>,
}

impl<'p> Extraction<'p> {
    pub fn new(decoder: Box<dyn DocumentDecoder>, options: ExtractOptions) -> Self {
        let total = decoder.unit_count();
        let info = decoder.info();
        log::debug!("{} document has {} units", decoder.kind(), total);

        Self {
            decoder: Some(decoder),
            info,
            options,
            total,
            processed: 0,
            skipped: 0,
            on_progress: None,
        }
    }

    pub fn on_progress(mut self, callback: impl FnMut(ExtractionProgress) + 'p) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    pub fn total_units(&self) -> usize {
        self.total
    }

    pub fn summary(&self) -> ExtractionSummary {
        ExtractionSummary {
            units_processed: self.processed,
            total_units: self.total,
            units_skipped: self.skipped,
        }
    }

    pub fn is_released(&self) -> bool {
        self.decoder.is_none()
    }

    /// Stop early and release the decoder.
    pub fn close(&mut self) {
        if self.decoder.take().is_some() {
            log::debug!(
                "extraction closed after {} of {} units",
                self.processed,
                self.total
            );
        }
    }

    fn report_progress(&mut self) {
        let progress = ExtractionProgress::new(self.processed, self.total);
        if let Some(callback) = self.on_progress.as_mut() {
            callback(progress);
        }
    }

    fn skip_limit_exceeded(&self) -> bool {
        match self.options.max_skipped_ratio {
            Some(ratio) => self.skipped as f64 > ratio * self.total as f64,
            None => false,
        }
    }
}

impl Iterator for Extraction<'_> {
    type Item = Result<UnitText, ExtractionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.processed >= self.total {
                self.close();
                return None;
            }
            let decoder = self.decoder.as_mut()?;

            let index = self.processed;
            let decoded = decoder.decode_unit(index);
            self.processed += 1;

            let text = match decoded {
                Ok(text) => Some(text),
                Err(err) => {
                    self.skipped += 1;
                    log::warn!("skipping unit {} of {}: {err:#}", index + 1, self.total);
                    None
                }
            };
            self.report_progress();

            if self.skip_limit_exceeded() {
                self.close();
                return Some(Err(ExtractionError::TooManySkipped {
                    skipped: self.skipped,
                    total: self.total,
                }));
            }

            if let Some(text) = text {
                return Some(Ok(UnitText {
                    number: index + 1,
                    text,
                }));
            }
        }
    }
}

/// Open `bytes` as a `kind` document and start an extraction run over it.
pub fn extract<'p>(
    bytes: Vec<u8>,
    kind: DocumentKind,
    options: ExtractOptions,
) -> Result<Extraction<'p>, ExtractionError> {
    let decoder = reader::open_decoder(bytes, kind)?;
    Ok(Extraction::new(decoder, options))
}
