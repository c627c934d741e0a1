use crate::storage::{self, KeyValueStore, KEY_CURRENT_INDEX, KEY_PACE};
use std::ops::Range;
use std::rc::Rc;

pub const MIN_PACE: u32 = 60;
pub const MAX_PACE: u32 = 1000;
pub const DEFAULT_PACE: u32 = 250;

pub fn clamp_pace(pace: u32) -> u32 {
    pace.clamp(MIN_PACE, MAX_PACE)
}

/// Tokens of one loaded document plus the index where each unit starts.
///
/// `unit_breaks[i]` is the first token of unit `i + 1`. Breaks are strictly
/// increasing and the first one is always 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenSequence {
    tokens: Vec<String>,
    unit_breaks: Vec<usize>,
}

impl TokenSequence {
    pub fn builder() -> TokenSequenceBuilder {
        TokenSequenceBuilder::default()
    }

    /// A sequence without unit boundaries.
    pub fn from_tokens(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            unit_breaks: Vec::new(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn unit_breaks(&self) -> &[usize] {
        &self.unit_breaks
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn total_units(&self) -> usize {
        self.unit_breaks.len()
    }

    /// 1-indexed unit containing `index`; 1 when no boundaries are known.
    pub fn unit_of(&self, index: usize) -> usize {
        // number of breaks at or before index == greatest i with breaks[i] <= index, plus one
        self.unit_breaks
            .partition_point(|&start| start <= index)
            .max(1)
    }

    /// Token range of the 1-indexed unit.
    pub fn unit_range(&self, unit: usize) -> Option<Range<usize>> {
        let start = *self.unit_breaks.get(unit.checked_sub(1)?)?;
        let end = self.unit_breaks.get(unit).copied().unwrap_or(self.tokens.len());
        Some(start..end)
    }
}

#[derive(Debug, Default)]
pub struct TokenSequenceBuilder {
    sequence: TokenSequence,
}

impl TokenSequenceBuilder {
    /// Append one unit's tokens. A unit without tokens adds no break.
    pub fn push_unit(&mut self, tokens: Vec<String>) -> &mut Self {
        if !tokens.is_empty() {
            self.sequence.unit_breaks.push(self.sequence.tokens.len());
            self.sequence.tokens.extend(tokens);
        }
        self
    }

    pub fn build(self) -> TokenSequence {
        self.sequence
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub current_index: usize,
    pub is_playing: bool,
    pub pace: u32,
}

/// The loaded document's tokens and the reader's place in them.
///
/// Index and pace are written through to the store on every change.
pub struct ReadingPosition {
    sequence: TokenSequence,
    state: PlaybackState,
    store: Rc<dyn KeyValueStore>,
}

impl ReadingPosition {
    /// Start with an empty sequence, restoring the persisted pace.
    pub fn new(store: Rc<dyn KeyValueStore>, default_pace: u32) -> Self {
        let pace = storage::read_or_warn(store.as_ref(), KEY_PACE)
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .unwrap_or(default_pace);

        Self {
            sequence: TokenSequence::default(),
            state: PlaybackState {
                current_index: 0,
                is_playing: false,
                pace: clamp_pace(pace),
            },
            store,
        }
    }

    /// Index persisted by a previous run, if any.
    pub fn persisted_index(&self) -> Option<usize> {
        storage::read_or_warn(self.store.as_ref(), KEY_CURRENT_INDEX)
            .and_then(|raw| raw.trim().parse().ok())
    }

    pub fn sequence(&self) -> &TokenSequence {
        &self.sequence
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn pace(&self) -> u32 {
        self.state.pace
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn current_token(&self) -> Option<&str> {
        self.sequence
            .tokens
            .get(self.state.current_index)
            .map(String::as_str)
    }

    pub fn total_units(&self) -> usize {
        self.sequence.total_units()
    }

    /// Replace the sequence. An out-of-range restore index means "start over".
    pub fn load(&mut self, sequence: TokenSequence, restore_index: Option<usize>) {
        let index = restore_index
            .filter(|&index| index < sequence.len())
            .unwrap_or(0);
        self.sequence = sequence;
        self.state.is_playing = false;
        self.set_index(index);
    }

    /// Drop the current sequence. The persisted index is left for the next
    /// successful `load` to overwrite.
    pub fn clear(&mut self) {
        self.sequence = TokenSequence::default();
        self.state.current_index = 0;
        self.state.is_playing = false;
    }

    /// Jump to a token, clamped to the sequence. Always pauses.
    pub fn seek_token(&mut self, index: usize) {
        if self.sequence.is_empty() {
            return;
        }
        self.state.is_playing = false;
        self.set_index(index.min(self.sequence.len() - 1));
    }

    /// Jump to the first token of a 1-indexed unit, clamped. Always pauses.
    pub fn seek_unit(&mut self, unit: usize) {
        let total = self.sequence.total_units();
        if total == 0 {
            return;
        }
        let unit = unit.clamp(1, total);
        self.state.is_playing = false;
        self.set_index(self.sequence.unit_breaks[unit - 1]);
    }

    pub fn step_forward(&mut self) {
        self.seek_token(self.state.current_index.saturating_add(1));
    }

    pub fn step_back(&mut self) {
        self.seek_token(self.state.current_index.saturating_sub(1));
    }

    pub fn current_unit(&self) -> usize {
        self.sequence.unit_of(self.state.current_index)
    }

    pub fn reset(&mut self) {
        self.state.is_playing = false;
        self.set_index(0);
    }

    /// Tokens to show around the current one: the whole current unit when
    /// unit boundaries are known, otherwise `half` tokens on each side.
    pub fn context_range(&self, half: usize) -> Range<usize> {
        if let Some(range) = self.sequence.unit_range(self.current_unit()) {
            return range;
        }
        let index = self.state.current_index;
        let start = index.saturating_sub(half);
        let end = index.saturating_add(half).saturating_add(1).min(self.len());
        start.min(end)..end
    }

    pub(crate) fn set_playing(&mut self, playing: bool) {
        self.state.is_playing = playing;
    }

    /// Move forward one token. Returns false at the end of the sequence.
    pub(crate) fn advance(&mut self) -> bool {
        let next = self.state.current_index + 1;
        if next >= self.sequence.len() {
            return false;
        }
        self.set_index(next);
        true
    }

    pub(crate) fn set_pace(&mut self, pace: u32) {
        let pace = clamp_pace(pace);
        if pace != self.state.pace {
            self.state.pace = pace;
            storage::write_or_warn(self.store.as_ref(), KEY_PACE, &pace.to_string());
        }
    }

    fn set_index(&mut self, index: usize) {
        self.state.current_index = index;
        storage::write_or_warn(self.store.as_ref(), KEY_CURRENT_INDEX, &index.to_string());
    }
}
