//! Drift-corrected pacing of token advances.
//!
//! The engine never sleeps or spawns anything itself. It asks a [`Scheduler`]
//! for one-shot ticks and is handed each tick back by the event loop through
//! [`PaceEngine::tick`]. Only the most recently scheduled tick is honoured, so
//! cancelling is just forgetting the handle.

use crate::position::{clamp_pace, ReadingPosition};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const SPEED_STEP: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickHandle(u64);

pub trait Scheduler {
    /// Arrange for the event loop to deliver a tick after `delay_ms`.
    fn schedule(&mut self, delay_ms: f64) -> TickHandle;

    /// Forget a pending tick. Cancelling an unknown or fired handle is fine.
    fn cancel(&mut self, handle: TickHandle);
}

pub trait Clock {
    /// Milliseconds on a monotonic timeline.
    fn now_ms(&self) -> f64;
}

#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Wall-clock timers for a single-threaded loop that sleeps until the next
/// deadline.
#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    pending: BTreeMap<TickHandle, Instant>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the earliest pending tick.
    pub fn pop_next(&mut self) -> Option<(TickHandle, Instant)> {
        let (&handle, &due) = self.pending.iter().min_by_key(|(_, due)| **due)?;
        self.pending.remove(&handle);
        Some((handle, due))
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl Scheduler for TimerQueue {
    fn schedule(&mut self, delay_ms: f64) -> TickHandle {
        let handle = TickHandle(self.next_id);
        self.next_id += 1;
        let delay = Duration::from_secs_f64(delay_ms.max(0.0) / 1000.0);
        self.pending.insert(handle, Instant::now() + delay);
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        self.pending.remove(&handle);
    }
}

/// Deterministic scheduler and clock for simulations: time only moves when
/// told to.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now_ms: f64,
    next_id: u64,
    pending: Vec<(TickHandle, f64)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_now(&mut self, now_ms: f64) {
        self.now_ms = now_ms;
    }

    /// The single pending tick, if exactly one is outstanding.
    pub fn pending(&self) -> Option<(TickHandle, f64)> {
        match self.pending.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Remove the earliest pending tick, as if it had fired.
    pub fn take_next(&mut self) -> Option<(TickHandle, f64)> {
        let (pos, _) = self
            .pending
            .iter()
            .enumerate()
            .min_by(|a, b| a.1 .1.total_cmp(&b.1 .1))?;
        Some(self.pending.remove(pos))
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay_ms: f64) -> TickHandle {
        let handle = TickHandle(self.next_id);
        self.next_id += 1;
        self.pending.push((handle, self.now_ms + delay_ms.max(0.0)));
        handle
    }

    fn cancel(&mut self, handle: TickHandle) {
        self.pending.retain(|(pending, _)| *pending != handle);
    }
}

impl Clock for ManualScheduler {
    fn now_ms(&self) -> f64 {
        self.now_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Moved to this token index.
    Advanced(usize),
    /// Already on the last token; playback stopped without moving.
    Finished,
    /// The tick belonged to a cancelled schedule and was ignored.
    Stale,
}

/// Moves the reading position forward one token per tick while playing.
#[derive(Debug, Default)]
pub struct PaceEngine {
    interval_ms: f64,
    next_tick_ms: f64,
    active: Option<TickHandle>,
}

impl PaceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Expected time of the next advance on the undrifted schedule.
    pub fn next_tick_ms(&self) -> f64 {
        self.next_tick_ms
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn play(
        &mut self,
        position: &mut ReadingPosition,
        scheduler: &mut dyn Scheduler,
        now_ms: f64,
    ) {
        if (self.is_running() && position.is_playing()) || position.is_empty() {
            return;
        }
        position.set_playing(true);
        self.start(position.pace(), scheduler, now_ms);
    }

    pub fn pause(&mut self, position: &mut ReadingPosition, scheduler: &mut dyn Scheduler) {
        self.cancel(scheduler);
        position.set_playing(false);
    }

    /// Drop the pending tick without touching the position.
    pub fn cancel(&mut self, scheduler: &mut dyn Scheduler) {
        if let Some(handle) = self.active.take() {
            scheduler.cancel(handle);
            log::trace!("cancelled tick {handle:?}");
        }
    }

    /// Handle one delivered tick.
    pub fn tick(
        &mut self,
        handle: TickHandle,
        now_ms: f64,
        position: &mut ReadingPosition,
        scheduler: &mut dyn Scheduler,
    ) -> TickOutcome {
        if self.active != Some(handle) {
            return TickOutcome::Stale;
        }
        self.active = None;
        if !position.is_playing() {
            // paused underneath us, e.g. by a seek
            return TickOutcome::Stale;
        }

        // A late tick shortens the next interval by its lateness, keeping the
        // schedule anchored to the start time.
        let drift = now_ms - self.next_tick_ms;
        self.next_tick_ms = now_ms + self.interval_ms - drift;

        if !position.advance() {
            position.set_playing(false);
            log::debug!("reached end of sequence at token {}", position.current_index());
            return TickOutcome::Finished;
        }

        let delay = (self.next_tick_ms - now_ms).max(0.0);
        self.active = Some(scheduler.schedule(delay));
        TickOutcome::Advanced(position.current_index())
    }

    pub fn faster(
        &mut self,
        position: &mut ReadingPosition,
        scheduler: &mut dyn Scheduler,
        now_ms: f64,
    ) {
        let pace = (position.pace() as f64 * SPEED_STEP).round() as u32;
        self.change_pace(pace, position, scheduler, now_ms);
    }

    pub fn slower(
        &mut self,
        position: &mut ReadingPosition,
        scheduler: &mut dyn Scheduler,
        now_ms: f64,
    ) {
        let pace = (position.pace() as f64 / SPEED_STEP).round() as u32;
        self.change_pace(pace, position, scheduler, now_ms);
    }

    /// Set an explicit pace; a running schedule restarts at the new cadence.
    pub fn change_pace(
        &mut self,
        pace: u32,
        position: &mut ReadingPosition,
        scheduler: &mut dyn Scheduler,
        now_ms: f64,
    ) {
        position.set_pace(clamp_pace(pace));
        if self.is_running() {
            self.start(position.pace(), scheduler, now_ms);
        }
    }

    fn start(&mut self, pace: u32, scheduler: &mut dyn Scheduler, now_ms: f64) {
        self.cancel(scheduler);
        self.interval_ms = 60_000.0 / f64::from(pace);
        self.next_tick_ms = now_ms + self.interval_ms;
        self.active = Some(scheduler.schedule(self.interval_ms));
        log::debug!("pacing at {pace} tokens/min ({:.1} ms)", self.interval_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{TokenSequence, MAX_PACE, MIN_PACE};
    use crate::storage::MemoryStore;
    use proptest::prelude::*;
    use std::rc::Rc;

    fn loaded(count: usize, pace: u32) -> ReadingPosition {
        let mut pos = ReadingPosition::new(Rc::new(MemoryStore::new()), pace);
        let tokens = (0..count).map(|i| format!("t{i}")).collect();
        pos.load(TokenSequence::from_tokens(tokens), None);
        pos
    }

    fn fire(
        engine: &mut PaceEngine,
        sched: &mut ManualScheduler,
        pos: &mut ReadingPosition,
        at: f64,
    ) -> TickOutcome {
        let (handle, _) = sched.take_next().expect("a tick is pending");
        sched.set_now(at);
        engine.tick(handle, at, pos, sched)
    }

    #[test]
    fn drift_does_not_accumulate() {
        let mut pos = loaded(100, 600);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();

        engine.play(&mut pos, &mut sched, 0.0);
        assert_eq!(engine.interval_ms(), 100.0);
        assert_eq!(sched.pending().unwrap().1, 100.0);

        let mut next_ticks = Vec::new();
        for at in [100.0, 205.0, 300.0, 410.0] {
            assert!(matches!(
                fire(&mut engine, &mut sched, &mut pos, at),
                TickOutcome::Advanced(_)
            ));
            next_ticks.push(engine.next_tick_ms());
        }

        assert_eq!(pos.current_index(), 4);
        // Every expected tick stays on the 100 ms grid despite the jitter
        assert_eq!(next_ticks, vec![200.0, 300.0, 400.0, 500.0]);
        // A late tick is followed by a shortened delay
        assert_eq!(sched.pending().unwrap().1, 500.0);
    }

    #[test]
    fn late_tick_shortens_next_delay() {
        let mut pos = loaded(10, 600);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();
        engine.play(&mut pos, &mut sched, 0.0);

        fire(&mut engine, &mut sched, &mut pos, 130.0);
        let (_, due) = sched.pending().unwrap();
        assert_eq!(due - 130.0, 70.0);
    }

    #[test]
    fn very_late_tick_schedules_immediately() {
        let mut pos = loaded(10, 600);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();
        engine.play(&mut pos, &mut sched, 0.0);

        fire(&mut engine, &mut sched, &mut pos, 450.0);
        let (_, due) = sched.pending().unwrap();
        assert_eq!(due, 450.0);
        assert_eq!(pos.current_index(), 1);
    }

    #[test]
    fn end_stop_fires_exactly_one_tick() {
        let mut pos = loaded(5, 600);
        pos.seek_token(4);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();

        engine.play(&mut pos, &mut sched, 0.0);
        assert!(pos.is_playing());
        assert_eq!(
            fire(&mut engine, &mut sched, &mut pos, 100.0),
            TickOutcome::Finished
        );
        assert!(!pos.is_playing());
        assert!(!engine.is_running());
        assert_eq!(pos.current_index(), 4);
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn plays_to_the_end_then_stops() {
        let mut pos = loaded(3, 600);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();
        engine.play(&mut pos, &mut sched, 0.0);

        let mut outcomes = Vec::new();
        let mut at = 0.0;
        while sched.pending_count() > 0 {
            at += 100.0;
            outcomes.push(fire(&mut engine, &mut sched, &mut pos, at));
        }
        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Advanced(1),
                TickOutcome::Advanced(2),
                TickOutcome::Finished
            ]
        );
    }

    #[test]
    fn play_while_running_is_a_no_op() {
        let mut pos = loaded(10, 600);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();
        engine.play(&mut pos, &mut sched, 0.0);
        engine.play(&mut pos, &mut sched, 50.0);
        assert_eq!(sched.pending_count(), 1);
        assert_eq!(engine.next_tick_ms(), 100.0);
    }

    #[test]
    fn play_on_empty_sequence_does_nothing() {
        let mut pos = loaded(0, 600);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();
        engine.play(&mut pos, &mut sched, 0.0);
        assert!(!engine.is_running());
        assert!(!pos.is_playing());
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn cancelled_tick_is_stale() {
        let mut pos = loaded(10, 600);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();
        engine.play(&mut pos, &mut sched, 0.0);
        let (handle, _) = sched.pending().unwrap();

        engine.pause(&mut pos, &mut sched);
        engine.pause(&mut pos, &mut sched);
        assert_eq!(sched.pending_count(), 0);
        assert_eq!(engine.tick(handle, 100.0, &mut pos, &mut sched), TickOutcome::Stale);
        assert_eq!(pos.current_index(), 0);
    }

    #[test]
    fn seek_while_running_invalidates_pending_tick() {
        let mut pos = loaded(10, 600);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();
        engine.play(&mut pos, &mut sched, 0.0);
        pos.seek_token(5);
        assert_eq!(
            fire(&mut engine, &mut sched, &mut pos, 100.0),
            TickOutcome::Stale
        );
        assert_eq!(pos.current_index(), 5);
        assert!(!engine.is_running());

        sched.set_now(150.0);
        engine.play(&mut pos, &mut sched, 150.0);
        assert!(engine.is_running());
        assert_eq!(sched.pending().unwrap().1, 250.0);
    }

    #[test]
    fn pace_change_restarts_cadence_without_moving() {
        let mut pos = loaded(50, 600);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();
        engine.play(&mut pos, &mut sched, 0.0);
        fire(&mut engine, &mut sched, &mut pos, 100.0);
        fire(&mut engine, &mut sched, &mut pos, 200.0);

        sched.set_now(250.0);
        engine.faster(&mut pos, &mut sched, 250.0);
        assert_eq!(pos.pace(), 720);
        assert_eq!(pos.current_index(), 2);
        assert_eq!(sched.pending_count(), 1);
        let interval = 60_000.0 / 720.0;
        assert_eq!(engine.next_tick_ms(), 250.0 + interval);
        assert_eq!(sched.pending().unwrap().1, 250.0 + interval);
    }

    #[test]
    fn speed_changes_while_stopped_apply_on_play() {
        let mut pos = loaded(10, 250);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();

        engine.slower(&mut pos, &mut sched, 0.0);
        assert_eq!(pos.pace(), 208);
        assert_eq!(sched.pending_count(), 0);

        engine.play(&mut pos, &mut sched, 0.0);
        assert_eq!(engine.interval_ms(), 60_000.0 / 208.0);
    }

    #[test]
    fn speed_is_clamped_at_both_ends() {
        let mut pos = loaded(10, 950);
        let mut sched = ManualScheduler::new();
        let mut engine = PaceEngine::new();
        engine.faster(&mut pos, &mut sched, 0.0);
        assert_eq!(pos.pace(), MAX_PACE);

        engine.change_pace(65, &mut pos, &mut sched, 0.0);
        engine.slower(&mut pos, &mut sched, 0.0);
        assert_eq!(pos.pace(), MIN_PACE);
    }

    #[test]
    fn timer_queue_pops_earliest_first() {
        let mut queue = TimerQueue::new();
        let late = queue.schedule(50.0);
        let early = queue.schedule(0.0);
        let cancelled = queue.schedule(1.0);
        queue.cancel(cancelled);
        queue.cancel(cancelled);

        assert_eq!(queue.pop_next().map(|(h, _)| h), Some(early));
        assert_eq!(queue.pop_next().map(|(h, _)| h), Some(late));
        assert!(queue.pop_next().is_none());
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn pace_never_leaves_bounds(start in 1u32..2000, steps in prop::collection::vec(any::<bool>(), 0..40)) {
            let mut pos = loaded(3, start);
            let mut sched = ManualScheduler::new();
            let mut engine = PaceEngine::new();
            for faster in steps {
                if faster {
                    engine.faster(&mut pos, &mut sched, 0.0);
                } else {
                    engine.slower(&mut pos, &mut sched, 0.0);
                }
                prop_assert!((MIN_PACE..=MAX_PACE).contains(&pos.pace()));
            }
        }
    }
}
