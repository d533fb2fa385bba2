//! Per-actor delayed event queue.
//!
//! Every scripted creature owns one [`EventScheduler`]. The host feeds elapsed
//! time in with [`EventScheduler::update`] and then drains ready events with
//! [`EventScheduler::poll`] until it returns `None` or the behavior yields.
//!
//! Design Notes:
//! * Queues are tiny (a boss rarely has more than a dozen pending events), so
//!   the queue is a `Vec` kept sorted by `(due, seq)` rather than a heap. This
//!   keeps group-wide delay and cancellation trivial.
//! * `seq` is a monotonically increasing insertion counter; it breaks due-time
//!   ties so events scheduled earlier fire first.
//! * The scheduler never repeats anything on its own. A handler that wants a
//!   periodic event calls [`EventScheduler::repeat`] (or `schedule*` again).

use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Tag used for bulk cancel/delay. Group `0` means "ungrouped".
pub type EventGroup = u8;

/// The "no group" tag. Group operations on it are no-ops.
pub const NO_GROUP: EventGroup = 0;

/// Delay range used to reschedule a periodic event after it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatInterval {
    pub min: Duration,
    pub max: Duration,
}

impl RepeatInterval {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Interval that always yields the same delay.
    pub fn fixed(every: Duration) -> Self {
        Self {
            min: every,
            max: every,
        }
    }

    /// Draw a delay uniformly from `[min, max)` at millisecond resolution.
    /// A degenerate range (`max <= min`) always yields `min`.
    fn roll(&self, rng: &mut StdRng) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let span_ms = (self.max - self.min).as_millis() as u64;
        if span_ms == 0 {
            return self.min;
        }
        self.min + Duration::from_millis(rng.gen_range(0..span_ms))
    }
}

#[derive(Debug, Clone)]
struct Entry<E> {
    id: E,
    due: Duration,
    seq: u64,
    group: EventGroup,
    repeat: Option<RepeatInterval>,
}

/// An event handed out by [`EventScheduler::poll`]. It is no longer in the
/// queue when the caller receives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredEvent<E> {
    pub id: E,
    pub group: EventGroup,
    /// Scheduler time the event was due at (may be earlier than `now`).
    pub due: Duration,
    pub repeat: Option<RepeatInterval>,
}

pub struct EventScheduler<E> {
    now: Duration,
    next_seq: u64,
    queue: Vec<Entry<E>>,
    rng: StdRng,
}

impl<E> fmt::Debug for EventScheduler<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventScheduler")
            .field("now", &self.now)
            .field("pending", &self.queue.len())
            .field(
                "queue",
                &self
                    .queue
                    .iter()
                    .map(|e| (&e.id, e.due, e.group))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl<E> Default for EventScheduler<E>
where
    E: Copy + Eq + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventScheduler<E>
where
    E: Copy + Eq + fmt::Debug,
{
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic scheduler for simulations and tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            queue: Vec::new(),
            rng,
        }
    }

    /// Current scheduler time (sum of all `update` calls).
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn insert(&mut self, id: E, delay: Duration, group: EventGroup, repeat: Option<RepeatInterval>) {
        let entry = Entry {
            id,
            due: self.now.saturating_add(delay),
            seq: self.next_seq,
            group,
            repeat,
        };
        self.next_seq += 1;
        let key = (entry.due, entry.seq);
        let pos = self.queue.partition_point(|e| (e.due, e.seq) <= key);
        self.queue.insert(pos, entry);
    }

    fn resort(&mut self) {
        self.queue.sort_by_key(|e| (e.due, e.seq));
    }

    /// Schedule `id` to fire `delay` from now. Zero delay fires on the next poll.
    pub fn schedule(&mut self, id: E, delay: Duration, group: EventGroup) {
        self.insert(id, delay, group, None);
    }

    /// Schedule with a delay drawn once from `[min, max)`.
    pub fn schedule_range(&mut self, id: E, min: Duration, max: Duration, group: EventGroup) {
        let delay = RepeatInterval::new(min, max).roll(&mut self.rng);
        self.insert(id, delay, group, None);
    }

    /// Like [`schedule_range`](Self::schedule_range) but remembers the range so
    /// the handler can call [`repeat`](Self::repeat) after it fires.
    pub fn schedule_repeating(&mut self, id: E, min: Duration, max: Duration, group: EventGroup) {
        let interval = RepeatInterval::new(min, max);
        let delay = interval.roll(&mut self.rng);
        self.insert(id, delay, group, Some(interval));
    }

    /// Re-arm a fired periodic event with a fresh delay from its interval.
    /// Returns `false` when the event carried no repeat interval.
    pub fn repeat(&mut self, fired: &FiredEvent<E>) -> bool {
        let Some(interval) = fired.repeat else {
            return false;
        };
        let delay = interval.roll(&mut self.rng);
        self.insert(fired.id, delay, fired.group, Some(interval));
        true
    }

    /// Cancel every pending `id`, then schedule exactly one.
    pub fn reschedule(&mut self, id: E, delay: Duration, group: EventGroup) {
        self.cancel(id);
        self.schedule(id, delay, group);
    }

    /// Advance the clock. Never fires anything by itself.
    pub fn update(&mut self, elapsed: Duration) {
        self.now = self.now.saturating_add(elapsed);
    }

    /// Remove and return the earliest ready event, if any.
    pub fn poll(&mut self) -> Option<FiredEvent<E>> {
        let first = self.queue.first()?;
        if first.due > self.now {
            return None;
        }
        let entry = self.queue.remove(0);
        log::trace!("event {:?} fired at {:?} (due {:?})", entry.id, self.now, entry.due);
        Some(FiredEvent {
            id: entry.id,
            group: entry.group,
            due: entry.due,
            repeat: entry.repeat,
        })
    }

    pub fn cancel(&mut self, id: E) {
        self.queue.retain(|e| e.id != id);
    }

    pub fn cancel_group(&mut self, group: EventGroup) {
        if group == NO_GROUP {
            return;
        }
        self.queue.retain(|e| e.group != group);
    }

    /// Push back every pending event of `group` by `by`.
    pub fn delay_group(&mut self, group: EventGroup, by: Duration) {
        if group == NO_GROUP || by.is_zero() {
            return;
        }
        let mut touched = false;
        for entry in self.queue.iter_mut().filter(|e| e.group == group) {
            entry.due = entry.due.saturating_add(by);
            touched = true;
        }
        if touched {
            self.resort();
        }
    }

    /// Push back every pending event regardless of group.
    pub fn delay_all(&mut self, by: Duration) {
        for entry in self.queue.iter_mut() {
            entry.due = entry.due.saturating_add(by);
        }
    }

    pub fn reset(&mut self) {
        self.queue.clear();
    }

    pub fn is_scheduled(&self, id: E) -> bool {
        self.queue.iter().any(|e| e.id == id)
    }

    /// Time until the earliest pending `id` fires (zero when already due).
    pub fn time_until(&self, id: E) -> Option<Duration> {
        self.queue
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.due.saturating_sub(self.now))
    }

    /// Time until the next pending event of any kind.
    pub fn next_due_in(&self) -> Option<Duration> {
        self.queue.first().map(|e| e.due.saturating_sub(self.now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ev {
        A,
        B,
        C,
        D,
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn drain(s: &mut EventScheduler<Ev>) -> Vec<Ev> {
        std::iter::from_fn(|| s.poll()).map(|f| f.id).collect()
    }

    #[test]
    fn nothing_fires_before_due() {
        let mut s = EventScheduler::with_seed(1);
        s.schedule(Ev::A, secs(5), NO_GROUP);
        s.update(Duration::from_millis(4999));
        assert!(s.poll().is_none());
        s.update(Duration::from_millis(1));
        assert_eq!(s.poll().map(|f| f.id), Some(Ev::A));
        assert!(s.poll().is_none());
    }

    #[test]
    fn fires_in_due_order_with_insertion_tiebreak() {
        let mut s = EventScheduler::with_seed(1);
        s.schedule(Ev::C, secs(3), NO_GROUP);
        s.schedule(Ev::A, secs(1), NO_GROUP);
        s.schedule(Ev::B, secs(3), NO_GROUP);
        s.schedule(Ev::D, secs(2), NO_GROUP);
        s.update(secs(10));
        assert_eq!(drain(&mut s), vec![Ev::A, Ev::D, Ev::C, Ev::B]);
    }

    #[test]
    fn zero_delay_is_due_on_next_poll() {
        let mut s = EventScheduler::with_seed(1);
        s.schedule(Ev::A, Duration::ZERO, NO_GROUP);
        assert_eq!(s.poll().map(|f| f.id), Some(Ev::A));
    }

    #[test]
    fn same_id_entries_coexist_until_rescheduled() {
        let mut s = EventScheduler::with_seed(1);
        s.schedule(Ev::A, secs(1), NO_GROUP);
        s.schedule(Ev::A, secs(2), NO_GROUP);
        assert_eq!(s.len(), 2);
        s.reschedule(Ev::A, secs(5), NO_GROUP);
        assert_eq!(s.len(), 1);
        assert_eq!(s.time_until(Ev::A), Some(secs(5)));
    }

    #[test]
    fn cancel_group_removes_only_that_group() {
        let mut s = EventScheduler::with_seed(1);
        s.schedule(Ev::A, secs(1), 1);
        s.schedule(Ev::B, secs(2), 2);
        s.schedule(Ev::C, secs(3), 1);
        s.schedule(Ev::D, secs(4), NO_GROUP);
        s.cancel_group(1);
        s.update(secs(10));
        assert_eq!(drain(&mut s), vec![Ev::B, Ev::D]);
    }

    #[test]
    fn group_zero_operations_are_noops() {
        let mut s = EventScheduler::with_seed(1);
        s.schedule(Ev::A, secs(1), NO_GROUP);
        s.cancel_group(NO_GROUP);
        s.delay_group(NO_GROUP, secs(100));
        assert_eq!(s.time_until(Ev::A), Some(secs(1)));
    }

    #[test]
    fn delay_group_shifts_exactly_the_group() {
        let mut s = EventScheduler::with_seed(1);
        s.schedule(Ev::A, secs(1), 1);
        s.schedule(Ev::B, secs(2), 1);
        s.schedule(Ev::C, secs(3), 2);
        s.delay_group(1, secs(10));
        assert_eq!(s.time_until(Ev::A), Some(secs(11)));
        assert_eq!(s.time_until(Ev::B), Some(secs(12)));
        assert_eq!(s.time_until(Ev::C), Some(secs(3)));
        s.update(secs(20));
        assert_eq!(drain(&mut s), vec![Ev::C, Ev::A, Ev::B]);
    }

    #[test]
    fn reschedule_inside_handler_keeps_single_entry() {
        let mut s = EventScheduler::with_seed(1);
        s.schedule(Ev::A, secs(1), NO_GROUP);
        s.update(secs(1));
        while let Some(fired) = s.poll() {
            assert_eq!(fired.id, Ev::A);
            s.reschedule(Ev::A, secs(1), NO_GROUP);
            s.reschedule(Ev::A, secs(2), NO_GROUP);
        }
        assert_eq!(s.len(), 1);
        assert_eq!(s.time_until(Ev::A), Some(secs(2)));
    }

    #[test]
    fn reset_inside_handler_drops_remaining_events() {
        let mut s = EventScheduler::with_seed(1);
        s.schedule(Ev::A, secs(1), NO_GROUP);
        s.schedule(Ev::B, secs(1), NO_GROUP);
        s.update(secs(1));
        let fired = s.poll().expect("A is due");
        assert_eq!(fired.id, Ev::A);
        s.reset();
        assert!(s.poll().is_none());
        assert!(!s.is_scheduled(Ev::A));
    }

    #[test]
    fn repeat_requires_interval() {
        let mut s = EventScheduler::with_seed(1);
        s.schedule(Ev::A, Duration::ZERO, 3);
        let fired = s.poll().expect("due");
        assert!(!s.repeat(&fired));
        assert!(s.is_empty());

        s.schedule_repeating(Ev::B, secs(2), secs(2), 3);
        s.update(secs(2));
        let fired = s.poll().expect("due");
        assert!(s.repeat(&fired));
        assert_eq!(s.time_until(Ev::B), Some(secs(2)));
        s.cancel_group(3);
        assert!(s.is_empty());
    }

    #[test]
    fn schedule_range_stays_in_bounds() {
        let mut s = EventScheduler::with_seed(7);
        for _ in 0..200 {
            s.schedule_range(Ev::A, secs(3), secs(7), NO_GROUP);
            let d = s.time_until(Ev::A).expect("scheduled");
            assert!(d >= secs(3) && d < secs(7), "{d:?}");
            s.cancel(Ev::A);
        }
        s.schedule_range(Ev::B, secs(9), secs(4), NO_GROUP);
        assert_eq!(s.time_until(Ev::B), Some(secs(9)));
    }

    #[test]
    fn repeat_intervals_are_uniform_over_range() {
        let mut s = EventScheduler::with_seed(42);
        s.schedule_repeating(Ev::A, secs(20), secs(25), NO_GROUP);
        let mut buckets = [0u32; 5];
        let mut last_fire = Duration::ZERO;
        let mut total = Duration::ZERO;
        for _ in 0..1000 {
            let wait = s.next_due_in().expect("always pending");
            s.update(wait);
            let fired = s.poll().expect("due now");
            let interval = s.now() - last_fire;
            last_fire = s.now();
            assert!(interval >= secs(20) && interval < secs(25), "{interval:?}");
            buckets[((interval - secs(20)).as_secs() as usize).min(4)] += 1;
            total += interval;
            assert!(s.repeat(&fired));
        }
        let mean = total.as_secs_f64() / 1000.0;
        assert!((mean - 22.5).abs() < 0.3, "mean {mean}");
        for count in buckets {
            assert!(count > 140 && count < 260, "bucket {count}");
        }
    }

    #[test]
    fn delay_all_and_next_due() {
        let mut s = EventScheduler::with_seed(1);
        assert_eq!(s.next_due_in(), None);
        s.schedule(Ev::A, secs(4), 1);
        s.schedule(Ev::B, secs(2), NO_GROUP);
        s.delay_all(secs(1));
        assert_eq!(s.next_due_in(), Some(secs(3)));
        s.update(secs(10));
        assert_eq!(s.time_until(Ev::A), Some(Duration::ZERO));
    }
}
