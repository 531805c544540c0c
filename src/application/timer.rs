//! Per-node timer queue and stale-timer guards.
//!
//! Timers are plain deadlines in a min-heap; nothing fires on its own. The
//! owning node pops due timers when the host asks it to, which keeps every
//! registry mutation inside one synchronous call.
//!
//! Each timer carries a [`TimerGuard`] naming the topic and the entry
//! generation it was armed for. A timer is acted upon only if that exact
//! entry is still live; a timer that outlived its entry is inert.

use crate::application::registry::{Generation, KeyRegistry};
use crate::domain::topic::TopicKey;
use ahash::AHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

/// Below this many heap slots the queue never bothers compacting.
const COMPACT_THRESHOLD: usize = 64;

/// Handle of a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// The entry instance a timer was armed for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerGuard {
    key: TopicKey,
    generation: Generation,
}

impl TimerGuard {
    /// Create a guard for the given entry instance.
    pub fn new(key: TopicKey, generation: Generation) -> Self {
        Self { key, generation }
    }

    /// Topic the timer belongs to.
    pub fn key(&self) -> &TopicKey {
        &self.key
    }

    /// Entry generation captured when the timer was armed.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Check whether the guarded entry is still the live one.
    pub fn is_current<E>(&self, registry: &KeyRegistry<E>) -> bool {
        registry
            .get(self.key.as_str())
            .is_some_and(|slot| slot.generation() == self.generation)
    }
}

/// A timer popped from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredTimer {
    /// Handle the timer was scheduled under
    pub id: TimerId,
    /// Entry the timer was armed for
    pub guard: TimerGuard,
    /// When the timer was due
    pub deadline: Instant,
}

/// Deadline-ordered queue of pending timers.
///
/// Cancellation is O(1); cancelled timers are skipped lazily and the heap is
/// rebuilt once dead slots dominate it.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<(Instant, TimerId)>>,
    pending: AHashMap<TimerId, (TimerGuard, Instant)>,
    next_id: u64,
}

impl TimerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer for `deadline`.
    ///
    /// Timers with equal deadlines fire in scheduling order.
    pub fn schedule(&mut self, deadline: Instant, guard: TimerGuard) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.heap.push(Reverse((deadline, id)));
        self.pending.insert(id, (guard, deadline));
        id
    }

    /// Cancel a pending timer.
    ///
    /// Returns false if the timer already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let cancelled = self.pending.remove(&id).is_some();
        if cancelled {
            self.prune();
        }
        cancelled
    }

    /// Pop the earliest timer due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<FiredTimer> {
        let Reverse((deadline, id)) = *self.heap.peek()?;
        if deadline > now {
            return None;
        }
        self.heap.pop();
        let fired = self.pending.remove(&id).map(|(guard, deadline)| FiredTimer {
            id,
            guard,
            deadline,
        });
        self.prune();
        fired
    }

    /// Deadline of the earliest pending timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Check whether a timer is still pending.
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if no timer is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending timer.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
    }

    /// Keep the heap top live and the heap from filling with dead slots.
    fn prune(&mut self) {
        if self.heap.len() > COMPACT_THRESHOLD && self.heap.len() > 2 * self.pending.len() {
            self.heap = self
                .pending
                .iter()
                .map(|(id, (_, deadline))| Reverse((*deadline, *id)))
                .collect();
        }
        while let Some(Reverse((_, id))) = self.heap.peek() {
            if self.pending.contains_key(id) {
                break;
            }
            self.heap.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn guard(registry: &mut KeyRegistry<()>, key: &str) -> TimerGuard {
        let generation = registry.insert(key.into(), ()).unwrap();
        TimerGuard::new(key.into(), generation)
    }

    #[test]
    fn test_pop_in_deadline_order() {
        let mut registry = KeyRegistry::new(10);
        let mut queue = TimerQueue::new();
        let start = Instant::now();

        let late = queue.schedule(start + Duration::from_millis(20), guard(&mut registry, "a"));
        let early = queue.schedule(start + Duration::from_millis(10), guard(&mut registry, "b"));

        assert_eq!(queue.next_deadline(), Some(start + Duration::from_millis(10)));
        assert!(queue.pop_due(start).is_none());

        let now = start + Duration::from_millis(30);
        assert_eq!(queue.pop_due(now).map(|t| t.id), Some(early));
        assert_eq!(queue.pop_due(now).map(|t| t.id), Some(late));
        assert!(queue.pop_due(now).is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_equal_deadlines_fire_in_schedule_order() {
        let mut registry = KeyRegistry::new(10);
        let mut queue = TimerQueue::new();
        let at = Instant::now();

        let ids: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|k| queue.schedule(at, guard(&mut registry, k)))
            .collect();
        let fired: Vec<_> = std::iter::from_fn(|| queue.pop_due(at).map(|t| t.id)).collect();
        assert_eq!(fired, ids);
    }

    #[test]
    fn test_cancel() {
        let mut registry = KeyRegistry::new(10);
        let mut queue = TimerQueue::new();
        let at = Instant::now();

        let id = queue.schedule(at, guard(&mut registry, "a"));
        assert!(queue.is_pending(id));
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert!(queue.pop_due(at).is_none());
        assert_eq!(queue.next_deadline(), None);
    }

    #[test]
    fn test_cancelled_head_does_not_hide_next_deadline() {
        let mut registry = KeyRegistry::new(10);
        let mut queue = TimerQueue::new();
        let start = Instant::now();

        let first = queue.schedule(start, guard(&mut registry, "a"));
        queue.schedule(start + Duration::from_secs(1), guard(&mut registry, "b"));
        queue.cancel(first);
        assert_eq!(queue.next_deadline(), Some(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_guard_detects_replaced_entry() {
        let mut registry = KeyRegistry::new(10);
        let stale = guard(&mut registry, "a");
        assert!(stale.is_current(&registry));

        registry.remove("a");
        assert!(!stale.is_current(&registry));

        let fresh = guard(&mut registry, "a");
        assert!(!stale.is_current(&registry));
        assert!(fresh.is_current(&registry));
        assert_eq!(stale.key(), fresh.key());
        assert_ne!(stale.generation(), fresh.generation());
    }

    #[test]
    fn test_heap_compacts_after_many_cancellations() {
        let mut registry = KeyRegistry::new(1);
        let g = guard(&mut registry, "a");
        let mut queue = TimerQueue::new();
        let start = Instant::now();

        let keep = queue.schedule(start, g.clone());
        for i in 1..1_000u64 {
            let id = queue.schedule(start + Duration::from_millis(i), g.clone());
            queue.cancel(id);
        }
        assert_eq!(queue.len(), 1);
        assert!(queue.heap.len() <= 2 * COMPACT_THRESHOLD + 1);
        assert_eq!(queue.pop_due(start).map(|t| t.id), Some(keep));
    }

    #[test]
    fn test_clear() {
        let mut registry = KeyRegistry::new(10);
        let mut queue = TimerQueue::new();
        queue.schedule(Instant::now(), guard(&mut registry, "a"));
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.next_deadline(), None);
    }
}
