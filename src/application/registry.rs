//! Bounded registry of live topics.
//!
//! The registry maps each live topic to its buffered state and threads the
//! live topics onto an insertion-ordered chain (oldest first). The chain
//! links are stored as keys next to each entry, so finding the oldest topic,
//! appending a topic and unlinking an arbitrary topic are all O(1) without
//! any shared pointers between entries.

use crate::application::timer::TimerId;
use crate::domain::topic::TopicKey;
use ahash::AHashMap;
use std::fmt;

/// Identity of one entry instance.
///
/// Every insertion gets a fresh generation, so a topic that is flushed and
/// re-created is distinguishable from its previous incarnation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Generation(u64);

impl Generation {
    /// Raw generation number.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Error returned by [`KeyRegistry::insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The topic already has a live entry
    AlreadyPresent(TopicKey),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::AlreadyPresent(key) => {
                write!(f, "topic '{}' already has a live entry", key)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// A live entry together with its bookkeeping.
#[derive(Debug)]
pub struct Slot<E> {
    value: E,
    generation: Generation,
    timer: Option<TimerId>,
    older: Option<TopicKey>,
    newer: Option<TopicKey>,
}

impl<E> Slot<E> {
    /// The buffered state.
    pub fn value(&self) -> &E {
        &self.value
    }

    /// Mutable access to the buffered state.
    pub fn value_mut(&mut self) -> &mut E {
        &mut self.value
    }

    /// Identity of this entry instance.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The timer currently armed for this entry, if any.
    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    pub(crate) fn replace_timer(&mut self, timer: Option<TimerId>) -> Option<TimerId> {
        std::mem::replace(&mut self.timer, timer)
    }

    /// The topic inserted just before this one.
    pub fn older(&self) -> Option<&TopicKey> {
        self.older.as_ref()
    }

    /// The topic inserted just after this one.
    pub fn newer(&self) -> Option<&TopicKey> {
        self.newer.as_ref()
    }

    /// Consume the slot, returning the buffered state.
    pub fn into_value(self) -> E {
        self.value
    }
}

/// Bounded topic registry with FIFO insertion order.
///
/// Insertion order is by first arrival: activity on an existing topic does
/// not move it. The registry reports when it is over capacity but never
/// evicts by itself, because evicting means flushing and flushing emits
/// output that only the owning policy knows how to produce.
#[derive(Debug)]
pub struct KeyRegistry<E> {
    slots: AHashMap<TopicKey, Slot<E>>,
    oldest: Option<TopicKey>,
    newest: Option<TopicKey>,
    max_topics: usize,
    next_generation: u64,
}

impl<E> KeyRegistry<E> {
    /// Create an empty registry allowing `max_topics` live topics (at least 1).
    pub fn new(max_topics: usize) -> Self {
        Self {
            slots: AHashMap::new(),
            oldest: None,
            newest: None,
            max_topics: max_topics.max(1),
            next_generation: 0,
        }
    }

    /// Look up the live entry for a topic.
    pub fn get(&self, key: &str) -> Option<&Slot<E>> {
        self.slots.get(key)
    }

    /// Look up the live entry for a topic mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Slot<E>> {
        self.slots.get_mut(key)
    }

    /// Check whether a topic has a live entry.
    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Add a new topic at the newest end of the chain.
    ///
    /// # Errors
    /// Returns `RegistryError::AlreadyPresent` if the topic is already live;
    /// the registry is left unchanged.
    pub fn insert(&mut self, key: TopicKey, value: E) -> Result<Generation, RegistryError> {
        if self.slots.contains_key(&key) {
            return Err(RegistryError::AlreadyPresent(key));
        }

        self.next_generation += 1;
        let generation = Generation(self.next_generation);

        if let Some(newest) = &self.newest {
            if let Some(slot) = self.slots.get_mut(newest) {
                slot.newer = Some(key.clone());
            }
        }

        let slot = Slot {
            value,
            generation,
            timer: None,
            older: self.newest.replace(key.clone()),
            newer: None,
        };
        if self.oldest.is_none() {
            self.oldest = Some(key.clone());
        }
        self.slots.insert(key, slot);

        Ok(generation)
    }

    /// Remove a topic, unlinking it from the chain.
    ///
    /// Returns `None` if the topic is not live.
    pub fn remove(&mut self, key: &str) -> Option<Slot<E>> {
        let slot = self.slots.remove(key)?;

        match &slot.newer {
            Some(newer) => {
                if let Some(next) = self.slots.get_mut(newer) {
                    next.older = slot.older.clone();
                }
            }
            None => self.newest = slot.older.clone(),
        }

        match &slot.older {
            Some(older) => {
                if let Some(prev) = self.slots.get_mut(older) {
                    prev.newer = slot.newer.clone();
                }
            }
            None => self.oldest = slot.newer.clone(),
        }

        Some(slot)
    }

    /// The earliest-inserted live topic.
    pub fn oldest_key(&self) -> Option<&TopicKey> {
        self.oldest.as_ref()
    }

    /// The latest-inserted live topic.
    pub fn newest_key(&self) -> Option<&TopicKey> {
        self.newest.as_ref()
    }

    /// Number of live topics.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no topic is live.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum number of live topics.
    pub fn capacity(&self) -> usize {
        self.max_topics
    }

    /// Check whether the last insertion pushed the registry over capacity.
    pub fn is_over_capacity(&self) -> bool {
        self.slots.len() > self.max_topics
    }

    /// Iterate over live topics from oldest to newest.
    pub fn keys(&self) -> Keys<'_, E> {
        Keys {
            registry: self,
            next: self.oldest.as_ref(),
        }
    }
}

/// Iterator over live topics in insertion order.
pub struct Keys<'a, E> {
    registry: &'a KeyRegistry<E>,
    next: Option<&'a TopicKey>,
}

impl<'a, E> Iterator for Keys<'a, E> {
    type Item = &'a TopicKey;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next?;
        self.next = self.registry.slots.get(key).and_then(|slot| slot.newer.as_ref());
        Some(key)
    }
}
