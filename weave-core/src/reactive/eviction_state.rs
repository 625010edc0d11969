//! Eviction State
//!
//! An `EvictionState` is a watermark over ordered slots that only moves
//! forward. Components ask for the eviction event of a slot and block on it,
//! or subscribe to it, instead of polling the watermark.
//!
//! Events are created lazily and dropped from the state as soon as they fire.
//! Slots at or below the watermark all share one pre-triggered event, which
//! runs late subscribers immediately instead of registering them.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use super::event::Event;

/// A forward-only eviction watermark with one-shot per-slot events.
///
/// Cloning an `EvictionState` creates a new handle to the same watermark.
pub struct EvictionState<K> {
    inner: Arc<RwLock<EvictionInner<K>>>,
}

struct EvictionInner<K> {
    last_evicted: Option<K>,
    events: BTreeMap<K, Event>,
}

/// Shared event handed out for slots that were already evicted.
fn evicted_event() -> Event {
    static EVICTED: OnceLock<Event> = OnceLock::new();
    EVICTED.get_or_init(Event::new_triggered).clone()
}

impl<K> EvictionState<K>
where
    K: Ord + Copy + Debug + Send + Sync + 'static,
{
    /// Create a state where nothing has been evicted yet.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(EvictionInner {
                last_evicted: None,
                events: BTreeMap::new(),
            })),
        }
    }

    /// The event that fires once `slot` is evicted.
    ///
    /// Already evicted slots return a triggered event without allocating.
    pub fn eviction_event(&self, slot: K) -> Event {
        {
            let inner = self.inner.read();
            if inner.is_evicted(slot) {
                return evicted_event();
            }
            if let Some(event) = inner.events.get(&slot) {
                return event.clone();
            }
        }

        let mut inner = self.inner.write();
        if inner.is_evicted(slot) {
            return evicted_event();
        }
        inner.events.entry(slot).or_default().clone()
    }

    /// Advance the watermark to `slot`, triggering the events of every slot
    /// up to and including it. Slots at or below the watermark are ignored.
    pub fn evict(&self, slot: K) {
        let evicted = {
            let mut inner = self.inner.write();
            if inner.is_evicted(slot) {
                return;
            }

            let mut pending = inner.events.split_off(&slot);
            let current = pending.remove(&slot);
            let mut evicted = std::mem::replace(&mut inner.events, pending);
            if let Some(current) = current {
                evicted.insert(slot, current);
            }

            inner.last_evicted = Some(slot);
            evicted
        };

        tracing::debug!(slot = ?slot, triggered = evicted.len(), "eviction watermark advanced");

        for event in evicted.into_values() {
            event.trigger();
        }
    }

    /// The highest evicted slot, if any.
    pub fn last_evicted_slot(&self) -> Option<K> {
        self.inner.read().last_evicted
    }

    /// Whether `slot` is at or below the watermark.
    pub fn is_evicted(&self, slot: K) -> bool {
        self.inner.read().is_evicted(slot)
    }
}

impl<K: Ord> EvictionInner<K> {
    fn is_evicted(&self, slot: K) -> bool {
        self.last_evicted.as_ref().is_some_and(|last| slot <= *last)
    }
}

impl<K> Default for EvictionState<K>
where
    K: Ord + Copy + Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for EvictionState<K> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Debug> Debug for EvictionState<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("EvictionState")
            .field("last_evicted", &inner.last_evicted)
            .field("pending_slots", &inner.events.keys().collect::<Vec<_>>())
            .finish()
    }
}
