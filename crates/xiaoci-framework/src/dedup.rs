//! Duplicate suppression.
//!
//! Each event gets a [`DedupKey`] derived in priority order:
//!
//! ```text
//! native id present     → msg_{id}
//! card present          → ark_{appid}_{msg_seq}_{uin}
//! text present          → text_{conversation}_{first 50 chars}_{8 random hex}
//! otherwise             → other_{conversation}_{random uuid}
//! ```
//!
//! Only the first two are reproducible. The random parts keep the cache
//! populated for events that carry no usable identity, so plain-text and
//! unidentified frames without a native id are never deduplicated.
//!
//! [`DedupCache`] is an insertion-ordered set. When it grows past its
//! capacity it drops the oldest entries until half the capacity remains.

use std::fmt;

use indexmap::IndexSet;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;
use xiaoci_core::Event;

/// Default cache capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Number of text characters that go into a text-derived key.
const TEXT_KEY_CHARS: usize = 50;

/// Which rule produced a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySource {
    Native,
    Card,
    Text,
    Other,
}

impl KeySource {
    /// Returns true if the same frame always yields the same key.
    pub fn is_reproducible(&self) -> bool {
        matches!(self, KeySource::Native | KeySource::Card)
    }
}

/// The identity an event is deduplicated by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    source: KeySource,
    key: String,
}

impl DedupKey {
    /// Derives the key for an event.
    pub fn derive(event: &Event) -> Self {
        if let Some(id) = event.native_id {
            return Self {
                source: KeySource::Native,
                key: format!("msg_{id}"),
            };
        }

        if let Some(card) = &event.card {
            let extra = card.get("extra");
            let field = |name: &str| extra.map(|e| extra_field(e, name)).unwrap_or_default();
            return Self {
                source: KeySource::Card,
                key: format!(
                    "ark_{}_{}_{}",
                    field("appid"),
                    field("msg_seq"),
                    field("uin")
                ),
            };
        }

        if !event.text.is_empty() {
            let prefix: String = event.text.chars().take(TEXT_KEY_CHARS).collect();
            let nonce = Uuid::new_v4().simple().to_string();
            return Self {
                source: KeySource::Text,
                key: format!("text_{}_{}_{}", event.conversation_id, prefix, &nonce[..8]),
            };
        }

        Self {
            source: KeySource::Other,
            key: format!("other_{}_{}", event.conversation_id, Uuid::new_v4()),
        }
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

fn extra_field(extra: &Value, name: &str) -> String {
    match extra.get(name) {
        Some(Value::String(s)) => s.clone(),
        None | Some(Value::Null) => String::new(),
        Some(other) => other.to_string(),
    }
}

// ============================================================================
// DedupCache
// ============================================================================

/// A bounded, insertion-ordered set of seen keys.
pub struct DedupCache {
    entries: Mutex<IndexSet<DedupKey>>,
    capacity: usize,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl DedupCache {
    /// Creates a cache. Capacities below 2 are raised to 2.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            entries: Mutex::new(IndexSet::with_capacity(capacity + 1)),
            capacity,
        }
    }

    /// Test-and-insert. Returns true if `key` was already present.
    pub fn seen(&self, key: &DedupKey) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains(key) {
            return true;
        }
        entries.insert(key.clone());

        if entries.len() > self.capacity {
            let evict = entries.len() - self.capacity / 2;
            entries.drain(..evict);
            debug!(
                evicted = evict,
                remaining = entries.len(),
                "Dedup cache over capacity, evicted oldest keys"
            );
        }
        false
    }

    /// Returns true if `key` is present, without inserting it.
    pub fn contains(&self, key: &DedupKey) -> bool {
        self.entries.lock().contains(key)
    }

    /// Removes every key.
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "Dedup cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl fmt::Debug for DedupCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(n: usize) -> DedupKey {
        DedupKey {
            source: KeySource::Native,
            key: format!("msg_{n}"),
        }
    }

    #[test]
    fn test_native_id_key() {
        let event = Event {
            native_id: Some(42),
            text: "hi".into(),
            card: Some(json!({})),
            ..Default::default()
        };
        let k = DedupKey::derive(&event);
        assert_eq!(k.as_str(), "msg_42");
        assert_eq!(k.source(), KeySource::Native);
        assert_eq!(k, DedupKey::derive(&event));
    }

    #[test]
    fn test_card_key_reads_extra() {
        let event = Event {
            card: Some(json!({"extra": {"appid": 100951776, "msg_seq": "7", "uin": 3204461757_i64}})),
            ..Default::default()
        };
        assert_eq!(
            DedupKey::derive(&event).as_str(),
            "ark_100951776_7_3204461757"
        );

        let bare = Event {
            card: Some(json!({"app": "x"})),
            ..Default::default()
        };
        let k = DedupKey::derive(&bare);
        assert_eq!(k.as_str(), "ark___");
        assert!(k.source().is_reproducible());
    }

    #[test]
    fn test_text_key_is_randomized() {
        let event = Event {
            conversation_id: 9,
            text: "字".repeat(80),
            ..Default::default()
        };
        let a = DedupKey::derive(&event);
        let b = DedupKey::derive(&event);
        assert_eq!(a.source(), KeySource::Text);
        assert!(a.as_str().starts_with(&format!("text_9_{}_", "字".repeat(50))));
        assert_eq!(a.as_str().chars().count(), "text_9_".len() + 50 + 1 + 8);
        assert_ne!(a, b);
        assert!(!a.source().is_reproducible());
    }

    #[test]
    fn test_other_key() {
        let event = Event {
            conversation_id: 3,
            ..Default::default()
        };
        let k = DedupKey::derive(&event);
        assert_eq!(k.source(), KeySource::Other);
        assert!(k.as_str().starts_with("other_3_"));
        assert_eq!(k.as_str().len(), "other_3_".len() + 36);
    }

    #[test]
    fn test_seen_is_test_and_insert() {
        let cache = DedupCache::new(10);
        assert!(!cache.seen(&key(1)));
        assert!(cache.seen(&key(1)));
        assert!(cache.contains(&key(1)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_overflow_evicts_oldest_to_half() {
        let cache = DedupCache::new(1000);
        for n in 0..=1000 {
            assert!(!cache.seen(&key(n)));
        }
        assert_eq!(cache.len(), 500);
        assert!(!cache.contains(&key(0)));
        assert!(!cache.contains(&key(500)));
        assert!(cache.contains(&key(501)));
        assert!(cache.contains(&key(1000)));
    }

    #[test]
    fn test_population_never_exceeds_capacity() {
        let cache = DedupCache::new(7);
        for n in 0..100 {
            cache.seen(&key(n));
            assert!(cache.len() <= 7);
        }
        assert!(cache.contains(&key(99)));
    }

    #[test]
    fn test_tiny_capacity_is_clamped() {
        let cache = DedupCache::new(0);
        assert_eq!(cache.capacity(), 2);
        cache.seen(&key(1));
        cache.seen(&key(2));
        cache.seen(&key(3));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&key(3)));
    }

    #[test]
    fn test_clear() {
        let cache = DedupCache::default();
        cache.seen(&key(1));
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.seen(&key(1)));
    }
}
