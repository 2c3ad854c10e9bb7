//! Weak-keyed caches of derived resources.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

struct Entry<K, V> {
    key: Weak<K>,
    value: V,
}

/// Maps a shared source asset to a resource derived from it.
///
/// Keys are identified by their `Arc` allocation, not by value, and the cache
/// only holds a [`Weak`] to them. Once the last `Arc` to a source asset is
/// dropped its entry goes stale and is expunged on the next access, dropping
/// the derived value with it. A new asset that happens to reuse the address
/// is a miss, because the stale `Weak` no longer upgrades.
pub struct WeakResourceCache<K, V> {
    entries: Mutex<HashMap<usize, Entry<K, V>>>,
}

impl<K, V: Clone> WeakResourceCache<K, V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up the value derived from `key`.
    pub fn get(&self, key: &Arc<K>) -> Option<V> {
        let mut entries = self.entries.lock();
        expunge(&mut entries);
        entries
            .get(&address(key))
            .filter(|entry| entry.key.as_ptr() == Arc::as_ptr(key))
            .map(|entry| entry.value.clone())
    }

    /// Store the value derived from `key`, replacing any previous one.
    pub fn insert(&self, key: &Arc<K>, value: V) {
        let mut entries = self.entries.lock();
        expunge(&mut entries);
        entries.insert(
            address(key),
            Entry {
                key: Arc::downgrade(key),
                value,
            },
        );
    }

    /// Return the cached value for `key`, deriving and storing it on a miss.
    ///
    /// Derivation runs without the cache lock held. Failures are returned to
    /// the caller and not cached. If another thread stored a value for the
    /// same key meanwhile, that value wins and the fresh one is dropped.
    pub fn get_or_create<E>(
        &self,
        key: &Arc<K>,
        derive: impl FnOnce(&K) -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let value = derive(key)?;

        let mut entries = self.entries.lock();
        let entry = entries.entry(address(key)).or_insert_with(|| Entry {
            key: Arc::downgrade(key),
            value: value.clone(),
        });
        if entry.key.strong_count() == 0 {
            *entry = Entry {
                key: Arc::downgrade(key),
                value: value.clone(),
            };
        }
        Ok(entry.value.clone())
    }

    /// Number of entries whose source asset is still alive.
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        expunge(&mut entries);
        entries.len()
    }

    /// Returns true if no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove the entries whose source asset is gone, returning how many.
    ///
    /// The stale values are dropped after the cache lock is released.
    pub fn purge(&self) -> usize {
        let stale: Vec<V> = {
            let mut entries = self.entries.lock();
            let dead: Vec<usize> = entries
                .iter()
                .filter(|(_, entry)| entry.key.strong_count() == 0)
                .map(|(address, _)| *address)
                .collect();
            dead.iter()
                .filter_map(|address| entries.remove(address))
                .map(|entry| entry.value)
                .collect()
        };
        stale.len()
    }

    /// Drop every entry. Used on teardown.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl<K, V: Clone> Default for WeakResourceCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for WeakResourceCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakResourceCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

fn address<K>(key: &Arc<K>) -> usize {
    Arc::as_ptr(key) as usize
}

fn expunge<K, V>(entries: &mut HashMap<usize, Entry<K, V>>) {
    entries.retain(|_, entry| entry.key.strong_count() > 0);
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_hit_returns_same_value() {
        let cache = WeakResourceCache::<String, Arc<u32>>::new();
        let key = Arc::new("checker".to_string());
        let calls = AtomicUsize::new(0);

        let derive = |_: &String| -> Result<_, Infallible> {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok(Arc::new(7))
        };
        let first = cache.get_or_create(&key, derive).unwrap();
        let second = cache.get_or_create(&key, derive).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_equal_but_distinct_key_misses() {
        let cache = WeakResourceCache::<String, u32>::new();
        let a = Arc::new("image".to_string());
        let b = Arc::new("image".to_string());

        cache.insert(&a, 1);
        assert_eq!(cache.get(&a), Some(1));
        assert_eq!(cache.get(&b), None);
    }

    #[test]
    fn test_dead_key_is_expunged() {
        let cache = WeakResourceCache::<String, Arc<u32>>::new();
        let value = Arc::new(5);
        let key = Arc::new("transient".to_string());
        cache.insert(&key, Arc::clone(&value));
        assert_eq!(Arc::strong_count(&value), 2);

        drop(key);
        assert!(cache.is_empty());
        assert_eq!(Arc::strong_count(&value), 1);

        let replacement = Arc::new("transient".to_string());
        let derived = cache
            .get_or_create(&replacement, |_| Ok::<_, Infallible>(Arc::new(6)))
            .unwrap();
        assert_eq!(*derived, 6);
    }

    #[test]
    fn test_purge_drops_stale_values() {
        let cache = WeakResourceCache::<String, Arc<u32>>::new();
        let value = Arc::new(3);
        let kept = Arc::new("kept".to_string());
        let gone = Arc::new("gone".to_string());
        cache.insert(&kept, Arc::new(1));
        cache.insert(&gone, Arc::clone(&value));

        assert_eq!(cache.purge(), 0);
        drop(gone);
        assert_eq!(cache.purge(), 1);
        assert_eq!(Arc::strong_count(&value), 1);
        assert_eq!(cache.get(&kept).as_deref(), Some(&1));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = WeakResourceCache::<u32, u32>::new();
        let key = Arc::new(1);
        assert!(cache.get_or_create(&key, |_| Err("no budget")).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_create(&key, |k| Ok::<_, ()>(*k + 1)), Ok(2));
    }
}
