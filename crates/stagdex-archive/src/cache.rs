use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

type Slot<V> = Arc<Mutex<Option<Arc<V>>>>;

/// Insert-on-miss memo table keyed by record id.
///
/// Each id owns a slot with its own lock, so concurrent first accesses to
/// the same id serialize on that slot and parse once, while different ids
/// fill in parallel. A failed fill leaves the slot empty. Entries are never
/// evicted.
pub(crate) struct LazyCache<V> {
    slots: Mutex<FxHashMap<u32, Slot<V>>>,
}

impl<V> Default for LazyCache<V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(FxHashMap::default()),
        }
    }
}

impl<V> LazyCache<V> {
    fn slot(&self, id: u32) -> Slot<V> {
        self.slots.lock().entry(id).or_default().clone()
    }

    /// Cached value for `id`, or the result of `fill` stored for next time.
    pub(crate) fn get_or_try_fill<E>(
        &self,
        id: u32,
        fill: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        let slot = self.slot(id);
        let mut guard = slot.lock();
        if let Some(v) = guard.as_ref() {
            return Ok(v.clone());
        }
        let v = Arc::new(fill()?);
        *guard = Some(v.clone());
        Ok(v)
    }

    /// Cached value without filling
    #[cfg(test)]
    pub(crate) fn get(&self, id: u32) -> Option<Arc<V>> {
        let slot = self.slots.lock().get(&id)?.clone();
        let guard = slot.lock();
        guard.clone()
    }

    /// Number of filled entries
    pub(crate) fn len(&self) -> usize {
        let slots: Vec<Slot<V>> = self.slots.lock().values().cloned().collect();
        slots.iter().filter(|s| s.lock().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fills_once() {
        let cache = LazyCache::<u32>::default();
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let v = cache
                .get_or_try_fill(7, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(49)
                })
                .unwrap();
            assert_eq!(*v, 49);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failure_leaves_no_entry() {
        let cache = LazyCache::<u32>::default();
        assert!(cache.get_or_try_fill(1, || Err::<u32, _>("bad")).is_err());
        assert!(cache.get(1).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(*cache.get_or_try_fill(1, || Ok::<_, ()>(2)).unwrap(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_first_access_fills_once() {
        let cache = LazyCache::<u64>::default();
        let calls = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    let v = cache
                        .get_or_try_fill(3, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(10));
                            Ok::<_, ()>(9)
                        })
                        .unwrap();
                    assert_eq!(*v, 9);
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
