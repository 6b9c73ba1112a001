//! Per-item single-writer discipline.
//!
//! Every read-validate-write against an item runs while holding that item's
//! mutex. Different items never contend; multi-item operations take their
//! locks in ascending id order so they cannot deadlock each other.
//!
//! Entries live only while some caller holds or waits on them, so the table
//! stays proportional to in-flight work rather than to the catalogue.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use stockhold_core::ItemId;

#[derive(Debug, Default)]
pub struct ItemLocks {
    table: Mutex<HashMap<ItemId, Arc<Mutex<()>>>>,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, item_id: ItemId) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.entry(item_id).or_default().clone()
    }

    /// Drop the table entry once no other caller holds a handle to it.
    ///
    /// Handles are only handed out under the table lock, so a count of two
    /// (table plus ours) means nobody can be waiting on this mutex.
    fn release(&self, item_id: ItemId, lock: Arc<Mutex<()>>) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            table.remove(&item_id);
        }
    }

    /// Run `f` while holding the item's lock.
    pub fn with_item<T>(&self, item_id: ItemId, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(item_id);
        let out = {
            // Commits are atomic, so a poisoned lock guards no partial state.
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(item_id, lock);
        out
    }

    /// Run `f` while holding every listed item's lock.
    pub fn with_items<T>(&self, item_ids: &[ItemId], f: impl FnOnce() -> T) -> T {
        let mut ids = item_ids.to_vec();
        ids.sort();
        ids.dedup();

        let locks: Vec<Arc<Mutex<()>>> = ids.iter().map(|id| self.lock_for(*id)).collect();
        let out = {
            let _guards: Vec<MutexGuard<'_, ()>> = locks
                .iter()
                .map(|l| l.lock().unwrap_or_else(PoisonError::into_inner))
                .collect();
            f()
        };
        for (id, lock) in ids.into_iter().zip(locks) {
            self.release(id, lock);
        }
        out
    }

    /// Number of items currently locked or waited on.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn same_item_is_serialized() {
        let locks = Arc::new(ItemLocks::new());
        let item = ItemId::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        locks.with_item(item, || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            inside.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn overlapping_batches_do_not_deadlock() {
        let locks = Arc::new(ItemLocks::new());
        let a = ItemId::new();
        let b = ItemId::new();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let locks = locks.clone();
                let order = if i % 2 == 0 { vec![a, b] } else { vec![b, a, b] };
                thread::spawn(move || {
                    for _ in 0..100 {
                        locks.with_items(&order, || ());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(locks.is_empty());
    }

    #[test]
    fn entries_live_only_while_held() {
        let locks = ItemLocks::new();
        let a = ItemId::new();
        let b = ItemId::new();

        locks.with_item(a, || {
            assert_eq!(locks.len(), 1);
            locks.with_item(b, || assert_eq!(locks.len(), 2));
            assert_eq!(locks.len(), 1);
        });
        locks.with_items(&[b, a], || assert_eq!(locks.len(), 2));
        assert!(locks.is_empty());

        for _ in 0..1_000 {
            locks.with_item(ItemId::new(), || ());
        }
        assert!(locks.is_empty());
    }

    #[test]
    fn waiter_keeps_the_entry_alive() {
        let locks = Arc::new(ItemLocks::new());
        let item = ItemId::new();
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        let holder = {
            let locks = locks.clone();
            thread::spawn(move || {
                locks.with_item(item, || {
                    entered_tx.send(()).unwrap();
                    release_rx.recv().unwrap();
                })
            })
        };
        entered_rx.recv().unwrap();

        let inside = Arc::new(AtomicUsize::new(0));
        let waiter = {
            let locks = locks.clone();
            let inside = inside.clone();
            thread::spawn(move || locks.with_item(item, || inside.fetch_add(1, Ordering::SeqCst)))
        };
        thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(inside.load(Ordering::SeqCst), 0);
        assert_eq!(locks.len(), 1);

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        waiter.join().unwrap();
        assert_eq!(inside.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }
}
