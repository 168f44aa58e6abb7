//! In-memory portfolio state store.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::item::{default_portfolio, PortfolioItem};

/// Holds the authoritative ordered item sequence.
///
/// `replace` swaps the whole sequence in one step; readers always observe a
/// complete snapshot, never a partially applied update. The sync reconciler
/// is the only remote-side writer, the admin editor the only local one.
#[derive(Debug)]
pub struct PortfolioStore {
    items: RwLock<Vec<PortfolioItem>>,
}

impl PortfolioStore {
    /// Create a store seeded with the clinic's default portfolio.
    pub fn new() -> Self {
        Self::with_items(default_portfolio())
    }

    /// Create a store with an explicit starting sequence.
    pub fn with_items(items: Vec<PortfolioItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    /// Current snapshot of the portfolio.
    pub fn get(&self) -> Vec<PortfolioItem> {
        self.read().clone()
    }

    /// Atomically swap the whole sequence.
    pub fn replace(&self, items: Vec<PortfolioItem>) {
        *self.write() = items;
    }

    /// Number of items currently held.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // A writer can only panic between acquiring the guard and the single
    // assignment in `replace`, which leaves the previous complete sequence
    // in place; the poisoned guard is still a valid snapshot.
    fn read(&self) -> RwLockReadGuard<'_, Vec<PortfolioItem>> {
        match self.items.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<PortfolioItem>> {
        match self.items.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for PortfolioStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::PortfolioItem;

    #[test]
    fn new_store_holds_default_portfolio() {
        let store = PortfolioStore::new();
        assert_eq!(store.len(), 6);
        assert_eq!(store.get()[0].title, "Veneers");
    }

    #[test]
    fn replace_swaps_whole_sequence() {
        let store = PortfolioStore::new();
        let items = vec![PortfolioItem::new(10, "Bonding", "Repair", "https://x/b.jpg")];
        store.replace(items.clone());
        assert_eq!(store.get(), items);
    }

    #[test]
    fn snapshots_are_detached_from_later_replaces() {
        let store = PortfolioStore::new();
        let before = store.get();
        store.replace(Vec::new());
        assert_eq!(before.len(), 6);
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_readers_see_complete_sequences() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(PortfolioStore::new());
        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for n in 0..100 {
                    let items = (0..n)
                        .map(|i| PortfolioItem::new(i, "T", "S", "https://x"))
                        .collect();
                    store.replace(items);
                }
            })
        };

        // Every observed snapshot must match some single replace argument:
        // n items with ids 0..n, in order.
        for _ in 0..100 {
            let snapshot = store.get();
            for (pos, item) in snapshot.iter().enumerate() {
                assert_eq!(item.id, pos as i64);
            }
        }
        writer.join().unwrap();
    }
}
