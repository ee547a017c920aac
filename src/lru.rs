//! Byte-budgeted LRU cache.
//!
//! Backs the process-wide tree-entry cache: values report their charged
//! byte count through the [`Sizer`] trait, the cache evicts
//! least-recently-used entries until the total charge fits the budget, and
//! eviction has no side effect beyond dropping the value.
//!
//! # Layout
//! - Entries live in a slab (`Vec`) threaded into an intrusive
//!   doubly-linked recency list; the key-to-slot map is an `AHashMap`.
//! - `get` and `insert` are O(1); pruning is O(evicted).
//!
//! # Invariants
//! - `used() <= capacity()` after every `insert` returns.
//! - Every evicted entry's `size()` is debited from the running total.
//! - Replacing a key's value re-charges the new size and prunes.

use std::hash::Hash;

use ahash::AHashMap;

/// Capability for values that report their charged byte count.
pub trait Sizer {
    /// Returns the number of budget units this value charges.
    fn size(&self) -> usize;
}

/// Sentinel slot index for list ends.
const NIL: usize = usize::MAX;

#[derive(Debug)]
struct Slot<K, V> {
    key: K,
    value: V,
    size: usize,
    prev: usize,
    next: usize,
}

/// An LRU cache bounded by a byte budget rather than an entry count.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    used: usize,
    map: AHashMap<K, usize>,
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Sizer,
{
    /// Creates a cache with the given byte budget.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: 0,
            map: AHashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Returns the configured byte budget.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the total charged bytes currently held.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    /// Returns the number of cached entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the cache holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Looks up a value, marking it most recently used on hit.
    ///
    /// Accepts any borrowed form of the key, so `Box<[u8]>` keys can be
    /// probed with a plain byte slice.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: std::borrow::Borrow<Q>,
        Q: std::hash::Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.unlink(idx);
        self.push_front(idx);
        Some(&self.slots[idx].value)
    }

    /// Inserts or replaces a value, then prunes to the byte budget.
    ///
    /// A replaced key keeps its slot but is re-charged with the new value's
    /// size. The inserted entry itself may be evicted immediately if its
    /// size alone exceeds the budget.
    pub fn insert(&mut self, key: K, value: V) {
        let size = value.size();

        if let Some(&idx) = self.map.get(&key) {
            let slot = &mut self.slots[idx];
            self.used = self.used - slot.size + size;
            slot.value = value;
            slot.size = size;
            self.unlink(idx);
            self.push_front(idx);
            self.prune();
            return;
        }

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Slot {
                    key: key.clone(),
                    value,
                    size,
                    prev: NIL,
                    next: NIL,
                };
                idx
            }
            None => {
                self.slots.push(Slot {
                    key: key.clone(),
                    value,
                    size,
                    prev: NIL,
                    next: NIL,
                });
                self.slots.len() - 1
            }
        };

        self.map.insert(key, idx);
        self.used += size;
        self.push_front(idx);
        self.prune();
    }

    /// Evicts least-recently-used entries until the budget is respected.
    fn prune(&mut self) {
        while self.used > self.capacity {
            let idx = self.tail;
            if idx == NIL {
                return;
            }
            self.unlink(idx);
            self.map.remove(&self.slots[idx].key);
            self.used -= self.slots[idx].size;
            self.free.push(idx);
        }
    }

    /// Detaches a slot from the recency list.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        if prev != NIL {
            self.slots[prev].next = next;
        } else if self.head == idx {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].prev = prev;
        } else if self.tail == idx {
            self.tail = prev;
        }
        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
    }

    /// Links a slot at the most-recently-used end.
    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }
}
