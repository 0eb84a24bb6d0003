//! Shared bounded queue
//!
//! Fixed-capacity FIFO ring buffer shared between workers. One slot is
//! always kept empty, so a queue of capacity `N` holds at most `N - 1`
//! items. Every operation takes the queue's own lock once and never
//! awaits while holding it.
//!
//! Push inserts the longest prefix that fits and hands the rest back in
//! [`QueueFull`], so callers can retry or log the remainder.

use parking_lot::Mutex;
use shared::models::QueueItem;
use std::sync::Arc;
use thiserror::Error;

/// Push did not fit entirely; `rejected` holds the items left out, in order
#[derive(Debug, Error, PartialEq)]
#[error("queue full: {} item(s) rejected", .rejected.len())]
pub struct QueueFull<T> {
    pub rejected: Vec<T>,
}

struct Ring<T> {
    slots: Vec<Option<T>>,
    head: usize,
    tail: usize,
}

impl<T> Ring<T> {
    fn cap(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        (self.tail + self.cap() - self.head) % self.cap()
    }

    fn is_full(&self) -> bool {
        (self.tail + 1) % self.cap() == self.head
    }

    fn push_back(&mut self, item: T) {
        self.slots[self.tail] = Some(item);
        self.tail = (self.tail + 1) % self.cap();
    }

    fn pop_front(&mut self) -> Option<T> {
        if self.head == self.tail {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % self.cap();
        item
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        let cap = self.cap();
        (0..self.len()).filter_map(move |i| self.slots[(self.head + i) % cap].as_ref())
    }
}

/// Handle to a shared bounded queue; clones share the same buffer
pub struct SharedQueue<T = QueueItem> {
    inner: Arc<Mutex<Ring<T>>>,
    dedup: bool,
}

impl<T> Clone for SharedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            dedup: self.dedup,
        }
    }
}

impl<T> std::fmt::Debug for SharedQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedQueue")
            .field("capacity", &self.capacity())
            .field("size", &self.size())
            .field("dedup", &self.dedup)
            .finish()
    }
}

impl<T: Clone + PartialEq> SharedQueue<T> {
    /// Queue with `capacity` slots (at least 2)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            inner: Arc::new(Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                head: 0,
                tail: 0,
            })),
            dedup: false,
        }
    }

    /// Queue that skips items already present
    pub fn with_dedup(capacity: usize) -> Self {
        Self {
            dedup: true,
            ..Self::new(capacity)
        }
    }

    /// Append items in order. Duplicates are skipped when dedup is on.
    ///
    /// Returns the number inserted, or [`QueueFull`] with the items that
    /// did not fit (everything before them was inserted).
    pub fn push<I>(&self, items: I) -> Result<usize, QueueFull<T>>
    where
        I: IntoIterator<Item = T>,
    {
        let mut ring = self.inner.lock();
        let mut inserted = 0;
        let mut items = items.into_iter();

        while let Some(item) = items.next() {
            if self.dedup && ring.iter().any(|existing| *existing == item) {
                continue;
            }
            if ring.is_full() {
                let mut rejected = vec![item];
                rejected.extend(items.by_ref());
                return Err(QueueFull { rejected });
            }
            ring.push_back(item);
            inserted += 1;
        }
        Ok(inserted)
    }

    /// Pop the oldest item
    pub fn shift(&self) -> Option<T> {
        self.inner.lock().pop_front()
    }

    /// Drain everything, oldest first
    pub fn shift_all(&self) -> Vec<T> {
        let mut ring = self.inner.lock();
        let mut out = Vec::with_capacity(ring.len());
        while let Some(item) = ring.pop_front() {
            out.push(item);
        }
        out
    }

    /// Drain at most `n` oldest items
    pub fn shift_up_to(&self, n: usize) -> Vec<T> {
        let mut ring = self.inner.lock();
        let take = n.min(ring.len());
        let mut out = Vec::with_capacity(take);
        for _ in 0..take {
            if let Some(item) = ring.pop_front() {
                out.push(item);
            }
        }
        out
    }

    /// Snapshot without removing anything
    pub fn get_all(&self) -> Vec<T> {
        self.inner.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut ring = self.inner.lock();
        ring.slots.iter_mut().for_each(|slot| *slot = None);
        ring.head = 0;
        ring.tail = 0;
    }
}

impl<T> SharedQueue<T> {
    pub fn size(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Slot count; usable capacity is one less
    pub fn capacity(&self) -> usize {
        self.inner.lock().cap()
    }

    /// Free room left: `capacity - 1 - size`
    pub fn spare(&self) -> usize {
        let ring = self.inner.lock();
        ring.cap() - 1 - ring.len()
    }
}
