//! Fixed-capacity circular buffer with overwrite-oldest semantics.
//!
//! [`BoundedRing`] backs three different queues in the logger: the worker
//! pool's pending tasks, the producer/consumer hand-off queue and the record
//! store's buffer. It never grows, never blocks and never panics for capacity
//! reasons; a push into a full ring replaces the oldest element and reports
//! the loss through its return value.
//!
//! # Thread Safety
//!
//! The ring carries no lock. A ring shared between threads must live behind a
//! single external lock (see `tlm-pool` and the pipeline orchestrator); a ring
//! owned by one thread pays nothing for synchronization it does not need.
//!
//! # Layout
//!
//! `head` is the next write slot and `count` the number of live elements, so
//! the oldest element sits at `(head + capacity - count) % capacity`.

use crate::error::{TlmError, TlmResult};

/// Fixed-capacity FIFO that overwrites its oldest element when full.
#[derive(Debug)]
pub struct BoundedRing<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    count: usize,
}

impl<T> BoundedRing<T> {
    /// Create an empty ring holding at most `capacity` elements.
    ///
    /// # Errors
    /// Returns [`TlmError::ZeroCapacity`] if `capacity` is 0.
    pub fn new(capacity: usize) -> TlmResult<Self> {
        if capacity == 0 {
            return Err(TlmError::ZeroCapacity { what: "ring" });
        }
        let slots: Box<[Option<T>]> = (0..capacity).map(|_| None).collect();
        Ok(Self {
            slots,
            head: 0,
            count: 0,
        })
    }

    /// Push `value`, overwriting the oldest element if the ring is full.
    ///
    /// Returns `false` when an element was lost to make room.
    pub fn push(&mut self, value: T) -> bool {
        self.push_displacing(value).is_none()
    }

    /// Push `value` and hand back the element it displaced, if any.
    pub fn push_displacing(&mut self, value: T) -> Option<T> {
        let capacity = self.capacity();
        let displaced = if self.is_full() {
            // head == tail when full
            self.slots[self.head].take()
        } else {
            self.count += 1;
            None
        };
        self.slots[self.head] = Some(value);
        self.head = (self.head + 1) % capacity;
        displaced
    }

    /// Push `value` only if there is room; otherwise return it untouched.
    pub fn try_push(&mut self, value: T) -> Result<(), T> {
        if self.is_full() {
            return Err(value);
        }
        self.push_displacing(value);
        Ok(())
    }

    /// Remove and return the oldest element.
    pub fn pop(&mut self) -> Option<T> {
        if self.count == 0 {
            return None;
        }
        let tail = self.tail();
        self.count -= 1;
        self.slots[tail].take()
    }

    /// Number of live elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// `true` when no element is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// `true` when the next `push` will overwrite the oldest element.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Maximum number of live elements, fixed at construction.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drop every element without notifying anyone.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
        self.head = 0;
        self.count = 0;
    }

    /// Pop every element, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.pop())
    }

    #[inline]
    fn tail(&self) -> usize {
        (self.head + self.capacity() - self.count) % self.capacity()
    }
}
