//! Expiration Heap Module
//!
//! Binary min-heap of arena slots ordered by expiration time. Each slot
//! stores its own position in the heap, so a slot can be removed from the
//! middle in O(log n) when it is evicted or deleted before it expires.
//!
//! Every swap during sifting rewrites the position of both swapped slots.
//! A stored position that is out of bounds or points at another slot means
//! the cache state is torn; that panics.

use chrono::{DateTime, Utc};

/// Access to the heap bookkeeping of an arena slot.
pub(crate) trait HeapSlot {
    /// Expiration time; only slots with a deadline may enter the heap.
    fn deadline(&self) -> Option<DateTime<Utc>>;
    fn heap_index(&self) -> Option<usize>;
    fn set_heap_index(&mut self, index: Option<usize>);
}

// == Expiry Heap ==
/// Min-heap of slot indices, soonest deadline at the root.
#[derive(Debug)]
pub(crate) struct ExpiryHeap {
    slots: Vec<usize>,
}

impl ExpiryHeap {
    // == Constructor ==
    /// Creates a heap able to hold `capacity` slots without reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // == Peek ==
    /// Slot with the soonest deadline.
    pub fn peek(&self) -> Option<usize> {
        self.slots.first().copied()
    }

    // == Push ==
    /// Inserts a slot carrying a deadline. O(log n)
    ///
    /// # Panics
    /// If the slot has no deadline or is already in the heap.
    pub fn push<N: HeapSlot>(&mut self, nodes: &mut [N], slot: usize) {
        let node = &mut nodes[slot];
        assert!(
            node.deadline().is_some(),
            "slot {} has no deadline and cannot enter the expiration heap",
            slot
        );
        if let Some(pos) = node.heap_index() {
            panic!("slot {} is already in the expiration heap at {}", slot, pos);
        }

        let pos = self.slots.len();
        self.slots.push(slot);
        node.set_heap_index(Some(pos));
        self.sift_up(nodes, pos);
    }

    // == Remove ==
    /// Removes a slot from wherever it sits in the heap. O(log n)
    ///
    /// # Panics
    /// If the slot's stored position does not point back at it.
    pub fn remove<N: HeapSlot>(&mut self, nodes: &mut [N], slot: usize) {
        let pos = match nodes[slot].heap_index() {
            Some(pos) => pos,
            None => panic!("slot {} is not in the expiration heap", slot),
        };
        if pos >= self.slots.len() || self.slots[pos] != slot {
            panic!(
                "slot {} has heap index {} but heap holds {:?} there (len {})",
                slot,
                pos,
                self.slots.get(pos),
                self.slots.len()
            );
        }

        let last = self.slots.len() - 1;
        if pos != last {
            self.swap(nodes, pos, last);
        }
        self.slots.pop();
        nodes[slot].set_heap_index(None);

        if pos < self.slots.len() && !self.sift_down(nodes, pos) {
            self.sift_up(nodes, pos);
        }
    }

    fn less<N: HeapSlot>(&self, nodes: &[N], a: usize, b: usize) -> bool {
        nodes[self.slots[a]].deadline() < nodes[self.slots[b]].deadline()
    }

    fn swap<N: HeapSlot>(&mut self, nodes: &mut [N], a: usize, b: usize) {
        self.slots.swap(a, b);
        nodes[self.slots[a]].set_heap_index(Some(a));
        nodes[self.slots[b]].set_heap_index(Some(b));
    }

    fn sift_up<N: HeapSlot>(&mut self, nodes: &mut [N], mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(nodes, pos, parent) {
                break;
            }
            self.swap(nodes, pos, parent);
            pos = parent;
        }
    }

    /// Returns true if the slot at `pos` moved down.
    fn sift_down<N: HeapSlot>(&mut self, nodes: &mut [N], start: usize) -> bool {
        let len = self.slots.len();
        let mut pos = start;
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(nodes, right, left) {
                right
            } else {
                left
            };
            if !self.less(nodes, child, pos) {
                break;
            }
            self.swap(nodes, pos, child);
            pos = child;
        }
        pos > start
    }

    pub fn debug_validate_invariants<N: HeapSlot>(&self, nodes: &[N]) {
        for (pos, &slot) in self.slots.iter().enumerate() {
            assert_eq!(
                nodes[slot].heap_index(),
                Some(pos),
                "slot {} back-reference",
                slot
            );
            assert!(nodes[slot].deadline().is_some(), "slot {} deadline", slot);
            if pos > 0 {
                let parent = (pos - 1) / 2;
                assert!(
                    nodes[self.slots[parent]].deadline() <= nodes[slot].deadline(),
                    "heap order violated at {}",
                    pos
                );
            }
        }
    }
}
