//! Intrusive List Module
//!
//! Doubly linked list over arena slots. Links are slot indices stored in
//! the slots themselves, so linking and unlinking never allocates.
//!
//! ```text
//!   arena:  [0] [1] [2] [3]
//!   head ─► [2] ◄──► [0] ◄──► [3] ◄── tail
//! ```
//!
//! Every slot records which list owns it. Unlinking a slot from a list
//! that does not own it means the cache state is torn; that panics.

use std::fmt;

// == List Kind ==
/// Identifies which of the two lists a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListKind {
    /// Slots not holding an entry
    Free,
    /// Slots in use, front = most recently used
    Lru,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListKind::Free => f.write_str("free"),
            ListKind::Lru => f.write_str("lru"),
        }
    }
}

// == Links ==
/// Link fields embedded in each slot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    pub prev: Option<usize>,
    pub next: Option<usize>,
    /// List currently holding the slot, `None` while unlinked
    pub owner: Option<ListKind>,
}

/// Access to the link fields of an arena slot.
pub(crate) trait Linked {
    fn links(&self) -> &Links;
    fn links_mut(&mut self) -> &mut Links;
}

// == Intrusive List ==
/// Head/tail bookkeeping for one list threaded through an arena.
///
/// The list does not own the slots; every operation takes the arena.
#[derive(Debug)]
pub(crate) struct IntrusiveList {
    kind: ListKind,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl IntrusiveList {
    // == Constructor ==
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Length ==
    pub fn len(&self) -> usize {
        self.len
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot at the front of the list.
    pub fn front(&self) -> Option<usize> {
        self.head
    }

    /// Slot at the back of the list.
    pub fn back(&self) -> Option<usize> {
        self.tail
    }

    /// Returns true if `slot` is linked on this list.
    pub fn owns<N: Linked>(&self, nodes: &[N], slot: usize) -> bool {
        nodes[slot].links().owner == Some(self.kind)
    }

    // == Push Front ==
    /// Links an unlinked slot at the front.
    pub fn push_front<N: Linked>(&mut self, nodes: &mut [N], slot: usize) {
        self.claim(nodes, slot);
        let old_head = self.head;
        {
            let links = nodes[slot].links_mut();
            links.prev = None;
            links.next = old_head;
        }
        match old_head {
            Some(head) => nodes[head].links_mut().prev = Some(slot),
            None => self.tail = Some(slot),
        }
        self.head = Some(slot);
        self.len += 1;
    }

    // == Push Back ==
    /// Links an unlinked slot at the back.
    pub fn push_back<N: Linked>(&mut self, nodes: &mut [N], slot: usize) {
        self.claim(nodes, slot);
        let old_tail = self.tail;
        {
            let links = nodes[slot].links_mut();
            links.prev = old_tail;
            links.next = None;
        }
        match old_tail {
            Some(tail) => nodes[tail].links_mut().next = Some(slot),
            None => self.head = Some(slot),
        }
        self.tail = Some(slot);
        self.len += 1;
    }

    // == Remove ==
    /// Unlinks `slot` from this list.
    ///
    /// # Panics
    /// If `slot` is not linked on this list.
    pub fn remove<N: Linked>(&mut self, nodes: &mut [N], slot: usize) {
        let links = *nodes[slot].links();
        if links.owner != Some(self.kind) {
            panic!(
                "slot {} is not on the {} list (owner: {:?})",
                slot, self.kind, links.owner
            );
        }

        match links.prev {
            Some(prev) => nodes[prev].links_mut().next = links.next,
            None => self.head = links.next,
        }
        match links.next {
            Some(next) => nodes[next].links_mut().prev = links.prev,
            None => self.tail = links.prev,
        }

        *nodes[slot].links_mut() = Links::default();
        self.len -= 1;
    }

    // == Move To Front ==
    /// Moves a slot already on this list to the front.
    pub fn move_to_front<N: Linked>(&mut self, nodes: &mut [N], slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.remove(nodes, slot);
        self.push_front(nodes, slot);
    }

    /// Iterates slots from front to back.
    pub fn iter<'a, N: Linked>(&self, nodes: &'a [N]) -> Iter<'a, N> {
        Iter {
            nodes,
            current: self.head,
        }
    }

    fn claim<N: Linked>(&self, nodes: &mut [N], slot: usize) {
        let links = nodes[slot].links_mut();
        if let Some(owner) = links.owner {
            panic!(
                "slot {} is already on the {} list, cannot link onto {}",
                slot, owner, self.kind
            );
        }
        links.owner = Some(self.kind);
    }

    pub fn debug_validate_invariants<N: Linked>(&self, nodes: &[N]) {
        if self.head.is_none() || self.tail.is_none() {
            assert!(self.head.is_none());
            assert!(self.tail.is_none());
            assert_eq!(self.len, 0);
            return;
        }

        let mut count = 0usize;
        let mut prev = None;
        let mut current = self.head;

        while let Some(slot) = current {
            let links = nodes[slot].links();
            assert_eq!(links.owner, Some(self.kind), "slot {} owner", slot);
            assert_eq!(links.prev, prev, "slot {} prev link", slot);
            if links.next.is_none() {
                assert_eq!(self.tail, Some(slot));
            }

            prev = Some(slot);
            current = links.next;
            count += 1;
            assert!(count <= self.len, "{} list longer than its length", self.kind);
        }

        assert_eq!(count, self.len);
    }
}

/// Front-to-back iterator over the slots of an [`IntrusiveList`].
pub(crate) struct Iter<'a, N> {
    nodes: &'a [N],
    current: Option<usize>,
}

impl<N: Linked> Iterator for Iter<'_, N> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.current?;
        self.current = self.nodes[slot].links().next;
        Some(slot)
    }
}
