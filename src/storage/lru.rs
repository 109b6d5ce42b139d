//! LRU recency index.
//!
//! An ordered sequence of keys: front = most recently used, back =
//! least recently used. Implemented as a doubly linked list over an
//! index-based node pool, with a key-to-slot map on the side, so
//! `touch`, `remove`, and `pop_back` are all O(1). Freed slots go on a
//! free list and are reused by later inserts.

use bytes::Bytes;
use std::collections::HashMap;

/// Absent-link sentinel for `prev`/`next`/`head`/`tail`.
const NIL: usize = usize::MAX;

struct LruNode {
    key: Bytes,
    prev: usize,
    next: usize,
}

/// O(1) least-recently-used index over binary-safe keys.
pub struct LruIndex {
    slots: Vec<Option<LruNode>>,
    map: HashMap<Bytes, usize>,
    head: usize,
    tail: usize,
    free: Vec<usize>,
}

impl LruIndex {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            map: HashMap::new(),
            head: NIL,
            tail: NIL,
            free: Vec::new(),
        }
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains(&self, key: &Bytes) -> bool {
        self.map.contains_key(key)
    }

    /// Marks `key` as most recently used, inserting it if absent.
    pub fn touch(&mut self, key: &Bytes) {
        if let Some(&idx) = self.map.get(key) {
            if self.head == idx {
                return;
            }
            self.unlink(idx);
            self.link_front(idx);
        } else {
            let idx = self.alloc(key.clone());
            self.map.insert(key.clone(), idx);
            self.link_front(idx);
        }
    }

    /// Pops and returns the least recently used key, if any.
    pub fn pop_back(&mut self) -> Option<Bytes> {
        if self.tail == NIL {
            return None;
        }
        let idx = self.tail;
        self.unlink(idx);
        let node = self.release(idx);
        self.map.remove(&node.key);
        Some(node.key)
    }

    /// Drops `key` from the index. Returns whether it was present.
    pub fn remove(&mut self, key: &Bytes) -> bool {
        match self.map.remove(key) {
            Some(idx) => {
                self.unlink(idx);
                self.release(idx);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.map.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Front-to-back key order. Test and debugging aid.
    #[cfg(test)]
    fn order(&self) -> Vec<Bytes> {
        let mut keys = Vec::with_capacity(self.len());
        let mut idx = self.head;
        while idx != NIL {
            let node = self.slots[idx].as_ref().expect("linked slot is occupied");
            keys.push(node.key.clone());
            idx = node.next;
        }
        keys
    }

    fn alloc(&mut self, key: Bytes) -> usize {
        let node = LruNode {
            key,
            prev: NIL,
            next: NIL,
        };
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> LruNode {
        let node = self.slots[idx].take().expect("released slot is occupied");
        self.free.push(idx);
        node
    }

    /// Detaches `idx` from its neighbors without freeing the slot.
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.slots[idx].as_ref().expect("unlinked slot is occupied");
            (node.prev, node.next)
        };

        match prev {
            NIL => self.head = next,
            p => {
                if let Some(n) = self.slots[p].as_mut() {
                    n.next = next;
                }
            }
        }
        match next {
            NIL => self.tail = prev,
            n => {
                if let Some(node) = self.slots[n].as_mut() {
                    node.prev = prev;
                }
            }
        }

        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = NIL;
            node.next = NIL;
        }
    }

    fn link_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = NIL;
            node.next = old_head;
        }
        if old_head != NIL {
            if let Some(node) = self.slots[old_head].as_mut() {
                node.prev = idx;
            }
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }
}

impl Default for LruIndex {
    fn default() -> Self {
        Self::new()
    }
}
