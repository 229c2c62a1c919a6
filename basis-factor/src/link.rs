//! Count-bucketed doubly linked lists over a preallocated arena.
//!
//! Kernel columns and rows are kept in buckets keyed by their active
//! nonzero count so the pivot search can fetch minimum-count candidates
//! in O(1). Insert and delete are O(1) and allocate nothing.

/// Sentinel for "no entry".
pub(crate) const NONE: usize = usize::MAX;

#[derive(Debug, Clone, Default)]
pub(crate) struct CountLinkList {
    /// Head of each bucket
    first: Vec<usize>,
    next: Vec<usize>,
    prev: Vec<usize>,
    /// Bucket an entry is linked in (NONE if unlinked)
    bucket: Vec<usize>,
}

impl CountLinkList {
    #[cfg(test)]
    pub fn new(num_entries: usize, max_count: usize) -> Self {
        let mut list = Self::default();
        list.reset(num_entries, max_count);
        list
    }

    /// Unlink everything and resize.
    pub fn reset(&mut self, num_entries: usize, max_count: usize) {
        self.first.clear();
        self.first.resize(max_count + 1, NONE);
        self.next.clear();
        self.next.resize(num_entries, NONE);
        self.prev.clear();
        self.prev.resize(num_entries, NONE);
        self.bucket.clear();
        self.bucket.resize(num_entries, NONE);
    }

    /// Link `index` at the head of bucket `count`.
    pub fn add(&mut self, index: usize, count: usize) {
        debug_assert_eq!(self.bucket[index], NONE, "entry {} already linked", index);
        let mover = self.first[count];
        self.prev[index] = NONE;
        self.next[index] = mover;
        self.bucket[index] = count;
        self.first[count] = index;
        if mover != NONE {
            self.prev[mover] = index;
        }
    }

    /// Unlink `index`; no-op if it is not linked.
    pub fn remove(&mut self, index: usize) {
        let count = self.bucket[index];
        if count == NONE {
            return;
        }
        let xprev = self.prev[index];
        let xnext = self.next[index];
        if xprev != NONE {
            self.next[xprev] = xnext;
        } else {
            self.first[count] = xnext;
        }
        if xnext != NONE {
            self.prev[xnext] = xprev;
        }
        self.bucket[index] = NONE;
        self.next[index] = NONE;
        self.prev[index] = NONE;
    }

    /// Move `index` into bucket `count`.
    pub fn relink(&mut self, index: usize, count: usize) {
        self.remove(index);
        self.add(index, count);
    }

    #[inline]
    pub fn first(&self, count: usize) -> Option<usize> {
        match self.first.get(count) {
            Some(&head) if head != NONE => Some(head),
            _ => None,
        }
    }

    #[inline]
    pub fn next(&self, index: usize) -> Option<usize> {
        let next = self.next[index];
        (next != NONE).then_some(next)
    }

    /// Entries currently linked in bucket `count`, head first.
    #[cfg(test)]
    pub fn bucket_entries(&self, count: usize) -> Vec<usize> {
        let mut entries = Vec::new();
        let mut cursor = self.first(count);
        while let Some(i) = cursor {
            entries.push(i);
            cursor = self.next(i);
        }
        entries
    }
}
