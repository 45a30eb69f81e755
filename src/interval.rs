//! Closed-interval index with overlap queries.
//!
//! Entries are kept in a vector sorted by lower bound, alongside a running
//! maximum of upper bounds (`reach[i]` is the largest `hi` among entries
//! `0..=i`). An overlap query binary-searches for the last entry starting at or
//! before the query's `hi`, then walks backwards until `reach` drops below the
//! query's `lo`: no earlier entry can extend that far.
//!
//! Appending in non-decreasing `lo` order (the order spans and reads are
//! produced in) is O(1). An out-of-order insert shifts the tail and recomputes
//! `reach` for it. Queries over disjoint entries cost O(log n + k).

#[derive(Debug, Clone)]
struct Entry<V> {
    lo: u64,
    hi: u64,
    value: V,
}

/// Index of `[lo, hi]` (both inclusive) entries.
#[derive(Debug, Clone)]
pub struct IntervalIndex<V> {
    entries: Vec<Entry<V>>,
    reach: Vec<u64>,
}

impl<V> Default for IntervalIndex<V> {
    fn default() -> Self {
        IntervalIndex {
            entries: Vec::new(),
            reach: Vec::new(),
        }
    }
}

impl<V> IntervalIndex<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.reach.clear();
    }

    /// Store `value` under the closed interval `[lo, hi]`. Bounds given in the
    /// wrong order are swapped.
    pub fn insert(&mut self, lo: u64, hi: u64, value: V) {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        // Equal lower bounds keep insertion order.
        let pos = self.entries.partition_point(|e| e.lo <= lo);
        if pos == self.entries.len() {
            let reach = self.reach.last().map_or(hi, |&r| r.max(hi));
            self.entries.push(Entry { lo, hi, value });
            self.reach.push(reach);
            return;
        }
        self.entries.insert(pos, Entry { lo, hi, value });
        self.reach.insert(pos, 0);
        let mut running = if pos == 0 { 0 } else { self.reach[pos - 1] };
        for i in pos..self.entries.len() {
            running = running.max(self.entries[i].hi);
            self.reach[i] = running;
        }
    }

    /// Every value whose interval overlaps `[lo, hi]`, ordered by ascending
    /// lower bound (insertion order among equal lower bounds).
    pub fn search(&self, lo: u64, hi: u64) -> Vec<&V> {
        let mut out: Vec<&V> = self.overlapping(lo, hi).map(|e| &e.value).collect();
        out.reverse();
        out
    }

    /// True if any stored interval overlaps `[lo, hi]`.
    pub fn overlaps(&self, lo: u64, hi: u64) -> bool {
        self.overlapping(lo, hi).next().is_some()
    }

    /// Ranges and values in ascending lower-bound order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, u64, &V)> {
        self.entries.iter().map(|e| (e.lo, e.hi, &e.value))
    }

    /// Overlapping entries, walking from the highest lower bound down.
    fn overlapping(&self, lo: u64, hi: u64) -> impl Iterator<Item = &Entry<V>> {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let end = self.entries.partition_point(|e| e.lo <= hi);
        (0..end)
            .rev()
            .take_while(move |&i| self.reach[i] >= lo)
            .map(move |i| &self.entries[i])
            .filter(move |e| e.hi >= lo)
    }
}
