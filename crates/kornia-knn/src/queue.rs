/// A fixed-capacity list of the best `(item, priority)` pairs seen so far.
///
/// Entries are kept sorted by ascending priority. The queue starts filled with
/// empty slots of priority `+inf`, so the first `capacity` finite insertions
/// always succeed and unused slots sort last. Insertion is a single
/// shift-and-insert pass, `O(capacity)`, which is fast for the small `k` used
/// in nearest neighbor search.
#[derive(Debug, Clone)]
pub struct BoundedPriorityQueue<T> {
    entries: Vec<Entry<T>>,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    item: Option<T>,
    priority: f64,
}

impl<T: Clone> BoundedPriorityQueue<T> {
    /// Create a queue keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![
                Entry {
                    item: None,
                    priority: f64::INFINITY,
                };
                capacity
            ],
        }
    }

    /// Reset every slot to empty with priority `+inf`.
    pub fn reset(&mut self) {
        for entry in self.entries.iter_mut() {
            entry.item = None;
            entry.priority = f64::INFINITY;
        }
    }
}

impl<T> BoundedPriorityQueue<T> {
    /// Maximum number of kept entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Worst kept priority, `+inf` while the queue is not full.
    ///
    /// A zero-capacity queue reports `-inf` so that nothing is ever admitted.
    #[inline]
    pub fn max_priority(&self) -> f64 {
        self.entries
            .last()
            .map_or(f64::NEG_INFINITY, |entry| entry.priority)
    }

    /// Insert `item` if `priority` is strictly smaller than the current maximum.
    ///
    /// Returns whether the item was admitted.
    pub fn enqueue(&mut self, item: T, priority: f64) -> bool {
        if priority.is_nan() || priority >= self.max_priority() {
            return false;
        }

        // shift worse entries one slot up to make a spot for the new one
        let mut i = self.entries.len() - 1;
        while i > 0 && self.entries[i - 1].priority > priority {
            self.entries.swap(i, i - 1);
            i -= 1;
        }

        self.entries[i] = Entry {
            item: Some(item),
            priority,
        };
        true
    }

    /// The kept items in ascending priority order; empty slots yield `None`.
    pub fn items(&self) -> impl Iterator<Item = Option<&T>> + Clone + '_ {
        self.entries.iter().map(|entry| entry.item.as_ref())
    }

    /// The kept priorities, index-aligned with [`Self::items`].
    pub fn priorities(&self) -> impl Iterator<Item = f64> + Clone + '_ {
        self.entries.iter().map(|entry| entry.priority)
    }

    /// Number of slots holding an admitted item.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.item.is_some()).count()
    }

    /// Whether no item has been admitted yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
