/// A fixed-capacity FIFO ring buffer holding the most recent items of a stream.
///
/// Storage is reserved up front, so pushing never reallocates. Once the window
/// is full every push overwrites the oldest slot and hands the evicted item back.
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    slots: Vec<T>,
    head: usize,
    capacity: usize,
}

impl<T> SlidingWindow<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "window capacity must be greater than 0");
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Appends `item`, returning the evicted oldest item when the window was full.
    #[inline(always)]
    pub fn push(&mut self, item: T) -> Option<T> {
        if self.slots.len() < self.capacity {
            self.slots.push(item);
            return None;
        }
        let evicted = std::mem::replace(&mut self.slots[self.head], item);
        self.head = (self.head + 1) % self.capacity;
        Some(evicted)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn oldest(&self) -> Option<&T> {
        self.slots.get(self.head)
    }

    pub fn newest(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        // Until the window fills, head stays at 0 and the newest item is last.
        let idx = (self.head + self.slots.len() - 1) % self.slots.len();
        self.slots.get(idx)
    }

    /// Iterates from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots[self.head..].iter().chain(self.slots[..self.head].iter())
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }
}

impl<T: Clone> SlidingWindow<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}
